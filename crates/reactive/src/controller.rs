//! Results controller: a live, sectioned, sorted view over one entity kind.
//!
//! The controller keeps every row matching its predicate ordered by sort key,
//! and exposes the first `fetch_limit` of them as sections of projections.
//! Each store batch touching the kind re-evaluates the affected identities
//! against the store, rebuilds the visible snapshot and reports the
//! difference through the change callbacks:
//!
//! 1. `on_will_change_content`, once
//! 2. row deletes, section deletes, section inserts, row inserts, moves, updates
//! 3. `on_did_change_content`, once
//!
//! The controller's accessors already reflect the new snapshot while these
//! callbacks run.

use crate::change::{ObjectChange, SectionChange};
use crate::diff::{diff_layouts, Layout};
use crate::fetch::{CompiledFetch, FetchConfig, FetchError, Result, SortDescriptor, SortKey};
use crate::projection::Projection;
use crate::section::{IndexPath, Section};
use alloc::collections::BTreeSet;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use hashbrown::HashMap;
use lumen_core::schema::Table;
use lumen_core::{Row, RowId};
use lumen_storage::{ObserverId, StoreContext, StoreEvent, StoreObserver, WeakStore};

type ContentCallback = Rc<dyn Fn()>;
type ObjectCallback<P> = Rc<dyn Fn(&P, &ObjectChange)>;
type SectionCallback = Rc<dyn Fn(&SectionChange)>;

struct Callbacks<P> {
    will_change: RefCell<Option<ContentCallback>>,
    did_change_object: RefCell<Option<ObjectCallback<P>>>,
    did_change_section: RefCell<Option<SectionCallback>>,
    did_change: RefCell<Option<ContentCallback>>,
    did_reset: RefCell<Option<ContentCallback>>,
}

impl<P> Default for Callbacks<P> {
    fn default() -> Self {
        Self {
            will_change: RefCell::new(None),
            did_change_object: RefCell::new(None),
            did_change_section: RefCell::new(None),
            did_change: RefCell::new(None),
            did_reset: RefCell::new(None),
        }
    }
}

/// One change ready for delivery.
enum Emission<P> {
    Object(P, ObjectChange),
    Section(SectionChange),
}

/// Fetched state of an active controller.
struct State<P> {
    schema: Rc<Table>,
    fetch: CompiledFetch,
    /// Every matching row, in sort order.
    ordered: BTreeSet<SortKey>,
    /// Sort key and committed row of every matching identity.
    matched: HashMap<RowId, (SortKey, Rc<Row>)>,
    /// Visible rows and their projections.
    visible: HashMap<RowId, (Rc<Row>, P)>,
    sections: Vec<Section<P>>,
    layout: Layout,
}

impl<P: Projection> State<P> {
    fn load(store: &StoreContext, config: &FetchConfig) -> Result<Self> {
        let schema = store
            .schema(config.kind())
            .ok_or_else(|| FetchError::unknown_entity(config.kind()))?;
        let fetch = config.compile(&schema)?;

        let mut state = Self {
            schema,
            fetch,
            ordered: BTreeSet::new(),
            matched: HashMap::new(),
            visible: HashMap::new(),
            sections: Vec::new(),
            layout: Layout::default(),
        };
        for row in store.fetch_all(config.kind())? {
            state.admit(row);
        }
        state.rebuild();
        Ok(state)
    }

    /// Adds a row to the matched set if it satisfies the predicate.
    fn admit(&mut self, row: Rc<Row>) {
        if self.fetch.matches(&row) {
            let key = self.fetch.sort_key(&row);
            self.ordered.insert(key.clone());
            self.matched.insert(row.id(), (key, row));
        }
    }

    fn evict(&mut self, row_id: RowId) {
        if let Some((key, _)) = self.matched.remove(&row_id) {
            self.ordered.remove(&key);
        }
    }

    /// Brings one identity in line with the store's committed state.
    fn reevaluate(&mut self, row_id: RowId, current: Option<Rc<Row>>) {
        self.evict(row_id);
        if let Some(row) = current {
            self.admit(row);
        }
    }

    /// Recomputes the visible sections from the matched set, reusing the
    /// projections of rows that did not change. Returns the previous visible
    /// rows.
    fn rebuild(&mut self) -> HashMap<RowId, (Rc<Row>, P)> {
        let limit = self.fetch.limit().unwrap_or(usize::MAX);
        let previous = core::mem::take(&mut self.visible);
        let mut sections: Vec<Section<P>> = Vec::new();
        let mut layout = Layout::default();
        let mut section_index: HashMap<String, usize> = HashMap::new();

        if !self.fetch.is_sectioned() {
            sections.push(Section::new("", Vec::new()));
            layout.sections.push((String::new(), Vec::new()));
        }

        for key in self.ordered.iter().take(limit) {
            let Some((_, row)) = self.matched.get(&key.id()) else {
                continue;
            };
            let projection = match previous.get(&row.id()) {
                Some((old_row, projection)) if Rc::ptr_eq(old_row, row) => projection.clone(),
                _ => P::from_row(&self.schema, row),
            };

            let s = if self.fetch.is_sectioned() {
                let name = self.fetch.section_name(row);
                match section_index.get(&name) {
                    Some(&s) => s,
                    None => {
                        let s = sections.len();
                        section_index.insert(name.clone(), s);
                        sections.push(Section::new(name.clone(), Vec::new()));
                        layout.sections.push((name, Vec::new()));
                        s
                    }
                }
            } else {
                0
            };

            sections[s].push(projection.clone());
            layout.sections[s].1.push(row.id());
            self.visible.insert(row.id(), (row.clone(), projection));
        }

        self.sections = sections;
        self.layout = layout;
        previous
    }

    fn object_count(&self) -> usize {
        self.sections.iter().map(|s| s.len()).sum()
    }

    fn object_at(&self, path: IndexPath) -> Option<&P> {
        self.sections.get(path.section).and_then(|s| s.get(path.row))
    }
}

struct Inner<P> {
    store: WeakStore,
    config: RefCell<FetchConfig>,
    state: RefCell<Option<State<P>>>,
    observer: Cell<Option<ObserverId>>,
    alive: Cell<bool>,
    callbacks: Callbacks<P>,
}

impl<P: Projection> Inner<P> {
    fn kind(&self) -> String {
        String::from(self.config.borrow().kind())
    }

    /// Applies a store batch and returns the resulting changes. `None` when
    /// the batch does not concern this controller.
    fn process(&self, store: &StoreContext, event: &StoreEvent) -> Option<Vec<Emission<P>>> {
        let kind = self.kind();
        let mut guard = self.state.borrow_mut();
        let state = guard.as_mut()?;

        let reload_all = match event {
            StoreEvent::Changed(batch) => {
                let diff = batch.diff(&kind)?;
                for row_id in diff.affected_ids() {
                    state.reevaluate(row_id, store.get(&kind, row_id));
                }
                false
            }
            StoreEvent::RefreshAll { .. } if event.touches(&kind) => {
                state.ordered.clear();
                state.matched.clear();
                for row in store.fetch_all(&kind).unwrap_or_default() {
                    state.admit(row);
                }
                true
            }
            _ => return None,
        };
        let old_layout = state.layout.clone();
        let old_visible = state.rebuild();

        let diff = diff_layouts(&old_layout, &state.layout, |row_id| {
            reload_all
                || match (old_visible.get(&row_id), state.visible.get(&row_id)) {
                    (Some((old, _)), Some((new, _))) => !Rc::ptr_eq(old, new),
                    _ => false,
                }
        });

        let mut out = Vec::new();
        for (row_id, path) in diff.row_deletes {
            if let Some((_, p)) = old_visible.get(&row_id) {
                out.push(Emission::Object(
                    p.clone(),
                    ObjectChange::Delete { index_path: path },
                ));
            }
        }
        for (index, name) in diff.section_deletes {
            out.push(Emission::Section(SectionChange::Delete { index, name }));
        }
        for (index, name) in diff.section_inserts {
            out.push(Emission::Section(SectionChange::Insert { index, name }));
        }
        let current = |row_id: RowId| state.visible.get(&row_id).map(|(_, p)| p.clone());
        for (row_id, path) in diff.row_inserts {
            if let Some(p) = current(row_id) {
                out.push(Emission::Object(
                    p,
                    ObjectChange::Insert {
                        new_index_path: path,
                    },
                ));
            }
        }
        for (row_id, from, to) in diff.moves {
            if let Some(p) = current(row_id) {
                out.push(Emission::Object(p, ObjectChange::Move { from, to }));
            }
        }
        for (row_id, path) in diff.updates {
            if let Some(p) = current(row_id) {
                out.push(Emission::Object(p, ObjectChange::Update { index_path: path }));
            }
        }

        tracing::debug!(
            kind = kind.as_str(),
            changes = out.len(),
            objects = state.object_count(),
            "processed store batch"
        );
        Some(out)
    }

    fn emit(&self, emissions: Vec<Emission<P>>) {
        if let Some(cb) = self.live(&self.callbacks.will_change) {
            cb();
        }
        for emission in emissions {
            match emission {
                Emission::Object(p, change) => {
                    if let Some(cb) = self.live(&self.callbacks.did_change_object) {
                        tracing::trace!(?change, "object change");
                        cb(&p, &change);
                    }
                }
                Emission::Section(change) => {
                    if let Some(cb) = self.live(&self.callbacks.did_change_section) {
                        tracing::trace!(?change, "section change");
                        cb(&change);
                    }
                }
            }
        }
        if let Some(cb) = self.live(&self.callbacks.did_change) {
            cb();
        }
    }

    /// The callback in `slot`, unless the controller has been torn down.
    fn live<T: Clone>(&self, slot: &RefCell<Option<T>>) -> Option<T> {
        if self.alive.get() {
            slot.borrow().clone()
        } else {
            None
        }
    }

    fn reset(&self, store: &StoreContext) {
        let reloaded = {
            let mut guard = self.state.borrow_mut();
            if guard.is_none() {
                return;
            }
            match State::load(store, &self.config.borrow()) {
                Ok(state) => {
                    *guard = Some(state);
                    true
                }
                Err(err) => {
                    tracing::warn!(error = %err, "reload after store reset failed");
                    *guard = None;
                    false
                }
            }
        };
        if !reloaded {
            self.stop_observing();
        }
        if let Some(cb) = self.live(&self.callbacks.did_reset) {
            cb();
        }
    }

    fn stop_observing(&self) {
        if let Some(id) = self.observer.take() {
            if let Some(store) = self.store.upgrade() {
                store.unsubscribe(id);
            }
        }
    }
}

impl<P: Projection> StoreObserver for Inner<P> {
    fn on_store_event(&self, event: &StoreEvent) {
        if !self.alive.get() {
            return;
        }
        let Some(store) = self.store.upgrade() else {
            return;
        };
        if let StoreEvent::Reset = event {
            self.reset(&store);
            return;
        }
        if let Some(emissions) = self.process(&store, event) {
            self.emit(emissions);
        }
    }
}

/// Keeps a sectioned, sorted, optionally capped query over the store live.
///
/// A controller starts inert: it has no sections and observes nothing until
/// `perform_fetch` succeeds. Dropping it stops observation immediately; no
/// callback is delivered afterwards, including the rest of a batch that is
/// being delivered at that moment.
///
/// # Example
///
/// ```rust
/// use lumen_core::schema::TableBuilder;
/// use lumen_core::{DataType, Row, Value};
/// use lumen_reactive::{FetchConfig, Record, ResultsController, SortDescriptor};
/// use lumen_storage::StoreContext;
///
/// let store = StoreContext::new();
/// store
///     .create_table(
///         TableBuilder::new("products").unwrap()
///             .add_column("name", DataType::String).unwrap()
///             .build().unwrap(),
///     )
///     .unwrap();
///
/// let config = FetchConfig::builder("products")
///     .sort_by(SortDescriptor::ascending("name").case_insensitive())
///     .build();
/// let controller: ResultsController<Record> = ResultsController::new(&store, config);
/// controller.perform_fetch().unwrap();
///
/// let mut tx = store.begin();
/// tx.insert("products", Row::new(1, vec![Value::from("Zap")]));
/// tx.commit().unwrap();
///
/// assert_eq!(controller.number_of_objects(), 1);
/// ```
pub struct ResultsController<P: Projection> {
    inner: Rc<Inner<P>>,
}

impl<P: Projection> ResultsController<P> {
    pub fn new(store: &StoreContext, config: FetchConfig) -> Self {
        Self::with_weak_store(store.downgrade(), config)
    }

    pub fn with_weak_store(store: WeakStore, config: FetchConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                store,
                config: RefCell::new(config),
                state: RefCell::new(None),
                observer: Cell::new(None),
                alive: Cell::new(true),
                callbacks: Callbacks::default(),
            }),
        }
    }

    /// Loads the current results and starts observing the store.
    ///
    /// Calling it again recomputes everything from scratch without emitting
    /// change callbacks. On error the controller is left inert.
    pub fn perform_fetch(&self) -> Result<()> {
        let loaded = match self.inner.store.upgrade() {
            Some(store) => State::load(&store, &self.inner.config.borrow()).map(|s| (store, s)),
            None => Err(FetchError::StoreUnavailable),
        };

        match loaded {
            Ok((store, state)) => {
                tracing::debug!(
                    kind = state.schema.name(),
                    objects = state.object_count(),
                    sections = state.sections.len(),
                    "fetch performed"
                );
                *self.inner.state.borrow_mut() = Some(state);
                if self.inner.observer.get().is_none() {
                    let rc: Rc<dyn StoreObserver> = self.inner.clone();
                    self.inner.observer.set(Some(store.subscribe(Rc::downgrade(&rc))));
                }
                Ok(())
            }
            Err(err) => {
                tracing::debug!(error = %err, "fetch failed");
                *self.inner.state.borrow_mut() = None;
                self.inner.stop_observing();
                Err(err)
            }
        }
    }

    /// Replaces the sort chain.
    ///
    /// An active controller re-sorts immediately and silently; an inert one
    /// uses the new chain on its next `perform_fetch`. If the new chain does
    /// not fit the schema, nothing changes and the error is returned.
    pub fn update_sort_order(&self, descriptors: Vec<SortDescriptor>) -> Result<()> {
        let mut config = self.inner.config.borrow().clone();
        config.set_sort_descriptors(descriptors);

        if !self.is_fetched() {
            *self.inner.config.borrow_mut() = config;
            return Ok(());
        }

        let store = self.inner.store.upgrade().ok_or(FetchError::StoreUnavailable)?;
        let state = State::load(&store, &config)?;
        *self.inner.config.borrow_mut() = config;
        *self.inner.state.borrow_mut() = Some(state);
        Ok(())
    }

    pub fn fetch_config(&self) -> FetchConfig {
        self.inner.config.borrow().clone()
    }

    /// True once `perform_fetch` has succeeded.
    pub fn is_fetched(&self) -> bool {
        self.inner.state.borrow().is_some()
    }

    pub fn sections(&self) -> Vec<Section<P>> {
        self.inner
            .state
            .borrow()
            .as_ref()
            .map(|s| s.sections.clone())
            .unwrap_or_default()
    }

    pub fn number_of_sections(&self) -> usize {
        self.inner.state.borrow().as_ref().map_or(0, |s| s.sections.len())
    }

    /// Every visible projection, in section order.
    pub fn fetched_objects(&self) -> Vec<P> {
        self.inner
            .state
            .borrow()
            .as_ref()
            .map(|s| {
                s.sections
                    .iter()
                    .flat_map(|section| section.objects().iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn number_of_objects(&self) -> usize {
        self.inner.state.borrow().as_ref().map_or(0, |s| s.object_count())
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_objects() == 0
    }

    /// The projection at `path`.
    ///
    /// # Panics
    ///
    /// Panics if `path` is out of range; use `safe_object_at` when it may be.
    pub fn object_at(&self, path: IndexPath) -> P {
        match self.safe_object_at(path) {
            Some(p) => p,
            None => panic!(
                "index path {} out of range ({} sections)",
                path,
                self.number_of_sections()
            ),
        }
    }

    pub fn safe_object_at(&self, path: IndexPath) -> Option<P> {
        self.inner
            .state
            .borrow()
            .as_ref()
            .and_then(|s| s.object_at(path).cloned())
    }

    /// Position of `path` within `fetched_objects`.
    pub fn object_index(&self, path: IndexPath) -> Option<usize> {
        let guard = self.inner.state.borrow();
        let state = guard.as_ref()?;
        let section = state.sections.get(path.section)?;
        if path.row >= section.len() {
            return None;
        }
        let before: usize = state.sections[..path.section].iter().map(|s| s.len()).sum();
        Some(before + path.row)
    }

    /// Current position of an identity, if it is visible.
    pub fn index_path(&self, row_id: RowId) -> Option<IndexPath> {
        let guard = self.inner.state.borrow();
        let state = guard.as_ref()?;
        state
            .layout
            .sections
            .iter()
            .enumerate()
            .find_map(|(s, (_, ids))| {
                ids.iter()
                    .position(|id| *id == row_id)
                    .map(|r| IndexPath::new(s, r))
            })
    }

    pub fn on_will_change_content<F>(&self, f: F)
    where
        F: Fn() + 'static,
    {
        *self.inner.callbacks.will_change.borrow_mut() = Some(Rc::new(f));
    }

    pub fn on_did_change_object<F>(&self, f: F)
    where
        F: Fn(&P, &ObjectChange) + 'static,
    {
        *self.inner.callbacks.did_change_object.borrow_mut() = Some(Rc::new(f));
    }

    pub fn on_did_change_section<F>(&self, f: F)
    where
        F: Fn(&SectionChange) + 'static,
    {
        *self.inner.callbacks.did_change_section.borrow_mut() = Some(Rc::new(f));
    }

    pub fn on_did_change_content<F>(&self, f: F)
    where
        F: Fn() + 'static,
    {
        *self.inner.callbacks.did_change.borrow_mut() = Some(Rc::new(f));
    }

    /// Fired instead of the change callbacks when the store was wiped;
    /// consumers must reload everything.
    pub fn on_did_reset_content<F>(&self, f: F)
    where
        F: Fn() + 'static,
    {
        *self.inner.callbacks.did_reset.borrow_mut() = Some(Rc::new(f));
    }
}

impl<P: Projection> Drop for ResultsController<P> {
    fn drop(&mut self) {
        self.inner.alive.set(false);
        self.inner.stop_observing();
    }
}
