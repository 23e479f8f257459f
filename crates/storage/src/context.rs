//! The shared store context.
//!
//! `StoreContext` is a cheap, cloneable handle to the in-memory store. Readers
//! go through it directly; writers open a `Transaction`. Consumers that must
//! not keep the store alive hold a `WeakStore` instead.

use crate::cache::TableCache;
use crate::observer::{ObserverId, ObserverRegistry, StoreEvent, StoreObserver};
use crate::transaction::Transaction;
use alloc::collections::VecDeque;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use lumen_core::schema::Table;
use lumen_core::{Error, Result, Row, RowId, Value};

pub(crate) struct StoreInner {
    cache: RefCell<TableCache>,
    observers: RefCell<ObserverRegistry>,
    pending: RefCell<VecDeque<StoreEvent>>,
    dispatching: Cell<bool>,
}

/// Shared handle to the in-memory entity store.
#[derive(Clone)]
pub struct StoreContext {
    inner: Rc<StoreInner>,
}

/// Non-owning handle to a `StoreContext`.
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    /// Returns the store if at least one `StoreContext` handle is still alive.
    pub fn upgrade(&self) -> Option<StoreContext> {
        self.inner.upgrade().map(|inner| StoreContext { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

/// Ends a dispatch even if an observer unwinds. Events still queued at that
/// point are dropped with it.
struct DispatchGuard<'a>(&'a StoreInner);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.dispatching.set(false);
        let dropped = core::mem::take(&mut *self.0.pending.borrow_mut());
        if !dropped.is_empty() {
            tracing::warn!(dropped = dropped.len(), "dispatch aborted, queued events dropped");
        }
    }
}

impl StoreContext {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(StoreInner {
                cache: RefCell::new(TableCache::new()),
                observers: RefCell::new(ObserverRegistry::new()),
                pending: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns true if both handles point at the same store.
    pub fn ptr_eq(&self, other: &StoreContext) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registers a new entity kind.
    pub fn create_table(&self, schema: Table) -> Result<()> {
        tracing::debug!(kind = schema.name(), "creating entity kind");
        self.inner.cache.borrow_mut().create_table(schema)
    }

    pub fn schema(&self, kind: &str) -> Option<Rc<Table>> {
        self.inner
            .cache
            .borrow()
            .get_table(kind)
            .map(|store| store.schema().clone())
    }

    pub fn has_table(&self, kind: &str) -> bool {
        self.inner.cache.borrow().has_table(kind)
    }

    /// All committed rows of a kind, in ascending identity order.
    pub fn fetch_all(&self, kind: &str) -> Result<Vec<Rc<Row>>> {
        self.inner
            .cache
            .borrow()
            .get_table(kind)
            .map(|store| store.scan())
            .ok_or_else(|| Error::table_not_found(kind))
    }

    pub fn get(&self, kind: &str, row_id: RowId) -> Option<Rc<Row>> {
        self.inner.cache.borrow().get_row(kind, row_id)
    }

    /// Number of committed rows of a kind (0 for an unknown kind).
    pub fn len(&self, kind: &str) -> usize {
        self.inner
            .cache
            .borrow()
            .get_table(kind)
            .map_or(0, |store| store.len())
    }

    pub fn is_empty(&self, kind: &str) -> bool {
        self.len(kind) == 0
    }

    /// Opens a write transaction.
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.clone())
    }

    /// Rewrites rows of a kind in bulk without itemized change tracking.
    ///
    /// `f` returns replacement values for each row it wants to change; it
    /// runs with no borrow of the store held, so it may read the store. All
    /// replacements are validated before any is applied. Observers receive a
    /// single `RefreshAll` for the kind. Returns the number of rows changed.
    pub fn bulk_update<F>(&self, kind: &str, mut f: F) -> Result<usize>
    where
        F: FnMut(&Row) -> Option<Vec<Value>>,
    {
        let replacements: Vec<Row> = self
            .fetch_all(kind)?
            .iter()
            .filter_map(|row| f(row).map(|values| Row::new(row.id(), values)))
            .collect();

        let changed = {
            let mut cache = self.inner.cache.borrow_mut();
            let store = cache
                .get_table_mut(kind)
                .ok_or_else(|| Error::table_not_found(kind))?;

            for row in &replacements {
                if !store.contains(row.id()) {
                    return Err(Error::not_found(kind, row.id()));
                }
                store.schema().validate_row(row)?;
            }
            let changed = replacements.len();
            for row in replacements {
                store.update(row)?;
            }
            changed
        };

        tracing::debug!(kind, changed, "bulk update");
        self.dispatch(StoreEvent::RefreshAll {
            kind: Some(String::from(kind)),
        });
        Ok(changed)
    }

    /// Deletes every row of a kind matching `f` without itemized change
    /// tracking. Like `bulk_update`, `f` may read the store. Observers receive
    /// a single `RefreshAll` for the kind.
    pub fn bulk_delete<F>(&self, kind: &str, mut f: F) -> Result<usize>
    where
        F: FnMut(&Row) -> bool,
    {
        let doomed: Vec<RowId> = self
            .fetch_all(kind)?
            .iter()
            .filter(|row| f(row))
            .map(|row| row.id())
            .collect();

        let removed = {
            let mut cache = self.inner.cache.borrow_mut();
            let store = cache
                .get_table_mut(kind)
                .ok_or_else(|| Error::table_not_found(kind))?;

            let mut removed = 0;
            for row_id in doomed {
                // Rows `f` itself removed are already gone.
                if store.contains(row_id) {
                    store.delete(row_id)?;
                    removed += 1;
                }
            }
            removed
        };

        tracing::debug!(kind, removed, "bulk delete");
        self.dispatch(StoreEvent::RefreshAll {
            kind: Some(String::from(kind)),
        });
        Ok(removed)
    }

    /// Tells observers to re-evaluate everything they hold.
    pub fn refresh_all(&self) {
        self.dispatch(StoreEvent::RefreshAll { kind: None });
    }

    /// Removes every row of every kind.
    pub fn reset(&self) {
        self.inner.cache.borrow_mut().clear();
        tracing::debug!("store reset");
        self.dispatch(StoreEvent::Reset);
    }

    pub fn subscribe(&self, observer: Weak<dyn StoreObserver>) -> ObserverId {
        let id = self.inner.observers.borrow_mut().register(observer);
        tracing::trace!(observer = id, "observer subscribed");
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.inner.observers.borrow_mut().unregister(id);
        if removed {
            tracing::trace!(observer = id, "observer unsubscribed");
        }
        removed
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    pub(crate) fn cache(&self) -> &RefCell<TableCache> {
        &self.inner.cache
    }

    /// Delivers an event to every observer.
    ///
    /// Events raised while a dispatch is already running (an observer
    /// committing from its callback) are queued and delivered, in order, once
    /// the current event has reached every observer.
    pub(crate) fn dispatch(&self, event: StoreEvent) {
        self.inner.pending.borrow_mut().push_back(event);
        if self.inner.dispatching.get() {
            return;
        }

        self.inner.dispatching.set(true);
        let _guard = DispatchGuard(&self.inner);

        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(event) = next else { break };

            let observers = self.inner.observers.borrow().snapshot();
            tracing::trace!(observers = observers.len(), "dispatching store event");
            for (id, observer) in observers {
                // Unsubscribed by an earlier observer during this delivery.
                if !self.inner.observers.borrow().contains(id) {
                    continue;
                }
                observer.on_store_event(&event);
            }
        }

        let pruned = self.inner.observers.borrow_mut().cleanup();
        if pruned > 0 {
            tracing::trace!(pruned, "pruned dropped observers");
        }
    }
}

impl Default for StoreContext {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let cache = self.inner.cache.borrow();
        f.debug_struct("StoreContext")
            .field("kinds", &cache.table_names())
            .field("rows", &cache.total_row_count())
            .finish()
    }
}
