//! Entity listener: watches a single identity of one entity kind.

use crate::projection::Projection;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::{Cell, RefCell};
use lumen_core::{Row, RowId};
use lumen_storage::{ObserverId, RowChange, StoreContext, StoreEvent, StoreObserver, WeakStore};

type UpsertCallback<P> = Rc<dyn Fn(&P)>;
type DeleteCallback = Rc<dyn Fn()>;

enum Outcome {
    Upsert(Rc<Row>),
    Delete,
}

struct Inner<P> {
    store: WeakStore,
    kind: String,
    row_id: RowId,
    /// Whether the identity existed after the last event seen.
    present: Cell<bool>,
    alive: Cell<bool>,
    observer: Cell<Option<ObserverId>>,
    on_upsert: RefCell<Option<UpsertCallback<P>>>,
    on_delete: RefCell<Option<DeleteCallback>>,
}

impl<P: Projection> Inner<P> {
    fn outcome(&self, store: &StoreContext, event: &StoreEvent) -> Option<Outcome> {
        match event {
            StoreEvent::Changed(batch) => match batch.diff(&self.kind)?.change_for(self.row_id)? {
                RowChange::Inserted(row) | RowChange::Updated { new: row, .. } => {
                    Some(Outcome::Upsert(row))
                }
                RowChange::Deleted(_) => Some(Outcome::Delete),
            },
            StoreEvent::RefreshAll { .. } if event.touches(&self.kind) => {
                match store.get(&self.kind, self.row_id) {
                    Some(row) => Some(Outcome::Upsert(row)),
                    None if self.present.get() => Some(Outcome::Delete),
                    None => None,
                }
            }
            StoreEvent::Reset if self.present.get() => Some(Outcome::Delete),
            _ => None,
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

        match self.outcome(&store, event) {
            Some(Outcome::Upsert(row)) => {
                self.present.set(true);
                let callback = self.on_upsert.borrow().clone();
                let Some(callback) = callback else { return };
                let Some(schema) = store.schema(&self.kind) else {
                    return;
                };
                tracing::trace!(kind = self.kind.as_str(), id = self.row_id, "entity upserted");
                callback(&P::from_row(&schema, &row));
            }
            Some(Outcome::Delete) => {
                self.present.set(false);
                let callback = self.on_delete.borrow().clone();
                if let Some(callback) = callback {
                    tracing::trace!(kind = self.kind.as_str(), id = self.row_id, "entity deleted");
                    callback();
                }
            }
            None => {}
        }
    }
}

/// Watches one identity and reports its upserts and its deletion.
///
/// The listener observes from construction until it is cancelled or dropped.
/// Each store commit produces at most one callback. If the store is already
/// gone when the listener is created, it never fires.
pub struct EntityListener<P: Projection> {
    inner: Rc<Inner<P>>,
}

impl<P: Projection> EntityListener<P> {
    pub fn new(store: &StoreContext, kind: impl Into<String>, row_id: RowId) -> Self {
        Self::with_weak_store(store.downgrade(), kind, row_id)
    }

    pub fn with_weak_store(store: WeakStore, kind: impl Into<String>, row_id: RowId) -> Self {
        let kind = kind.into();
        let live = store.upgrade();
        let present = live
            .as_ref()
            .map_or(false, |s| s.get(&kind, row_id).is_some());

        let inner = Rc::new(Inner {
            store,
            kind,
            row_id,
            present: Cell::new(present),
            alive: Cell::new(true),
            observer: Cell::new(None),
            on_upsert: RefCell::new(None),
            on_delete: RefCell::new(None),
        });

        match live {
            Some(live) => {
                let rc: Rc<dyn StoreObserver> = inner.clone();
                inner.observer.set(Some(live.subscribe(Rc::downgrade(&rc))));
            }
            None => tracing::debug!(id = row_id, "store unavailable, listener stays idle"),
        }
        Self { inner }
    }

    /// Binds to the identity of an existing projection.
    pub fn for_projection(store: &StoreContext, kind: impl Into<String>, projection: &P) -> Self {
        Self::new(store, kind, projection.id())
    }

    pub fn row_id(&self) -> RowId {
        self.inner.row_id
    }

    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    /// True until cancelled, and only if the store was reachable at creation.
    pub fn is_active(&self) -> bool {
        self.inner.alive.get() && self.inner.observer.get().is_some()
    }

    /// Fired with a fresh projection whenever the identity is inserted or its
    /// attributes may have changed.
    pub fn on_upsert<F>(&self, f: F)
    where
        F: Fn(&P) + 'static,
    {
        *self.inner.on_upsert.borrow_mut() = Some(Rc::new(f));
    }

    /// Fired once when the identity is removed from the store.
    pub fn on_delete<F>(&self, f: F)
    where
        F: Fn() + 'static,
    {
        *self.inner.on_delete.borrow_mut() = Some(Rc::new(f));
    }

    /// Stops observing. No callback fires afterwards.
    pub fn cancel(&self) {
        self.inner.alive.set(false);
        if let Some(id) = self.inner.observer.take() {
            if let Some(store) = self.inner.store.upgrade() {
                store.unsubscribe(id);
            }
        }
    }
}

impl<P: Projection> Drop for EntityListener<P> {
    fn drop(&mut self) {
        self.cancel();
    }
}
