//! Whole-snapshot publishing on top of a results controller.
//!
//! Consumers that rebuild their view from identifiers (diffable data source
//! style) subscribe here instead of handling individual change events.

use crate::change::ObjectChange;
use crate::controller::ResultsController;
use crate::fetch::{FetchConfig, Result};
use crate::projection::Projection;
use crate::subscription::{SubscriptionId, SubscriptionManager};
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use lumen_core::RowId;
use lumen_storage::{StoreContext, WeakStore};

/// Identifiers of a results controller's current sections and rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchResultSnapshot {
    pub section_identifiers: Vec<String>,
    /// Row identities per section, parallel to `section_identifiers`.
    pub item_identifiers: Vec<Vec<RowId>>,
    /// Identities updated in place since the previous snapshot.
    pub reloaded_items: Vec<RowId>,
}

impl FetchResultSnapshot {
    pub fn number_of_items(&self) -> usize {
        self.item_identifiers.iter().map(|s| s.len()).sum()
    }

    pub fn number_of_sections(&self) -> usize {
        self.section_identifiers.len()
    }

    pub fn items_in_section(&self, name: &str) -> Option<&[RowId]> {
        self.section_identifiers
            .iter()
            .position(|s| s == name)
            .map(|i| self.item_identifiers[i].as_slice())
    }

    /// Every identity, in section order.
    pub fn all_items(&self) -> Vec<RowId> {
        self.item_identifiers.iter().flatten().copied().collect()
    }
}

struct ProviderInner<P: Projection> {
    controller: ResultsController<P>,
    current: RefCell<FetchResultSnapshot>,
    reloaded: RefCell<Vec<RowId>>,
    subscribers: RefCell<SubscriptionManager<FetchResultSnapshot>>,
}

impl<P: Projection> ProviderInner<P> {
    fn publish(&self) {
        let snapshot = {
            let sections = self.controller.sections();
            let mut reloaded = core::mem::take(&mut *self.reloaded.borrow_mut());
            reloaded.sort_unstable();
            reloaded.dedup();
            FetchResultSnapshot {
                section_identifiers: sections.iter().map(|s| String::from(s.name())).collect(),
                item_identifiers: sections
                    .iter()
                    .map(|s| s.objects().iter().map(|p| p.id()).collect())
                    .collect(),
                reloaded_items: reloaded,
            }
        };
        *self.current.borrow_mut() = snapshot.clone();

        let callbacks = self.subscribers.borrow().callbacks();
        for (id, callback) in callbacks {
            if self.subscribers.borrow().contains(id) {
                callback(&snapshot);
            }
        }
    }

    fn restart(&self) {
        self.reloaded.borrow_mut().clear();
        if let Err(err) = self.controller.perform_fetch() {
            tracing::warn!(error = %err, "snapshot provider restart failed");
        }
        self.publish();
    }
}

/// Publishes a `FetchResultSnapshot` after every change to a query's results.
pub struct SnapshotProvider<P: Projection> {
    inner: Rc<ProviderInner<P>>,
    store: WeakStore,
}

impl<P: Projection> SnapshotProvider<P> {
    pub fn new(store: &StoreContext, config: FetchConfig) -> Self {
        let inner = Rc::new(ProviderInner {
            controller: ResultsController::new(store, config),
            current: RefCell::new(FetchResultSnapshot::default()),
            reloaded: RefCell::new(Vec::new()),
            subscribers: RefCell::new(SubscriptionManager::new()),
        });

        // A row that changed and moved is reported as a move only, so moved
        // rows are reloaded as well.
        let weak: Weak<ProviderInner<P>> = Rc::downgrade(&inner);
        inner.controller.on_did_change_object(move |p: &P, change| {
            let stale = matches!(change, ObjectChange::Update { .. } | ObjectChange::Move { .. });
            if let (true, Some(inner)) = (stale, weak.upgrade()) {
                inner.reloaded.borrow_mut().push(p.id());
            }
        });
        let weak = Rc::downgrade(&inner);
        inner.controller.on_did_change_content(move || {
            if let Some(inner) = weak.upgrade() {
                inner.publish();
            }
        });
        let weak = Rc::downgrade(&inner);
        inner.controller.on_did_reset_content(move || {
            if let Some(inner) = weak.upgrade() {
                inner.restart();
            }
        });

        Self {
            inner,
            store: store.downgrade(),
        }
    }

    /// Performs the fetch and publishes the initial snapshot.
    pub fn start(&self) -> Result<()> {
        self.inner.controller.perform_fetch()?;
        self.inner.publish();
        Ok(())
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&FetchResultSnapshot) + 'static,
    {
        self.inner.subscribers.borrow_mut().subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.borrow_mut().unsubscribe(id)
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> FetchResultSnapshot {
        self.inner.current.borrow().clone()
    }

    /// Current projection of an identity, read from the store.
    pub fn object(&self, row_id: RowId) -> Option<P> {
        let store = self.store.upgrade()?;
        let config = self.inner.controller.fetch_config();
        let schema = store.schema(config.kind())?;
        let row = store.get(config.kind(), row_id)?;
        Some(P::from_row(&schema, &row))
    }

    pub fn controller(&self) -> &ResultsController<P> {
        &self.inner.controller
    }
}
