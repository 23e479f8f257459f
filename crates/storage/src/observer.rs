//! Store observers and the events delivered to them.
//!
//! The registry holds observers weakly: an observer that has been dropped is
//! skipped during dispatch and pruned afterwards, so consumers never need to
//! unsubscribe from their `Drop` impls to stay safe.

use crate::journal::ChangeBatch;
use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;

/// Identifier handed out by `ObserverRegistry::register`.
pub type ObserverId = u64;

/// A notification emitted by the store context.
#[derive(Clone, Debug)]
pub enum StoreEvent {
    /// A transaction committed with at least one net change.
    Changed(ChangeBatch),
    /// Rows were changed without itemized diffs. `None` means every kind.
    RefreshAll { kind: Option<String> },
    /// Every row of every kind was removed.
    Reset,
}

impl StoreEvent {
    /// Returns true if this event may affect rows of `kind`.
    pub fn touches(&self, kind: &str) -> bool {
        match self {
            StoreEvent::Changed(batch) => batch.diff(kind).is_some(),
            StoreEvent::RefreshAll { kind: None } | StoreEvent::Reset => true,
            StoreEvent::RefreshAll { kind: Some(k) } => k == kind,
        }
    }
}

/// Receives store events synchronously on the committing call stack.
///
/// Observers may read the store, open and commit further transactions,
/// subscribe or unsubscribe from inside `on_store_event`.
pub trait StoreObserver {
    fn on_store_event(&self, event: &StoreEvent);
}

/// Weakly-held observer set, delivered in registration order.
pub struct ObserverRegistry {
    observers: BTreeMap<ObserverId, Weak<dyn StoreObserver>>,
    next_id: ObserverId,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self {
            observers: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn register(&mut self, observer: Weak<dyn StoreObserver>) -> ObserverId {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.insert(id, observer);
        id
    }

    pub fn unregister(&mut self, id: ObserverId) -> bool {
        self.observers.remove(&id).is_some()
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.contains_key(&id)
    }

    /// Number of registered observers that are still alive.
    pub fn len(&self) -> usize {
        self.observers
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upgrades every live observer, in registration order.
    pub fn snapshot(&self) -> Vec<(ObserverId, Rc<dyn StoreObserver>)> {
        self.observers
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|o| (*id, o)))
            .collect()
    }

    /// Removes entries whose observer has been dropped.
    pub fn cleanup(&mut self) -> usize {
        let before = self.observers.len();
        self.observers.retain(|_, weak| weak.strong_count() > 0);
        before - self.observers.len()
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
