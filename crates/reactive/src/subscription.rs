//! Subscription management for snapshot consumers.
//!
//! Callbacks are reference counted so a notification pass can work from a
//! copy of the subscriber list: a callback may subscribe or unsubscribe
//! (itself or others) without invalidating the pass.

use alloc::rc::Rc;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback invoked with each published value.
pub type Callback<T> = Rc<dyn Fn(&T)>;

/// A registered callback.
pub struct Subscription<T> {
    id: SubscriptionId,
    callback: Callback<T>,
}

impl<T> Subscription<T> {
    pub fn new<F>(id: SubscriptionId, callback: F) -> Self
    where
        F: Fn(&T) + 'static,
    {
        Self {
            id,
            callback: Rc::new(callback),
        }
    }

    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn notify(&self, value: &T) {
        (self.callback)(value);
    }
}

/// Subscribers of one publisher, notified in subscription order.
pub struct SubscriptionManager<T> {
    subscriptions: HashMap<SubscriptionId, Subscription<T>>,
    next_id: SubscriptionId,
}

impl<T> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubscriptionManager<T> {
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Returns the id to pass to `unsubscribe`.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.insert(id, Subscription::new(id, callback));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains_key(&id)
    }

    /// Copies of the current callbacks, in subscription order.
    pub fn callbacks(&self) -> Vec<(SubscriptionId, Callback<T>)> {
        let mut out: Vec<(SubscriptionId, Callback<T>)> = self
            .subscriptions
            .values()
            .map(|s| (s.id, s.callback.clone()))
            .collect();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }

    /// Notifies every subscriber. Callbacks must not re-borrow the manager;
    /// use `callbacks()` when they might.
    pub fn notify_all(&self, value: &T) {
        for (_, callback) in self.callbacks() {
            callback(value);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}
