use crate::model::TaskEvent;
use std::collections::BTreeMap;
use std::sync::{Mutex, Weak};

pub type EventCallback = Box<dyn Fn(&TaskEvent) + Send>;

/// Ordered registry of event callbacks. Ids are handed out monotonically, so
/// iteration order is registration order.
#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: u64,
    callbacks: BTreeMap<u64, EventCallback>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, callback: EventCallback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.callbacks.insert(id, callback);
        id
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.callbacks.remove(&id).is_some()
    }

    pub fn dispatch(&self, event: &TaskEvent) {
        for callback in self.callbacks.values() {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// Capability returned by [`EventChannel::subscribe`]; cancels exactly the
/// callback it was issued for.
///
/// [`EventChannel::subscribe`]: crate::client::EventChannel::subscribe
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<SubscriberRegistry>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, registry: Weak<Mutex<SubscriberRegistry>>) -> Self {
        Self { id, registry }
    }

    /// Removes the callback. Safe to call more than once; only the first
    /// call has an effect.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().unwrap().remove(self.id);
        }
    }
}
