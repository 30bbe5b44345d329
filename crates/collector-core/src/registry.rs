//! Registry of items handed to an operator but not yet completed.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::queue::QueueItem;

/// Map from item id to the item currently held by an operator. No waiters,
/// no ordering.
#[derive(Default)]
pub struct InFlightRegistry {
    items: RwLock<HashMap<String, QueueItem>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, item: QueueItem) {
        self.items
            .write()
            .expect("registry lock poisoned")
            .insert(item.id.clone(), item);
    }

    /// Removes and returns the item, transferring ownership to the caller.
    pub fn take(&self, id: &str) -> Option<QueueItem> {
        self.items
            .write()
            .expect("registry lock poisoned")
            .remove(id)
    }

    /// Drops the item if present. Idempotent.
    pub fn remove(&self, id: &str) {
        self.items
            .write()
            .expect("registry lock poisoned")
            .remove(id);
    }

    pub fn len(&self) -> usize {
        self.items.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
