//! The ordered work queue with defer semantics and a waiter wake channel.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use collector_types::proto::{Request, Response};

use crate::cancel::CancelSignal;

/// The unit held by the queue and the in-flight registry: an admitted request
/// plus its reply channel and the caller's cancel signal.
#[derive(Debug)]
pub struct QueueItem {
    pub id: String,
    pub request: Request,
    /// Single-shot delivery channel back to the suspended caller. Exactly one
    /// of {value sent, channel dropped by cleanup} happens.
    pub reply: oneshot::Sender<Response>,
    pub enqueued_at: SystemTime,
    pub deferred: bool,
    pub cancel: CancelSignal,
}

/// Consistent snapshot of the queue. `active + deferred == total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub total: usize,
    pub active: usize,
    pub deferred: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("item already in queue: {0}")]
    DuplicateId(String),

    #[error("item not found: {0}")]
    NotFound(String),

    #[error("timeout waiting for queue item")]
    WaitTimeout,
}

struct Inner {
    items: VecDeque<QueueItem>,
    ids: HashSet<String>,
}

/// Ordered collection of pending items. Mutators serialize under the writer
/// lock; `status` takes the shared lock. Waiters live behind their own mutex
/// and are only ever poked with non-blocking sends, so `enqueue` stays bounded
/// while holding the writer lock.
pub struct WorkQueue {
    inner: RwLock<Inner>,
    waiters: Mutex<HashMap<u64, mpsc::Sender<()>>>,
    next_waiter: AtomicU64,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                items: VecDeque::new(),
                ids: HashSet::new(),
            }),
            waiters: Mutex::new(HashMap::new()),
            next_waiter: AtomicU64::new(0),
        }
    }

    /// Appends at the tail and wakes one pass of waiters. Duplicate ids are a
    /// programming error and fail loudly.
    pub fn enqueue(&self, item: QueueItem) -> Result<(), QueueError> {
        let mut inner = self.inner.write().expect("queue lock poisoned");
        if !inner.ids.insert(item.id.clone()) {
            return Err(QueueError::DuplicateId(item.id));
        }
        inner.items.push_back(item);
        self.notify_waiters();
        Ok(())
    }

    /// Removes and returns the first eligible item: the first non-deferred
    /// item, or the front of the queue when only deferred items remain.
    fn dequeue(&self) -> Option<QueueItem> {
        let mut inner = self.inner.write().expect("queue lock poisoned");
        let index = inner
            .items
            .iter()
            .position(|item| !item.deferred)
            .unwrap_or(0);
        let item = inner.items.remove(index)?;
        inner.ids.remove(&item.id);
        Some(item)
    }

    /// Blocks until an item can be taken or the deadline passes. A wake from
    /// `enqueue` is a hint, not a guarantee: the queue is re-scanned after
    /// every wake.
    pub async fn take_next(&self, deadline: Instant) -> Result<QueueItem, QueueError> {
        let (tx, mut rx) = mpsc::channel(1);
        let key = self.next_waiter.fetch_add(1, Ordering::Relaxed);
        self.waiters
            .lock()
            .expect("waiter lock poisoned")
            .insert(key, tx);
        let _guard = WaiterGuard { queue: self, key };

        loop {
            if let Some(item) = self.dequeue() {
                return Ok(item);
            }

            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep_until(deadline) => return Err(QueueError::WaitTimeout),
            }
        }
    }

    /// Marks the item deferred and rotates it to the tail. Helper for items
    /// that are still queued; the operator-facing defer goes through the
    /// gateway, which re-enqueues a taken item.
    pub fn defer(&self, id: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.write().expect("queue lock poisoned");
        let index = inner
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        let mut item = inner.items.remove(index).expect("position was valid");
        item.deferred = true;
        inner.items.push_back(item);
        Ok(())
    }

    /// Unlinks the item unconditionally. Used by the broker on caller
    /// cancellation; absence is reported, not fatal.
    pub fn remove(&self, id: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.write().expect("queue lock poisoned");
        if !inner.ids.remove(id) {
            return Err(QueueError::NotFound(id.to_string()));
        }
        let index = inner
            .items
            .iter()
            .position(|item| item.id == id)
            .expect("id set and item list agree");
        inner.items.remove(index);
        Ok(())
    }

    pub fn status(&self) -> QueueStatus {
        let inner = self.inner.read().expect("queue lock poisoned");
        let deferred = inner.items.iter().filter(|item| item.deferred).count();
        QueueStatus {
            total: inner.items.len(),
            active: inner.items.len() - deferred,
            deferred,
        }
    }

    /// Non-blocking poke of every registered waiter. A full slot means the
    /// waiter already has a pending wake, so the send is dropped.
    fn notify_waiters(&self) {
        let waiters = self.waiters.lock().expect("waiter lock poisoned");
        for tx in waiters.values() {
            let _ = tx.try_send(());
        }
    }
}

/// Deregisters a `take_next` waiter on every exit path, including drop of the
/// in-flight future when a long-poll client disconnects.
struct WaiterGuard<'a> {
    queue: &'a WorkQueue,
    key: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.queue
            .waiters
            .lock()
            .expect("waiter lock poisoned")
            .remove(&self.key);
    }
}
