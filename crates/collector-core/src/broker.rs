//! The broker: admits caller requests, suspends the caller until an operator
//! responds, and cleans up on every exit path.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::oneshot;
use uuid::Uuid;

use collector_types::proto::{Request, Response};
use collector_types::CollectorError;

use crate::cancel::{CancelReason, CancelSignal};
use crate::queue::{QueueItem, WorkQueue};
use crate::registry::InFlightRegistry;
use crate::validation::validate;

pub struct Broker {
    queue: Arc<WorkQueue>,
    registry: Arc<InFlightRegistry>,
    max_inflight: usize,
}

impl Broker {
    pub fn new(
        queue: Arc<WorkQueue>,
        registry: Arc<InFlightRegistry>,
        max_inflight: usize,
    ) -> Self {
        Self {
            queue,
            registry,
            max_inflight,
        }
    }

    /// Accepts a request and suspends until an operator submits a response or
    /// the caller's cancel signal fires.
    ///
    /// The item is removed from the queue and the registry on every exit path,
    /// including drop of this future while suspended. At the moment the signal
    /// fires the item may still be queued, already handed to an operator, or
    /// already submitted; both teardown calls tolerate absence, which covers
    /// all three.
    pub async fn collect(
        &self,
        request: Request,
        cancel: CancelSignal,
    ) -> Result<Response, CollectorError> {
        validate(&request).map_err(|e| CollectorError::InvalidRequest(e.to_string()))?;

        if self.queue.status().total >= self.max_inflight {
            return Err(CollectorError::ResourceExhausted {
                resource: "pending requests".into(),
            });
        }

        let id = Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        let item = QueueItem {
            id: id.clone(),
            request,
            reply: reply_tx,
            enqueued_at: SystemTime::now(),
            deferred: false,
            cancel: cancel.clone(),
        };

        // Duplicate ids are impossible by construction; surface as internal.
        self.queue
            .enqueue(item)
            .map_err(|e| CollectorError::Internal(e.to_string()))?;
        tracing::debug!(%id, "request admitted");

        let _cleanup = CleanupGuard {
            queue: self.queue.as_ref(),
            registry: self.registry.as_ref(),
            id: &id,
        };

        tokio::select! {
            // Prefer the submitted value when both are ready.
            biased;
            reply = reply_rx => match reply {
                Ok(response) => {
                    tracing::debug!(%id, "response delivered");
                    Ok(response)
                }
                Err(_) => Err(CollectorError::Internal("reply channel closed".into())),
            },
            reason = cancel.fired() => {
                tracing::debug!(%id, ?reason, "collect abandoned");
                Err(match reason {
                    CancelReason::DeadlineExceeded => CollectorError::Timeout {
                        operation: "collect".into(),
                    },
                    CancelReason::Cancelled => CollectorError::Cancelled,
                })
            }
        }
    }

    pub fn max_inflight(&self) -> usize {
        self.max_inflight
    }
}

/// Removes the item from wherever it currently lives. Both calls are
/// idempotent no-ops when the item has already moved on.
struct CleanupGuard<'a> {
    queue: &'a WorkQueue,
    registry: &'a InFlightRegistry,
    id: &'a str,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        let _ = self.queue.remove(self.id);
        self.registry.remove(self.id);
    }
}
