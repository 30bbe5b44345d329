//! Operator-facing coordination over the work queue and in-flight registry:
//! take next, submit for id, defer id.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use collector_types::proto::{Request, Response};

use crate::queue::{QueueStatus, WorkQueue};
use crate::registry::InFlightRegistry;
use crate::validation::validate;

/// An item handed to an operator: its id, the request to render, and a queue
/// snapshot taken after the item left the queue.
#[derive(Debug, Clone)]
pub struct Handout {
    pub id: String,
    pub request: Request,
    pub queue: QueueStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no pending requests available")]
    WaitTimeout,

    #[error("invalid request data: {0}")]
    InvalidItem(String),

    #[error("pending request not found: {0}")]
    NotFound(String),

    #[error("invalid response format: {0}")]
    MalformedReply(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub struct OperatorGateway {
    queue: Arc<WorkQueue>,
    registry: Arc<InFlightRegistry>,
}

impl OperatorGateway {
    pub fn new(queue: Arc<WorkQueue>, registry: Arc<InFlightRegistry>) -> Self {
        Self { queue, registry }
    }

    /// Takes the next eligible item, registers it in-flight, and returns it
    /// for rendering.
    ///
    /// Items whose caller already cancelled are discarded on sight. The
    /// request is validated again at take time: admission already validated
    /// it, but take-time validation catches corruption and lets the rules
    /// evolve independently. A failure discards the item, which closes its
    /// reply channel and unblocks the suspended caller with an internal error.
    pub async fn take_next(&self, wait: Duration) -> Result<Handout, GatewayError> {
        let deadline = Instant::now() + wait;
        loop {
            let item = self
                .queue
                .take_next(deadline)
                .await
                .map_err(|_| GatewayError::WaitTimeout)?;

            if item.cancel.is_fired() {
                tracing::debug!(id = %item.id, "discarding abandoned item at take");
                continue;
            }

            if let Err(e) = validate(&item.request) {
                tracing::warn!(id = %item.id, error = %e, "invalid item at take");
                return Err(GatewayError::InvalidItem(e.to_string()));
            }

            let id = item.id.clone();
            let request = item.request.clone();
            let waited = item
                .enqueued_at
                .elapsed()
                .unwrap_or_default();
            self.registry.put(item);
            tracing::debug!(%id, waited_ms = waited.as_millis() as u64, "item handed to operator");

            return Ok(Handout {
                id,
                request,
                queue: self.queue.status(),
            });
        }
    }

    /// Decodes the operator's response body and delivers it to the suspended
    /// caller. A malformed body is terminal for the item: it has already left
    /// the registry, and the caller will observe its own deadline or the
    /// closed reply channel.
    pub fn submit(&self, id: &str, body: &[u8]) -> Result<(), GatewayError> {
        let item = self
            .registry
            .take(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;

        let response: Response = serde_json::from_slice(body)
            .map_err(|e| GatewayError::MalformedReply(e.to_string()))?;

        // The caller may have cancelled concurrently; the value is then
        // discarded, which is fine — nobody is waiting for it.
        if item.reply.send(response).is_err() {
            tracing::debug!(%id, "caller gone before delivery");
        } else {
            tracing::debug!(%id, "response submitted");
        }
        Ok(())
    }

    /// Puts a taken item back at the tail marked deferred, then serves the
    /// next eligible item to the operator.
    pub async fn defer(&self, id: &str, wait: Duration) -> Result<Handout, GatewayError> {
        let mut item = self
            .registry
            .take(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;

        item.deferred = true;
        tracing::debug!(%id, "item deferred");
        self.queue
            .enqueue(item)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        self.take_next(wait).await
    }
}
