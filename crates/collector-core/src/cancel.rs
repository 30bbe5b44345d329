//! Caller-side cancellation signal with a fire-once reason.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// Why a caller's cancel signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller abandoned the request explicitly (e.g. disconnected).
    Cancelled,
    /// The caller's deadline elapsed.
    DeadlineExceeded,
}

/// A clonable cancellation signal observed by the broker while a caller is
/// suspended. The first `cancel` wins; later calls are no-ops.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal with the given reason. Idempotent.
    pub fn cancel(&self, reason: CancelReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// Resolves once the signal has fired, yielding the recorded reason.
    pub async fn fired(&self) -> CancelReason {
        self.token.cancelled().await;
        self.reason
            .get()
            .copied()
            .unwrap_or(CancelReason::Cancelled)
    }

    /// Non-blocking check used when scanning items that may already be
    /// abandoned.
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }
}
