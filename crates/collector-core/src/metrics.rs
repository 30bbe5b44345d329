//! Process-wide request and error counters, surfaced over `/metrics`.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::Serialize;

use collector_types::ErrorCode;

/// Monotonic counters for coded errors plus total collect requests. Shared
/// behind an `Arc`; all updates are relaxed atomics.
#[derive(Debug, Default)]
pub struct ErrorStats {
    validation_errors: AtomicI64,
    timeout_errors: AtomicI64,
    internal_errors: AtomicI64,
    resource_exhausted: AtomicI64,
    total_requests: AtomicI64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub validation: i64,
    pub timeout: i64,
    pub internal: i64,
    pub resource_exhausted: i64,
    pub total_requests: i64,
}

impl ErrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one collect attempt, successful or not.
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a coded error. Codes without a dedicated counter are folded
    /// into `internal`.
    pub fn record_error(&self, code: ErrorCode) {
        match code {
            ErrorCode::InvalidArgument | ErrorCode::MalformedReply => {
                self.validation_errors.fetch_add(1, Ordering::Relaxed);
            }
            ErrorCode::DeadlineExceeded => {
                self.timeout_errors.fetch_add(1, Ordering::Relaxed);
            }
            ErrorCode::ResourceExhausted => {
                self.resource_exhausted.fetch_add(1, Ordering::Relaxed);
            }
            ErrorCode::Internal => {
                self.internal_errors.fetch_add(1, Ordering::Relaxed);
            }
            ErrorCode::Cancelled | ErrorCode::NotFound => {}
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            validation: self.validation_errors.load(Ordering::Relaxed),
            timeout: self.timeout_errors.load(Ordering::Relaxed),
            internal: self.internal_errors.load(Ordering::Relaxed),
            resource_exhausted: self.resource_exhausted.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
        }
    }
}
