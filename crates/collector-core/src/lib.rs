//! The request-brokering engine: work queue, in-flight registry, broker,
//! validator, and the operator-facing gateway.
//!
//! Callers enter through [`Broker::collect`] and suspend until an operator —
//! driven through [`OperatorGateway`] — supplies a matching response, or the
//! caller's cancel signal fires. The engine holds every in-flight request in
//! exactly one place at a time and cleans up on every exit path.

pub mod broker;
pub mod cancel;
pub mod config;
pub mod gateway;
pub mod metrics;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod validation;

pub use broker::Broker;
pub use cancel::{CancelReason, CancelSignal};
pub use config::Config;
pub use gateway::{GatewayError, Handout, OperatorGateway};
pub use metrics::{ErrorStats, StatsSnapshot};
pub use queue::{QueueError, QueueItem, QueueStatus, WorkQueue};
pub use registry::InFlightRegistry;
pub use retry::{collect_with_retry, RetryConfig};
pub use validation::{validate, ValidationError};
