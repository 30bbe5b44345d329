//! Transport layer for the collector broker: the operator HTTP surface and
//! the caller RPC surface, each on its own listener.

pub mod http;
pub mod rpc;

pub use http::{operator_router, AppState};
pub use rpc::rpc_router;
