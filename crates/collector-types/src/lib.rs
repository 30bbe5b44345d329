//! Shared wire types and the unified error taxonomy for the collector broker.
//!
//! This crate provides the foundational types used across the other collector
//! crates:
//! - `CollectorError` — unified error taxonomy with RPC-code and HTTP-status
//!   mappings
//! - `proto` — the versioned request/response payload types

pub mod proto;

use serde::Serialize;

/// Wire-level error code, shared between the RPC and HTTP surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    ResourceExhausted,
    DeadlineExceeded,
    Cancelled,
    NotFound,
    MalformedReply,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::ResourceExhausted => "resource_exhausted",
            ErrorCode::DeadlineExceeded => "deadline_exceeded",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::NotFound => "not_found",
            ErrorCode::MalformedReply => "malformed_reply",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for all collector subsystems.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{resource} limit exceeded")]
    ResourceExhausted { resource: String },

    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("invalid response format: {0}")]
    MalformedReply(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CollectorError {
    /// The wire-level code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CollectorError::InvalidRequest(_) => ErrorCode::InvalidArgument,
            CollectorError::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            CollectorError::Timeout { .. } => ErrorCode::DeadlineExceeded,
            CollectorError::Cancelled => ErrorCode::Cancelled,
            CollectorError::NotFound { .. } => ErrorCode::NotFound,
            CollectorError::MalformedReply(_) => ErrorCode::MalformedReply,
            CollectorError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Maps the error to the HTTP status code used by both transports.
    pub fn http_status(&self) -> u16 {
        match self {
            CollectorError::InvalidRequest(_) | CollectorError::MalformedReply(_) => 400,
            CollectorError::ResourceExhausted { .. } => 429,
            CollectorError::Timeout { .. } => 408,
            CollectorError::Cancelled => 499,
            CollectorError::NotFound { .. } => 404,
            CollectorError::Internal(_) => 500,
        }
    }

    /// Returns `true` if the error is transient and the operation may succeed
    /// on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CollectorError::ResourceExhausted { .. } | CollectorError::Timeout { .. }
        )
    }
}

/// A convenience alias for `Result<T, CollectorError>`.
pub type Result<T> = std::result::Result<T, CollectorError>;
