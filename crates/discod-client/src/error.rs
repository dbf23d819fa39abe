//! Error types for constructing sessions and watch objects.
//!
//! Two failure taxonomies exist deliberately:
//!
//! - Constructing a [`crate::Client`] or one of its children yields a
//!   [`ClientError`], which distinguishes local argument rejection from a
//!   daemon refusal. No partially-constructed object is ever returned and
//!   nothing needs releasing on failure.
//! - Operations on live objects (`start`, `commit`, `add_service`, ...)
//!   return `Result<_, ErrorCode>` directly: local validation failures are
//!   mapped into the same closed status-code space as daemon rejections, so
//!   callers handle both uniformly.

use discod_core::ErrorCode;
use thiserror::Error;

/// Failure to construct a client or one of its watch objects.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The daemon (or the binding layer) refused the request.
    #[error("daemon call failed: {0}")]
    Daemon(#[from] ErrorCode),

    /// An argument was rejected before the daemon was contacted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ClientError {
    /// The daemon status code behind this error, if there is one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Daemon(code) => Some(*code),
            ClientError::InvalidArgument(_) => None,
        }
    }
}

/// Convenience Result type alias for construction operations.
pub type Result<T> = std::result::Result<T, ClientError>;
