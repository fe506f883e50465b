//! Execution backend error types.

use thiserror::Error;

/// Result type alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Failures reported by an execution backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid node spec: {0}")]
    InvalidSpec(String),

    #[error("execution handle not found: {0}")]
    HandleNotFound(String),

    #[error("backend call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("backend error: {0}")]
    Other(String),
}
