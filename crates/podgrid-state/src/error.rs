//! Error types for the cluster registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned synchronously by registry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("pod not found: {0}")]
    PodNotFound(String),

    #[error("invalid cpu capacity {0}: must be at least 1")]
    InvalidCapacity(i64),

    #[error("invalid cpu request {0}: must be at least 1")]
    InvalidRequest(i64),
}

impl RegistryError {
    /// Whether the error refers to a missing node or pod.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NodeNotFound(_) | Self::PodNotFound(_))
    }
}
