//! Control plane error types.

use thiserror::Error;

use podgrid_backend::BackendError;
use podgrid_state::RegistryError;

/// Errors returned by control plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("no available node for cpu request {0}")]
    NoCapacity(u32),

    #[error("execution backend failure: {0}")]
    Backend(#[from] BackendError),
}

impl ControlError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Registry(e) if e.is_not_found())
    }
}

pub type ControlResult<T> = Result<T, ControlError>;
