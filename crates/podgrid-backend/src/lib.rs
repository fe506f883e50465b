//! podgrid-backend: execution backends that host PodGrid nodes.
//!
//! The control plane only sees the [`ExecutionBackend`] capability trait:
//! create an isolated unit for a node, inspect whether it is alive, stop
//! it and remove it. Two implementations ship here:
//!
//! - [`DockerBackend`] runs one detached container per node through the
//!   Docker Engine API.
//! - [`InMemoryBackend`] keeps fake handles in a map and lets tests kill
//!   or lose them on demand.

pub mod backend;
pub mod docker;
pub mod error;
pub mod memory;

pub use backend::{ExecutionBackend, Liveness, NodeSpec};
pub use docker::DockerBackend;
pub use error::{BackendError, BackendResult};
pub use memory::InMemoryBackend;
