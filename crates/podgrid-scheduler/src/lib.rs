//! podgrid-scheduler: the control plane operations.
//!
//! Composes the cluster registry, first-fit placement and an execution
//! backend into the operations exposed to clients:
//!
//! - add-node / stop-node (node lifecycle, backed by the backend)
//! - launch-pod / pod-status
//! - list-nodes (registry snapshot)
//!
//! It also owns the migration engine, which re-homes the pods of an
//! unreachable or removed node. Both stop-node and the liveness monitor
//! call into it.
//!
//! # Architecture
//!
//! ```text
//! ControlPlane
//!   ├── ClusterRegistry (single mutex over nodes + pods)
//!   ├── first_fit() placement
//!   ├── migrate_pods() on node loss
//!   └── Arc<dyn ExecutionBackend> (called outside the lock)
//! ```

pub mod control;
pub mod error;
pub mod migration;

pub use control::{ControlPlane, LaunchedPod, PodStatus, StopReport};
pub use error::{ControlError, ControlResult};
pub use migration::{MigrationReport, migrate_pods};
