//! podgrid-state: the cluster registry for PodGrid.
//!
//! Holds the authoritative in-memory view of nodes and pods. Nothing is
//! persisted; a restart starts from an empty cluster.
//!
//! # Architecture
//!
//! ```text
//! ClusterRegistry (Clone, Arc<Mutex<_>>)
//!   └── ClusterState
//!       ├── node order (registration order, drives first-fit)
//!       ├── nodes: NodeId → Node { handle, cpu_capacity, status, pod_ids }
//!       └── pods:  PodId  → Pod  { node_id, cpu_request }
//! ```
//!
//! Every reader and writer goes through the one mutex. Multi-step
//! operations (migrate, then reassign, then remove) hold the guard for
//! their whole duration so no caller sees a half-updated node/pod link.

pub mod error;
pub mod registry;
pub mod types;

pub use error::{RegistryError, RegistryResult};
pub use registry::{ClusterRegistry, ClusterState};
pub use types::*;
