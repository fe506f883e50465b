//! The execution backend capability interface.

use async_trait::async_trait;
use uuid::Uuid;

use podgrid_state::{ExecutionHandle, NodeStatus};

use crate::error::BackendResult;

/// What the backend needs to provision one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    /// Unique name for the isolated unit (container name).
    pub name: String,
    pub cpu_capacity: u32,
}

impl NodeSpec {
    /// Spec with a freshly generated unit name.
    pub fn new(cpu_capacity: u32) -> Self {
        Self {
            name: format!("podgrid-node-{}", Uuid::new_v4().simple()),
            cpu_capacity,
        }
    }
}

/// Liveness reported by a successful `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    Live,
    /// The unit exists but is not running; carries the backend's status.
    NotLive(String),
}

impl Liveness {
    /// Node status this liveness maps to.
    pub fn node_status(&self) -> NodeStatus {
        match self {
            Self::Live => NodeStatus::Running,
            Self::NotLive(_) => NodeStatus::Unreachable,
        }
    }
}

/// Lifecycle primitives for the isolated unit behind a node.
///
/// Calls may block on I/O; the control plane never invokes them while
/// holding the registry lock.
#[async_trait]
pub trait ExecutionBackend: Send + Sync + 'static {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Provision and start a unit for a new node.
    async fn create(&self, spec: &NodeSpec) -> BackendResult<ExecutionHandle>;

    /// Report whether the unit is alive.
    async fn inspect(&self, handle: &ExecutionHandle) -> BackendResult<Liveness>;

    /// Stop the unit. Best effort.
    async fn stop(&self, handle: &ExecutionHandle) -> BackendResult<()>;

    /// Release the unit. Best effort.
    async fn remove(&self, handle: &ExecutionHandle) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_spec_names_are_unique() {
        let a = NodeSpec::new(2);
        let b = NodeSpec::new(2);
        assert_ne!(a.name, b.name);
        assert!(a.name.starts_with("podgrid-node-"));
        assert_eq!(a.cpu_capacity, 2);
    }

    #[test]
    fn liveness_maps_to_status() {
        assert_eq!(Liveness::Live.node_status(), NodeStatus::Running);
        assert_eq!(
            Liveness::NotLive("exited".to_string()).node_status(),
            NodeStatus::Unreachable
        );
    }
}
