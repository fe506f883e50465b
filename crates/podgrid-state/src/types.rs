//! Domain types for the cluster registry.
//!
//! All types serialize to JSON so the API layer can return registry
//! snapshots as-is.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// Unique identifier for a pod.
pub type PodId = String;

/// Opaque reference into the execution backend (e.g. a container id).
///
/// Owned by exactly one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionHandle(String);

impl ExecutionHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// Lifecycle status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Running,
    Unreachable,
    /// Being torn down by stop-node; excluded from placement and liveness.
    Removed,
}

impl NodeStatus {
    pub fn is_schedulable(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Unreachable => f.write_str("unreachable"),
            Self::Removed => f.write_str("removed"),
        }
    }
}

/// A worker node backed by one execution-backend handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub handle: ExecutionHandle,
    pub cpu_capacity: u32,
    pub status: NodeStatus,
    /// Pods assigned to this node, in assignment order.
    pub pod_ids: Vec<PodId>,
    /// Unix timestamp (seconds) when the node was registered.
    pub created_at: u64,
}

// ── Pod ───────────────────────────────────────────────────────────

/// A schedulable workload unit with a fixed CPU request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pod {
    pub id: PodId,
    /// Node hosting the pod. May name a node that no longer exists when
    /// migration off a removed node failed.
    pub node_id: NodeId,
    pub cpu_request: u32,
    pub created_at: u64,
}

// ── Snapshot ──────────────────────────────────────────────────────

/// Consistent point-in-time copy of the whole registry.
///
/// Nodes are listed in registration order, pods in creation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterSnapshot {
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
}

impl ClusterSnapshot {
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn pod(&self, pod_id: &str) -> Option<&Pod> {
        self.pods.iter().find(|p| p.id == pod_id)
    }

    /// CPU currently requested by the pods assigned to `node_id`.
    pub fn used_cpu(&self, node_id: &str) -> u32 {
        let Some(node) = self.node(node_id) else {
            return 0;
        };
        node.pod_ids
            .iter()
            .filter_map(|id| self.pod(id))
            .fold(0u32, |used, p| used.saturating_add(p.cpu_request))
    }
}
