//! ClusterRegistry: the single consistency boundary over nodes and pods.
//!
//! `ClusterState` is a plain, synchronous data structure. `ClusterRegistry`
//! wraps it in one `tokio::sync::Mutex`; callers lock once, run every step
//! of an operation against the guard, then release it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::types::*;

/// In-memory node and pod maps.
///
/// Node enumeration order is registration order and is kept in an explicit
/// list, so first-fit placement is reproducible.
#[derive(Debug, Default)]
pub struct ClusterState {
    node_order: Vec<NodeId>,
    nodes: HashMap<NodeId, Node>,
    pod_order: Vec<PodId>,
    pods: HashMap<PodId, Pod>,
}

impl ClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node in `Running` state with no pods.
    pub fn add_node(&mut self, cpu_capacity: u32, handle: ExecutionHandle) -> RegistryResult<NodeId> {
        if cpu_capacity == 0 {
            return Err(RegistryError::InvalidCapacity(0));
        }

        let id = Uuid::new_v4().to_string();
        let node = Node {
            id: id.clone(),
            handle,
            cpu_capacity,
            status: NodeStatus::Running,
            pod_ids: Vec::new(),
            created_at: epoch_secs(),
        };

        self.node_order.push(id.clone());
        self.nodes.insert(id.clone(), node);
        debug!(node_id = %id, cpu_capacity, "node registered");
        Ok(id)
    }

    /// Delete a node entry. Pods still pointing at it are left untouched.
    pub fn remove_node(&mut self, node_id: &str) -> RegistryResult<Node> {
        let node = self
            .nodes
            .remove(node_id)
            .ok_or_else(|| RegistryError::NodeNotFound(node_id.to_string()))?;
        self.node_order.retain(|id| id != node_id);
        debug!(%node_id, dangling_pods = node.pod_ids.len(), "node deregistered");
        Ok(node)
    }

    /// Create a pod on `node_id`. Capacity is the caller's concern.
    pub fn add_pod(&mut self, node_id: &str, cpu_request: u32) -> RegistryResult<PodId> {
        if cpu_request == 0 {
            return Err(RegistryError::InvalidRequest(0));
        }
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| RegistryError::NodeNotFound(node_id.to_string()))?;

        let id = Uuid::new_v4().to_string();
        node.pod_ids.push(id.clone());
        self.pods.insert(
            id.clone(),
            Pod {
                id: id.clone(),
                node_id: node_id.to_string(),
                cpu_request,
                created_at: epoch_secs(),
            },
        );
        self.pod_order.push(id.clone());
        debug!(pod_id = %id, %node_id, cpu_request, "pod registered");
        Ok(id)
    }

    /// Move a pod to `new_node_id`, updating both sides of the link.
    ///
    /// A missing *old* node is fine (it may have been removed already).
    pub fn reassign_pod(&mut self, pod_id: &str, new_node_id: &str) -> RegistryResult<()> {
        if !self.nodes.contains_key(new_node_id) {
            return Err(RegistryError::NodeNotFound(new_node_id.to_string()));
        }
        let pod = self
            .pods
            .get_mut(pod_id)
            .ok_or_else(|| RegistryError::PodNotFound(pod_id.to_string()))?;

        let old_node_id = std::mem::replace(&mut pod.node_id, new_node_id.to_string());
        if old_node_id == new_node_id {
            return Ok(());
        }

        if let Some(old) = self.nodes.get_mut(&old_node_id) {
            old.pod_ids.retain(|id| id != pod_id);
        }
        if let Some(new) = self.nodes.get_mut(new_node_id) {
            if !new.pod_ids.iter().any(|id| id == pod_id) {
                new.pod_ids.push(pod_id.to_string());
            }
        }

        debug!(%pod_id, from = %old_node_id, to = %new_node_id, "pod reassigned");
        Ok(())
    }

    /// Set a node's status, returning the previous one.
    pub fn set_status(&mut self, node_id: &str, status: NodeStatus) -> RegistryResult<NodeStatus> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| RegistryError::NodeNotFound(node_id.to_string()))?;
        Ok(std::mem::replace(&mut node.status, status))
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn pod(&self, pod_id: &str) -> Option<&Pod> {
        self.pods.get(pod_id)
    }

    /// Nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Pods in creation order.
    pub fn pods(&self) -> impl Iterator<Item = &Pod> {
        self.pod_order.iter().filter_map(|id| self.pods.get(id))
    }

    /// Sum of `cpu_request` over the node's assigned pods.
    pub fn used_cpu(&self, node_id: &str) -> Option<u32> {
        let node = self.nodes.get(node_id)?;
        Some(
            node.pod_ids
                .iter()
                .filter_map(|id| self.pods.get(id))
                .fold(0u32, |used, p| used.saturating_add(p.cpu_request)),
        )
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            nodes: self.nodes().cloned().collect(),
            pods: self.pods().cloned().collect(),
        }
    }
}

/// Thread-safe handle to the cluster state. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ClusterRegistry {
    inner: Arc<Mutex<ClusterState>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the consistency boundary.
    pub async fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.inner.lock().await
    }

    pub async fn add_node(&self, cpu_capacity: u32, handle: ExecutionHandle) -> RegistryResult<NodeId> {
        self.lock().await.add_node(cpu_capacity, handle)
    }

    pub async fn add_pod(&self, node_id: &str, cpu_request: u32) -> RegistryResult<PodId> {
        self.lock().await.add_pod(node_id, cpu_request)
    }

    pub async fn snapshot(&self) -> ClusterSnapshot {
        self.lock().await.snapshot()
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
