//! ControlPlane: the operations exposed to API clients.
//!
//! Backend calls happen outside the registry lock: the handle is read under
//! the lock, the backend is called without it, and the lock is re-acquired
//! to apply the result.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use podgrid_backend::{ExecutionBackend, NodeSpec};
use podgrid_placement::first_fit;
use podgrid_state::*;

use crate::error::{ControlError, ControlResult};
use crate::migration::migrate_pods;

/// Result of a successful launch-pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchedPod {
    pub pod_id: PodId,
    pub node_id: NodeId,
}

/// Result of pod-status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodStatus {
    pub pod_id: PodId,
    pub node_id: NodeId,
    pub cpu_request: u32,
    /// False when the hosting node is gone or not running.
    pub served: bool,
}

/// Result of stop-node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub node_id: NodeId,
    /// Pods that were on the node when it was removed.
    pub orphaned: Vec<PodId>,
    pub migrated: Vec<PodId>,
    /// Pods left pointing at the removed node.
    pub failed: Vec<PodId>,
    /// Set when stopping the backend unit failed; removal went ahead anyway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_error: Option<String>,
}

/// Cluster registry plus execution backend.
#[derive(Clone)]
pub struct ControlPlane {
    registry: ClusterRegistry,
    backend: Arc<dyn ExecutionBackend>,
}

impl std::fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlane")
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl ControlPlane {
    pub fn new(registry: ClusterRegistry, backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { registry, backend }
    }

    /// add-node: provision a backend unit and register a `Running` node.
    pub async fn add_node(&self, cpu_capacity: i64) -> ControlResult<NodeId> {
        let cpu_capacity = positive(cpu_capacity).ok_or(RegistryError::InvalidCapacity(cpu_capacity))?;

        let spec = NodeSpec::new(cpu_capacity);
        let handle = self.backend.create(&spec).await?;

        match self.registry.add_node(cpu_capacity, handle.clone()).await {
            Ok(node_id) => {
                info!(%node_id, cpu_capacity, %handle, backend = self.backend.name(), "node added");
                Ok(node_id)
            }
            Err(e) => {
                // Do not leak the unit we just created.
                if let Err(cleanup) = self.backend.remove(&handle).await {
                    warn!(%handle, error = %cleanup, "failed to clean up unregistered unit");
                }
                Err(e.into())
            }
        }
    }

    /// list-nodes: consistent snapshot of every node and pod.
    pub async fn list_nodes(&self) -> ClusterSnapshot {
        self.registry.snapshot().await
    }

    /// stop-node: stop the backend unit, migrate the node's pods once, and
    /// delete the node record.
    ///
    /// The node is marked `Removed` first so that neither placement nor the
    /// liveness monitor touches it while the backend call is in flight.
    pub async fn stop_node(&self, node_id: &str) -> ControlResult<StopReport> {
        let handle = {
            let mut state = self.registry.lock().await;
            let node = state
                .node(node_id)
                .ok_or_else(|| RegistryError::NodeNotFound(node_id.to_string()))?;
            if node.status == NodeStatus::Removed {
                // Another stop-node owns this removal.
                return Err(RegistryError::NodeNotFound(node_id.to_string()).into());
            }
            let handle = node.handle.clone();
            state.set_status(node_id, NodeStatus::Removed)?;
            handle
        };

        let mut backend_error = None;
        if let Err(e) = self.backend.stop(&handle).await {
            warn!(%node_id, %handle, error = %e, "failed to stop node unit");
            backend_error = Some(e.to_string());
        }
        if let Err(e) = self.backend.remove(&handle).await {
            warn!(%node_id, %handle, error = %e, "failed to remove node unit");
            backend_error.get_or_insert_with(|| e.to_string());
        }

        let mut state = self.registry.lock().await;
        let orphaned = state
            .node(node_id)
            .map(|n| n.pod_ids.clone())
            .unwrap_or_default();
        let report = migrate_pods(&mut state, node_id, &orphaned);
        if let Err(e) = state.remove_node(node_id) {
            warn!(%node_id, error = %e, "node already gone at removal");
        }
        drop(state);

        info!(
            %node_id,
            orphaned = orphaned.len(),
            migrated = report.migrated.len(),
            failed = report.failed.len(),
            "node stopped"
        );

        Ok(StopReport {
            node_id: node_id.to_string(),
            orphaned,
            migrated: report.migrated,
            failed: report.failed,
            backend_error,
        })
    }

    /// launch-pod: first-fit placement and registration in one critical
    /// section.
    pub async fn launch_pod(&self, cpu_request: i64) -> ControlResult<LaunchedPod> {
        let cpu_request = positive(cpu_request).ok_or(RegistryError::InvalidRequest(cpu_request))?;

        let mut state = self.registry.lock().await;
        let node_id = first_fit(&state, cpu_request).ok_or(ControlError::NoCapacity(cpu_request))?;
        let pod_id = state.add_pod(&node_id, cpu_request)?;
        drop(state);

        info!(%pod_id, %node_id, cpu_request, "pod launched");
        Ok(LaunchedPod { pod_id, node_id })
    }

    /// pod-status: where a pod currently lives.
    pub async fn pod_status(&self, pod_id: &str) -> ControlResult<PodStatus> {
        let state = self.registry.lock().await;
        let pod = state
            .pod(pod_id)
            .ok_or_else(|| RegistryError::PodNotFound(pod_id.to_string()))?;
        let served = state
            .node(&pod.node_id)
            .is_some_and(|n| n.status == NodeStatus::Running);

        Ok(PodStatus {
            pod_id: pod.id.clone(),
            node_id: pod.node_id.clone(),
            cpu_request: pod.cpu_request,
            served,
        })
    }
}

fn positive(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v > 0)
}
