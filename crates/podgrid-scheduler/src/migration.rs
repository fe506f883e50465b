//! Migration engine: re-home the pods of a lost node.
//!
//! Runs against a locked `ClusterState`, so a whole migration pass is one
//! atomic step for every other registry user. Each pod is tried once, in
//! the order given. Pods that find no capacity keep their stale `node_id`
//! and are reported as failed; the liveness monitor's next cycle is the
//! retry.

use serde::Serialize;
use tracing::{debug, info, warn};

use podgrid_placement::first_fit_excluding;
use podgrid_state::{ClusterState, PodId};

/// Outcome of one migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Pods now hosted by another node.
    pub migrated: Vec<PodId>,
    /// Pods left on the source node for lack of capacity.
    pub failed: Vec<PodId>,
    /// Pods that no longer pointed at the source node, or no longer exist.
    pub skipped: Vec<PodId>,
}

/// Move every pod in `pod_ids` still hosted by `source` onto another node.
///
/// A pod whose current `node_id` differs from `source` was already
/// re-homed by a concurrent pass and is skipped.
pub fn migrate_pods(state: &mut ClusterState, source: &str, pod_ids: &[PodId]) -> MigrationReport {
    let mut report = MigrationReport::default();

    for pod_id in pod_ids {
        let Some(pod) = state.pod(pod_id) else {
            warn!(%pod_id, %source, "pod vanished before migration");
            report.skipped.push(pod_id.clone());
            continue;
        };
        if pod.node_id != source {
            debug!(%pod_id, %source, current = %pod.node_id, "pod already re-homed");
            report.skipped.push(pod_id.clone());
            continue;
        }

        let cpu_request = pod.cpu_request;
        let Some(target) = first_fit_excluding(state, cpu_request, Some(source)) else {
            info!(%pod_id, %source, cpu_request, "no available node to migrate pod");
            report.failed.push(pod_id.clone());
            continue;
        };

        match state.reassign_pod(pod_id, &target) {
            Ok(()) => {
                info!(%pod_id, from = %source, to = %target, "pod migrated");
                report.migrated.push(pod_id.clone());
            }
            Err(e) => {
                warn!(%pod_id, %source, %target, error = %e, "pod reassignment failed");
                report.failed.push(pod_id.clone());
            }
        }
    }

    report
}
