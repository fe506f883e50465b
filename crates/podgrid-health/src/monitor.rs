//! Liveness monitor: background task that inspects every node.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use podgrid_backend::{ExecutionBackend, Liveness};
use podgrid_scheduler::migrate_pods;
use podgrid_state::*;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_INSPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Summary of one pass over all nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub inspected: usize,
    /// Nodes that ended the cycle `Unreachable`.
    pub unreachable: Vec<NodeId>,
    /// Nodes that went from `Unreachable` back to `Running`.
    pub recovered: Vec<NodeId>,
    pub migrated: Vec<PodId>,
    pub failed: Vec<PodId>,
}

/// Polls the execution backend for every node and reacts to failures.
pub struct LivenessMonitor {
    registry: ClusterRegistry,
    backend: Arc<dyn ExecutionBackend>,
    interval: Duration,
    inspect_timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(registry: ClusterRegistry, backend: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            registry,
            backend,
            interval: DEFAULT_INTERVAL,
            inspect_timeout: DEFAULT_INSPECT_TIMEOUT,
        }
    }

    /// Set the period between cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the bound on a single `inspect` call.
    pub fn with_inspect_timeout(mut self, timeout: Duration) -> Self {
        self.inspect_timeout = timeout;
        self
    }

    /// Run cycles until `shutdown` flips to `true` or its sender drops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, backend = self.backend.name(), "liveness monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    if !report.unreachable.is_empty() || !report.recovered.is_empty() {
                        info!(
                            inspected = report.inspected,
                            unreachable = report.unreachable.len(),
                            recovered = report.recovered.len(),
                            migrated = report.migrated.len(),
                            failed = report.failed.len(),
                            "liveness cycle complete"
                        );
                    } else {
                        debug!(inspected = report.inspected, "liveness cycle complete");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("liveness monitor stopped");
    }

    /// One full pass over the nodes known at the start of the cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        let targets: Vec<(NodeId, ExecutionHandle)> = {
            let state = self.registry.lock().await;
            state
                .nodes()
                .filter(|n| n.status != NodeStatus::Removed)
                .map(|n| (n.id.clone(), n.handle.clone()))
                .collect()
        };

        let mut report = CycleReport::default();
        for (node_id, handle) in targets {
            let observed = self.probe(&node_id, &handle).await;
            report.inspected += 1;
            self.apply(&node_id, observed, &mut report).await;
        }
        report
    }

    /// Inspect one node without holding the registry lock.
    async fn probe(&self, node_id: &str, handle: &ExecutionHandle) -> NodeStatus {
        match tokio::time::timeout(self.inspect_timeout, self.backend.inspect(handle)).await {
            Ok(Ok(liveness)) => {
                if let Liveness::NotLive(status) = &liveness {
                    warn!(%node_id, %handle, %status, "node unit is not running");
                }
                liveness.node_status()
            }
            Ok(Err(e)) => {
                warn!(%node_id, %handle, error = %e, "node inspect failed");
                NodeStatus::Unreachable
            }
            Err(_) => {
                warn!(%node_id, %handle, timeout = ?self.inspect_timeout, "node inspect timed out");
                NodeStatus::Unreachable
            }
        }
    }

    /// Record the observed status and migrate pods off an unreachable node.
    async fn apply(&self, node_id: &str, observed: NodeStatus, report: &mut CycleReport) {
        let mut state = self.registry.lock().await;

        let pod_ids = match state.node(node_id) {
            None => {
                debug!(%node_id, "node removed during cycle");
                return;
            }
            Some(node) if node.status == NodeStatus::Removed => {
                debug!(%node_id, "node is being stopped, skipping");
                return;
            }
            Some(node) => node.pod_ids.clone(),
        };

        let previous = match state.set_status(node_id, observed) {
            Ok(prev) => prev,
            Err(e) => {
                warn!(%node_id, error = %e, "failed to record node status");
                return;
            }
        };

        if previous != observed {
            info!(%node_id, from = %previous, to = %observed, "node status changed");
        }

        match observed {
            NodeStatus::Unreachable => {
                report.unreachable.push(node_id.to_string());
                if pod_ids.is_empty() {
                    return;
                }
                info!(%node_id, pods = pod_ids.len(), "node unreachable, migrating its pods");
                let migration = migrate_pods(&mut state, node_id, &pod_ids);
                report.migrated.extend(migration.migrated);
                report.failed.extend(migration.failed);
            }
            NodeStatus::Running if previous == NodeStatus::Unreachable => {
                report.recovered.push(node_id.to_string());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_backend::{InMemoryBackend, NodeSpec};
    use podgrid_scheduler::ControlPlane;

    struct Fixture {
        registry: ClusterRegistry,
        backend: Arc<InMemoryBackend>,
        monitor: LivenessMonitor,
    }

    fn fixture() -> Fixture {
        let registry = ClusterRegistry::new();
        let backend = Arc::new(InMemoryBackend::new());
        let monitor = LivenessMonitor::new(registry.clone(), backend.clone())
            .with_inspect_timeout(Duration::from_millis(50));
        Fixture {
            registry,
            backend,
            monitor,
        }
    }

    async fn add_node(f: &Fixture, cpu: u32) -> (NodeId, ExecutionHandle) {
        let handle = f.backend.create(&NodeSpec::new(cpu)).await.unwrap();
        let id = f.registry.add_node(cpu, handle.clone()).await.unwrap();
        (id, handle)
    }

    async fn status(f: &Fixture, node_id: &str) -> NodeStatus {
        f.registry.lock().await.node(node_id).unwrap().status
    }

    #[tokio::test]
    async fn healthy_nodes_stay_running() {
        let f = fixture();
        let (a, _) = add_node(&f, 2).await;
        let (b, _) = add_node(&f, 2).await;

        let report = f.monitor.run_cycle().await;
        assert_eq!(report.inspected, 2);
        assert!(report.unreachable.is_empty());
        assert_eq!(status(&f, &a).await, NodeStatus::Running);
        assert_eq!(status(&f, &b).await, NodeStatus::Running);
    }

    #[tokio::test]
    async fn lost_handle_marks_unreachable_and_migrates() {
        let f = fixture();
        let (a, handle_a) = add_node(&f, 2).await;
        let (b, _) = add_node(&f, 2).await;
        let p1 = f.registry.add_pod(&a, 1).await.unwrap();
        let p2 = f.registry.add_pod(&a, 1).await.unwrap();

        f.backend.lose(&handle_a).await;
        let report = f.monitor.run_cycle().await;

        assert_eq!(report.unreachable, vec![a.clone()]);
        assert_eq!(report.migrated, vec![p1.clone(), p2.clone()]);
        assert_eq!(status(&f, &a).await, NodeStatus::Unreachable);

        let snap = f.registry.snapshot().await;
        assert_eq!(snap.node(&b).unwrap().pod_ids, vec![p1, p2]);
        assert!(snap.node(&a).is_some());
    }

    #[tokio::test]
    async fn exited_unit_counts_as_unreachable() {
        let f = fixture();
        let (a, handle_a) = add_node(&f, 1).await;
        f.backend.kill(&handle_a).await;

        let report = f.monitor.run_cycle().await;
        assert_eq!(report.unreachable, vec![a.clone()]);
        assert_eq!(status(&f, &a).await, NodeStatus::Unreachable);
    }

    #[tokio::test]
    async fn slow_inspect_times_out() {
        let f = fixture();
        let (a, _) = add_node(&f, 1).await;
        f.backend.set_inspect_delay(Some(Duration::from_millis(500))).await;

        let report = f.monitor.run_cycle().await;
        assert_eq!(report.unreachable, vec![a.clone()]);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_cycle() {
        let f = fixture();
        let (a, handle_a) = add_node(&f, 1).await;
        let (b, _) = add_node(&f, 1).await;
        f.backend.lose(&handle_a).await;

        let report = f.monitor.run_cycle().await;
        assert_eq!(report.inspected, 2);
        assert_eq!(status(&f, &a).await, NodeStatus::Unreachable);
        assert_eq!(status(&f, &b).await, NodeStatus::Running);
    }

    #[tokio::test]
    async fn recovered_node_returns_to_running() {
        let f = fixture();
        let (a, handle_a) = add_node(&f, 1).await;
        f.backend.kill(&handle_a).await;
        f.monitor.run_cycle().await;
        assert_eq!(status(&f, &a).await, NodeStatus::Unreachable);

        f.backend.revive(&handle_a).await;
        let report = f.monitor.run_cycle().await;
        assert_eq!(report.recovered, vec![a.clone()]);
        assert_eq!(status(&f, &a).await, NodeStatus::Running);
    }

    #[tokio::test]
    async fn repeated_cycles_retry_without_duplicating_pods() {
        let f = fixture();
        let (a, handle_a) = add_node(&f, 2).await;
        let p1 = f.registry.add_pod(&a, 2).await.unwrap();
        f.backend.lose(&handle_a).await;

        // No capacity anywhere: the pod stays put and is retried.
        let first = f.monitor.run_cycle().await;
        assert_eq!(first.failed, vec![p1.clone()]);
        let second = f.monitor.run_cycle().await;
        assert_eq!(second.failed, vec![p1.clone()]);

        // Capacity appears; the next cycle moves the pod.
        let (b, _) = add_node(&f, 2).await;
        let third = f.monitor.run_cycle().await;
        assert_eq!(third.migrated, vec![p1.clone()]);

        // Later cycles find nothing left to move.
        let fourth = f.monitor.run_cycle().await;
        assert!(fourth.migrated.is_empty());
        assert!(fourth.failed.is_empty());

        let snap = f.registry.snapshot().await;
        assert_eq!(snap.pods.len(), 1);
        assert_eq!(snap.pod(&p1).unwrap().node_id, b);
    }

    #[tokio::test]
    async fn removed_nodes_are_left_alone() {
        let f = fixture();
        let (a, handle_a) = add_node(&f, 1).await;
        f.registry
            .lock()
            .await
            .set_status(&a, NodeStatus::Removed)
            .unwrap();
        f.backend.lose(&handle_a).await;

        let report = f.monitor.run_cycle().await;
        assert_eq!(report.inspected, 0);
        assert_eq!(status(&f, &a).await, NodeStatus::Removed);
    }

    #[tokio::test]
    async fn node_stopped_mid_cycle_is_skipped() {
        let registry = ClusterRegistry::new();
        let backend = Arc::new(InMemoryBackend::new());
        let control = ControlPlane::new(registry.clone(), backend.clone());
        let monitor = Arc::new(
            LivenessMonitor::new(registry.clone(), backend.clone())
                .with_inspect_timeout(Duration::from_secs(5)),
        );

        let a = control.add_node(1).await.unwrap();
        let b = control.add_node(1).await.unwrap();
        let pod = control.launch_pod(1).await.unwrap().pod_id;
        backend.set_inspect_delay(Some(Duration::from_millis(200))).await;

        // The cycle collects both nodes, then blocks in A's inspect.
        let cycle = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run_cycle().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stopped = control.stop_node(&a).await.unwrap();
        assert_eq!(stopped.migrated, vec![pod.clone()]);

        let report = cycle.await.unwrap();
        assert_eq!(report.inspected, 2);
        assert!(report.unreachable.is_empty());
        assert!(report.migrated.is_empty());

        let snap = registry.snapshot().await;
        assert!(snap.node(&a).is_none());
        assert_eq!(snap.node(&b).unwrap().status, NodeStatus::Running);
        assert_eq!(snap.pod(&pod).unwrap().node_id, b);
        assert_eq!(snap.pods.len(), 1);
    }

    #[tokio::test]
    async fn apply_ignores_a_node_removed_after_collection() {
        let f = fixture();
        let (a, _) = add_node(&f, 2).await;
        let (b, _) = add_node(&f, 2).await;
        let pod = f.registry.add_pod(&a, 1).await.unwrap();
        f.registry.lock().await.remove_node(&a).unwrap();

        let mut report = CycleReport::default();
        f.monitor.apply(&a, NodeStatus::Unreachable, &mut report).await;

        assert_eq!(report, CycleReport::default());
        let state = f.registry.lock().await;
        assert_eq!(state.pod(&pod).unwrap().node_id, a);
        assert!(state.node(&b).unwrap().pod_ids.is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let f = fixture();
        add_node(&f, 1).await;
        let monitor = f.monitor.with_interval(Duration::from_millis(10));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(monitor.run(rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn run_detects_failure_in_background() {
        let f = fixture();
        let (a, handle_a) = add_node(&f, 1).await;
        let registry = f.registry.clone();
        let backend = f.backend.clone();
        let monitor = f.monitor.with_interval(Duration::from_millis(10));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(monitor.run(rx));

        backend.lose(&handle_a).await;
        let mut became_unreachable = false;
        for _ in 0..100 {
            if registry.lock().await.node(&a).unwrap().status == NodeStatus::Unreachable {
                became_unreachable = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tx.send(true).unwrap();
        task.await.unwrap();
        assert!(became_unreachable);
    }
}
