//! First-fit placement.
//!
//! Nodes are scanned in registration order; the first `Running` node whose
//! free CPU covers the request wins. No scoring, no rebalancing of pods
//! that are already placed. Ties go to whichever node registered first,
//! so removing and re-adding a node moves it to the back of the line.

use tracing::{debug, trace};

use podgrid_state::{ClusterState, Node, NodeId};

/// Whether `cpu_request` fits on `node` given `used` CPU already assigned.
pub fn fits(node: &Node, used: u32, cpu_request: u32) -> bool {
    node.status.is_schedulable()
        && used
            .checked_add(cpu_request)
            .is_some_and(|total| total <= node.cpu_capacity)
}

/// Pick the first node that can host `cpu_request` CPU.
///
/// `None` means no capacity, which is a normal outcome.
pub fn first_fit(state: &ClusterState, cpu_request: u32) -> Option<NodeId> {
    first_fit_excluding(state, cpu_request, None)
}

/// Like [`first_fit`], never choosing `exclude`.
pub fn first_fit_excluding(
    state: &ClusterState,
    cpu_request: u32,
    exclude: Option<&str>,
) -> Option<NodeId> {
    for node in state.nodes() {
        if exclude == Some(node.id.as_str()) {
            continue;
        }
        let used = state.used_cpu(&node.id).unwrap_or(0);
        if fits(node, used, cpu_request) {
            debug!(node_id = %node.id, used, cpu_request, capacity = node.cpu_capacity, "placement chosen");
            return Some(node.id.clone());
        }
        trace!(node_id = %node.id, status = %node.status, used, cpu_request, "node skipped");
    }

    debug!(cpu_request, "no node has capacity");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_state::{ExecutionHandle, NodeStatus};

    fn add(state: &mut ClusterState, cpu: u32) -> NodeId {
        state.add_node(cpu, ExecutionHandle::new("h")).unwrap()
    }

    #[test]
    fn empty_cluster_has_no_capacity() {
        let state = ClusterState::new();
        assert_eq!(first_fit(&state, 1), None);
    }

    #[test]
    fn picks_first_node_with_room() {
        let mut state = ClusterState::new();
        let a = add(&mut state, 2);
        let b = add(&mut state, 8);

        assert_eq!(first_fit(&state, 2), Some(a.clone()));
        state.add_pod(&a, 2).unwrap();
        assert_eq!(first_fit(&state, 1), Some(b));
    }

    #[test]
    fn exact_fit_is_allowed() {
        let mut state = ClusterState::new();
        let a = add(&mut state, 3);
        state.add_pod(&a, 2).unwrap();
        assert_eq!(first_fit(&state, 1), Some(a));
    }

    #[test]
    fn request_larger_than_any_node() {
        let mut state = ClusterState::new();
        add(&mut state, 2);
        add(&mut state, 4);
        assert_eq!(first_fit(&state, 5), None);
    }

    #[test]
    fn first_fit_is_not_best_fit() {
        // A 1-CPU pod goes to the big node first even though the small
        // node would be a tighter fit.
        let mut state = ClusterState::new();
        let big = add(&mut state, 8);
        let _small = add(&mut state, 1);
        assert_eq!(first_fit(&state, 1), Some(big));
    }

    #[test]
    fn skips_non_running_nodes() {
        let mut state = ClusterState::new();
        let a = add(&mut state, 4);
        let b = add(&mut state, 4);
        let c = add(&mut state, 4);
        state.set_status(&a, NodeStatus::Unreachable).unwrap();
        state.set_status(&b, NodeStatus::Removed).unwrap();

        assert_eq!(first_fit(&state, 1), Some(c));
    }

    #[test]
    fn excluded_node_is_never_chosen() {
        let mut state = ClusterState::new();
        let a = add(&mut state, 4);
        let b = add(&mut state, 4);

        assert_eq!(first_fit_excluding(&state, 1, Some(&a)), Some(b.clone()));
        assert_eq!(first_fit_excluding(&state, 5, Some(&a)), None);
        assert_eq!(first_fit_excluding(&state, 1, Some(&b)), Some(a));
    }

    #[test]
    fn reordering_changes_outcome() {
        let mut state = ClusterState::new();
        let a = add(&mut state, 4);
        let b = add(&mut state, 4);
        assert_eq!(first_fit(&state, 1), Some(a.clone()));

        state.remove_node(&a).unwrap();
        let a2 = add(&mut state, 4);
        assert_eq!(first_fit(&state, 1), Some(b));
        assert_ne!(first_fit(&state, 1), Some(a2));
    }

    #[test]
    fn deterministic_for_identical_sequences() {
        fn run() -> Vec<usize> {
            let mut state = ClusterState::new();
            let nodes: Vec<_> = [3, 1, 4, 2].iter().map(|c| add(&mut state, *c)).collect();
            let mut placed = Vec::new();
            for req in [2, 1, 1, 3, 1, 2, 1] {
                if let Some(node) = first_fit(&state, req) {
                    state.add_pod(&node, req).unwrap();
                    placed.push(nodes.iter().position(|n| *n == node).unwrap());
                }
            }
            placed
        }
        assert_eq!(run(), run());
        assert_eq!(run(), vec![0, 0, 1, 2, 2, 3]);
    }

    #[test]
    fn fits_guards_overflow() {
        let mut state = ClusterState::new();
        let a = add(&mut state, u32::MAX);
        let node = state.node(&a).unwrap();
        assert!(!fits(node, u32::MAX, 1));
        assert!(fits(node, u32::MAX - 1, 1));
    }
}
