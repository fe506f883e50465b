//! Server-rendered cluster overview.
//!
//! One page, no client-side state: a table of nodes in placement order
//! and a table of pods with their hosting node.

use askama::Template;
use axum::extract::State;
use axum::response::Html;

use podgrid_state::{ClusterSnapshot, NodeStatus};

use crate::ApiState;

fn render<T: Template>(tmpl: T) -> Html<String> {
    Html(tmpl.render().unwrap_or_else(|e| {
        format!("<pre>Template error: {e}</pre>")
    }))
}

pub struct NodeView {
    pub id: String,
    pub status: String,
    pub cpu_capacity: u32,
    pub cpu_used: u32,
    pub pod_count: usize,
}

pub struct PodView {
    pub id: String,
    pub node_id: String,
    pub cpu_request: u32,
    pub served: bool,
}

pub struct ClusterSummary {
    pub running: usize,
    pub unreachable: usize,
    pub cpu_capacity: u64,
    pub cpu_used: u64,
    pub pods: usize,
    pub dangling: usize,
}

#[derive(Template)]
#[template(path = "overview.html")]
struct OverviewTemplate {
    summary: ClusterSummary,
    nodes: Vec<NodeView>,
    pods: Vec<PodView>,
}

fn build_views(snapshot: &ClusterSnapshot) -> (ClusterSummary, Vec<NodeView>, Vec<PodView>) {
    let nodes: Vec<NodeView> = snapshot
        .nodes
        .iter()
        .map(|n| NodeView {
            id: n.id.clone(),
            status: n.status.to_string(),
            cpu_capacity: n.cpu_capacity,
            cpu_used: snapshot.used_cpu(&n.id),
            pod_count: n.pod_ids.len(),
        })
        .collect();

    let pods: Vec<PodView> = snapshot
        .pods
        .iter()
        .map(|p| PodView {
            id: p.id.clone(),
            node_id: p.node_id.clone(),
            cpu_request: p.cpu_request,
            served: snapshot
                .node(&p.node_id)
                .is_some_and(|n| n.status == NodeStatus::Running),
        })
        .collect();

    let running: Vec<_> = snapshot
        .nodes
        .iter()
        .filter(|n| n.status == NodeStatus::Running)
        .collect();

    let summary = ClusterSummary {
        running: running.len(),
        unreachable: snapshot
            .nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Unreachable)
            .count(),
        cpu_capacity: running.iter().map(|n| u64::from(n.cpu_capacity)).sum(),
        cpu_used: running
            .iter()
            .map(|n| u64::from(snapshot.used_cpu(&n.id)))
            .sum(),
        pods: pods.len(),
        dangling: pods.iter().filter(|p| !p.served).count(),
    };

    (summary, nodes, pods)
}

/// GET /
pub async fn overview(State(state): State<ApiState>) -> Html<String> {
    let snapshot = state.control.list_nodes().await;
    let (summary, nodes, pods) = build_views(&snapshot);
    render(OverviewTemplate {
        summary,
        nodes,
        pods,
    })
}
