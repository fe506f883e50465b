//! podgrid-api: REST API for PodGrid.
//!
//! Thin axum layer: every route maps 1:1 onto a `ControlPlane` operation.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | HTML cluster overview |
//! | GET | `/healthz` | Liveness of the control plane itself |
//! | GET | `/api/v1/nodes` | List nodes and pods (add-node: POST) |
//! | DELETE | `/api/v1/nodes/{id}` | Stop a node and migrate its pods |
//! | POST | `/api/v1/pods` | Launch a pod |
//! | GET | `/api/v1/pods/{id}` | Pod status |

pub mod dashboard;
pub mod handlers;

use axum::Router;
use axum::routing::{delete, get, post};
use podgrid_scheduler::ControlPlane;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub control: ControlPlane,
}

/// Build the complete router (REST + overview page).
pub fn build_router(control: ControlPlane) -> Router {
    let state = ApiState { control };

    let api_routes = Router::new()
        .route("/nodes", get(handlers::list_nodes).post(handlers::add_node))
        .route("/nodes/{id}", delete(handlers::stop_node))
        .route("/pods", post(handlers::launch_pod))
        .route("/pods/{id}", get(handlers::pod_status));

    Router::new()
        .route("/", get(dashboard::overview))
        .route("/healthz", get(handlers::healthz))
        .nest("/api/v1", api_routes)
        .with_state(state)
}
