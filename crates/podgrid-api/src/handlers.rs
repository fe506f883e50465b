//! REST API handlers.
//!
//! Each handler calls one `ControlPlane` operation and returns the JSON
//! envelope `{ success, data?, error? }`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use podgrid_scheduler::ControlError;
use podgrid_state::{NodeId, RegistryError};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// Map a control plane error onto an HTTP status.
fn control_error(e: ControlError) -> Response {
    let status = match &e {
        ControlError::Registry(RegistryError::NodeNotFound(_) | RegistryError::PodNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        ControlError::Registry(RegistryError::InvalidCapacity(_) | RegistryError::InvalidRequest(_)) => {
            StatusCode::BAD_REQUEST
        }
        ControlError::NoCapacity(_) => StatusCode::BAD_REQUEST,
        ControlError::Backend(_) => {
            error!(error = %e, "execution backend failure");
            StatusCode::BAD_GATEWAY
        }
    };
    error_response(&e.to_string(), status)
}

/// Malformed or mistyped request bodies get the same envelope as every
/// other failure.
fn rejected_body(rejection: JsonRejection) -> Response {
    error_response(&rejection.body_text(), StatusCode::BAD_REQUEST)
}

fn default_cpu() -> i64 {
    1
}

// ── Nodes ──────────────────────────────────────────────────────

/// add-node request body.
#[derive(Debug, Deserialize)]
pub struct AddNodeRequest {
    #[serde(default = "default_cpu")]
    pub cpu_cores: i64,
}

#[derive(Debug, Serialize)]
struct AddNodeResponse {
    node_id: NodeId,
    cpu_capacity: i64,
}

/// POST /api/v1/nodes
pub async fn add_node(
    State(state): State<ApiState>,
    body: Result<Json<AddNodeRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected_body(rejection),
    };
    match state.control.add_node(req.cpu_cores).await {
        Ok(node_id) => (
            StatusCode::CREATED,
            ApiResponse::ok(AddNodeResponse {
                node_id,
                cpu_capacity: req.cpu_cores,
            }),
        )
            .into_response(),
        Err(e) => control_error(e),
    }
}

/// GET /api/v1/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.control.list_nodes().await).into_response()
}

/// DELETE /api/v1/nodes/{id}
pub async fn stop_node(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.control.stop_node(&id).await {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(e) => control_error(e),
    }
}

// ── Pods ───────────────────────────────────────────────────────

/// launch-pod request body.
#[derive(Debug, Deserialize)]
pub struct LaunchPodRequest {
    #[serde(default = "default_cpu")]
    pub cpu_request: i64,
}

/// POST /api/v1/pods
pub async fn launch_pod(
    State(state): State<ApiState>,
    body: Result<Json<LaunchPodRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected_body(rejection),
    };
    match state.control.launch_pod(req.cpu_request).await {
        Ok(launched) => (StatusCode::CREATED, ApiResponse::ok(launched)).into_response(),
        Err(e) => control_error(e),
    }
}

/// GET /api/v1/pods/{id}
pub async fn pod_status(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.control.pod_status(&id).await {
        Ok(status) => ApiResponse::ok(status).into_response(),
        Err(e) => control_error(e),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
