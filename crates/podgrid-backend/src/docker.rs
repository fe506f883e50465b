//! Docker execution backend.
//!
//! Each node is one detached container running a long-lived idle command
//! (`alpine` + `sleep infinity` by default). The container id is the
//! node's execution handle.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use podgrid_state::ExecutionHandle;

use crate::backend::{ExecutionBackend, Liveness, NodeSpec};
use crate::error::{BackendError, BackendResult};

/// Label set on every container created by PodGrid.
const NODE_LABEL: &str = "io.podgrid.node";

/// Seconds Docker waits before killing a container on stop.
const STOP_GRACE_SECS: i64 = 5;

/// Backend that hosts nodes as Docker containers.
pub struct DockerBackend {
    docker: Docker,
    image: String,
    command: Vec<String>,
}

impl std::fmt::Debug for DockerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerBackend")
            .field("image", &self.image)
            .field("command", &self.command)
            .finish()
    }
}

impl DockerBackend {
    /// Connect to the local Docker daemon (socket or `DOCKER_HOST`).
    pub fn connect(image: impl Into<String>, command: Vec<String>) -> BackendResult<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(Self {
            docker,
            image: image.into(),
            command,
        })
    }

    /// Verify the daemon answers.
    pub async fn ping(&self) -> BackendResult<()> {
        self.docker.ping().await.map_err(map_docker_err)?;
        Ok(())
    }

    /// Pull the node image if the daemon does not have it yet.
    async fn ensure_image(&self) -> BackendResult<()> {
        if self.docker.inspect_image(&self.image).await.is_ok() {
            return Ok(());
        }

        let (repo, tag) = split_image_ref(&self.image);
        info!(image = %self.image, "pulling node image");
        let options = CreateImageOptions {
            from_image: repo,
            tag,
            ..Default::default()
        };
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(step) = progress.next().await {
            step.map_err(|e| match e {
                DockerError::DockerResponseServerError { status_code: 404, message } => {
                    BackendError::InvalidSpec(format!("image {}: {message}", self.image))
                }
                other => map_docker_err(other),
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionBackend for DockerBackend {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn create(&self, spec: &NodeSpec) -> BackendResult<ExecutionHandle> {
        if spec.cpu_capacity == 0 {
            return Err(BackendError::InvalidSpec("cpu capacity must be at least 1".to_string()));
        }
        self.ensure_image().await?;

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };
        let config = Config {
            image: Some(self.image.clone()),
            cmd: Some(self.command.clone()),
            labels: Some(HashMap::from([(
                NODE_LABEL.to_string(),
                spec.cpu_capacity.to_string(),
            )])),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| match e {
                DockerError::DockerResponseServerError { status_code: 400, message } => {
                    BackendError::InvalidSpec(message)
                }
                other => map_docker_err(other),
            })?;

        if let Err(e) = self
            .docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
        {
            let options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            if let Err(cleanup) = self.docker.remove_container(&created.id, Some(options)).await {
                warn!(container = %created.id, error = %cleanup, "failed to remove unstarted container");
            }
            return Err(map_docker_err(e));
        }

        debug!(container = %created.id, name = %spec.name, "node container started");
        Ok(ExecutionHandle::new(created.id))
    }

    async fn inspect(&self, handle: &ExecutionHandle) -> BackendResult<Liveness> {
        let info = self
            .docker
            .inspect_container(handle.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_docker_err)?;

        let state = info.state.unwrap_or_default();
        if state.running == Some(true) {
            Ok(Liveness::Live)
        } else {
            let status = state
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Ok(Liveness::NotLive(status))
        }
    }

    async fn stop(&self, handle: &ExecutionHandle) -> BackendResult<()> {
        self.docker
            .stop_container(handle.as_str(), Some(StopContainerOptions { t: STOP_GRACE_SECS }))
            .await
            .map_err(map_docker_err)
    }

    async fn remove(&self, handle: &ExecutionHandle) -> BackendResult<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(handle.as_str(), Some(options))
            .await
            .map_err(map_docker_err)
    }
}

fn map_docker_err(e: DockerError) -> BackendError {
    match e {
        DockerError::DockerResponseServerError { status_code: 404, message } => {
            BackendError::HandleNotFound(message)
        }
        DockerError::DockerResponseServerError { status_code, message } => {
            BackendError::Other(format!("docker responded {status_code}: {message}"))
        }
        DockerError::RequestTimeoutError => {
            BackendError::Unavailable("docker request timed out".to_string())
        }
        other => BackendError::Unavailable(other.to_string()),
    }
}

/// Split `repo[:tag]` so a bare name pulls `latest` instead of every tag.
fn split_image_ref(image: &str) -> (String, String) {
    let last_segment_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[last_segment_start..].rfind(':') {
        Some(pos) => {
            let split = last_segment_start + pos;
            (image[..split].to_string(), image[split + 1..].to_string())
        }
        None => (image.to_string(), "latest".to_string()),
    }
}
