//! In-memory execution backend.
//!
//! Handles are entries in a map. Tests drive node failure through
//! [`InMemoryBackend::kill`], [`InMemoryBackend::lose`] and
//! [`InMemoryBackend::set_inspect_delay`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use podgrid_state::ExecutionHandle;

use crate::backend::{ExecutionBackend, Liveness, NodeSpec};
use crate::error::{BackendError, BackendResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Running,
    Exited,
}

#[derive(Debug, Default)]
struct Inner {
    units: HashMap<ExecutionHandle, UnitState>,
    unavailable: bool,
    inspect_delay: Option<Duration>,
    created: usize,
    stopped: usize,
}

/// Backend that simulates node units in process memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a unit as exited; `inspect` then reports it not live.
    pub async fn kill(&self, handle: &ExecutionHandle) {
        if let Some(state) = self.inner.lock().await.units.get_mut(handle) {
            *state = UnitState::Exited;
        }
    }

    /// Forget a unit entirely; `inspect` then fails with `HandleNotFound`.
    pub async fn lose(&self, handle: &ExecutionHandle) {
        self.inner.lock().await.units.remove(handle);
    }

    /// Bring a killed or lost unit back.
    pub async fn revive(&self, handle: &ExecutionHandle) {
        self.inner
            .lock()
            .await
            .units
            .insert(handle.clone(), UnitState::Running);
    }

    /// Make `create` fail with `Unavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().await.unavailable = unavailable;
    }

    /// Delay every `inspect` call, to exercise caller-side timeouts.
    pub async fn set_inspect_delay(&self, delay: Option<Duration>) {
        self.inner.lock().await.inspect_delay = delay;
    }

    /// Whether the unit exists and is running. `None` if unknown.
    pub async fn is_running(&self, handle: &ExecutionHandle) -> Option<bool> {
        self.inner
            .lock()
            .await
            .units
            .get(handle)
            .map(|s| *s == UnitState::Running)
    }

    pub async fn created_count(&self) -> usize {
        self.inner.lock().await.created
    }

    pub async fn stopped_count(&self) -> usize {
        self.inner.lock().await.stopped
    }
}

#[async_trait]
impl ExecutionBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, spec: &NodeSpec) -> BackendResult<ExecutionHandle> {
        if spec.cpu_capacity == 0 {
            return Err(BackendError::InvalidSpec("cpu capacity must be at least 1".to_string()));
        }
        let mut inner = self.inner.lock().await;
        if inner.unavailable {
            return Err(BackendError::Unavailable("in-memory backend disabled".to_string()));
        }
        let handle = ExecutionHandle::new(format!("mem-{}", Uuid::new_v4().simple()));
        inner.units.insert(handle.clone(), UnitState::Running);
        inner.created += 1;
        debug!(%handle, name = %spec.name, "in-memory unit created");
        Ok(handle)
    }

    async fn inspect(&self, handle: &ExecutionHandle) -> BackendResult<Liveness> {
        let delay = self.inner.lock().await.inspect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.inner.lock().await.units.get(handle) {
            Some(UnitState::Running) => Ok(Liveness::Live),
            Some(UnitState::Exited) => Ok(Liveness::NotLive("exited".to_string())),
            None => Err(BackendError::HandleNotFound(handle.to_string())),
        }
    }

    async fn stop(&self, handle: &ExecutionHandle) -> BackendResult<()> {
        let mut inner = self.inner.lock().await;
        let state = inner
            .units
            .get_mut(handle)
            .ok_or_else(|| BackendError::HandleNotFound(handle.to_string()))?;
        *state = UnitState::Exited;
        inner.stopped += 1;
        Ok(())
    }

    async fn remove(&self, handle: &ExecutionHandle) -> BackendResult<()> {
        self.inner
            .lock()
            .await
            .units
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| BackendError::HandleNotFound(handle.to_string()))
    }
}
