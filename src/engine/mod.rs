//! Container engine seam.
//!
//! Everything the rest of the crate knows about the engine goes through
//! [`ContainerEngine`]. The production implementation shells out to a
//! Docker-compatible CLI ([`DockerCli`]); tests use in-memory fakes.
//!
//! Only documented fields of the engine's output are consumed: container
//! state, labels, image reference, runtime name, volume existence and the
//! server API version.

pub mod docker;
#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::container::request::{CreateRequest, OneShotRequest};

pub use docker::DockerCli;

/// Captured output of a non-interactive engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    /// Exit code; `None` when the child was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Lifecycle state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// No container with that name exists.
    None,
    Created,
    Exited,
    Running,
}

impl ContainerState {
    /// Created and Exited are handled identically by the orchestrator.
    pub fn is_stopped(self) -> bool {
        matches!(self, ContainerState::Created | ContainerState::Exited)
    }

    /// Map the engine's `.State.Status` string.
    pub fn from_status(status: &str) -> Self {
        match status {
            "running" | "paused" | "restarting" => ContainerState::Running,
            "created" => ContainerState::Created,
            _ => ContainerState::Exited,
        }
    }
}

/// The subset of `container inspect` the crate relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInspect {
    pub id: String,
    pub state: ContainerState,
    pub labels: BTreeMap<String, String>,
    pub image: String,
    pub runtime: Option<String>,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("container engine '{binary}' not found; install Docker (or set AGENTBOX_ENGINE) and retry")]
    Missing { binary: String },

    #[error("`{op}` timed out after {secs}s")]
    Timeout { op: String, secs: u64 },

    /// A recognized "no such container/object/volume" response.
    #[error("`{op}`: {what} not found")]
    NotFound { op: String, what: String },

    /// A recognized "container is not running" response.
    #[error("`{op}`: container is not running")]
    NotRunning { op: String },

    #[error("`{op}` failed (exit {code}): {stderr}")]
    Failed { op: String, code: i32, stderr: String },

    #[error("failed to spawn container engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("unexpected output from `{op}`: {message}")]
    Parse { op: String, message: String },
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// `sandbox ls`. Returns the raw output even for a non-zero exit; only
    /// spawn failures and timeouts are errors.
    async fn list_sandboxes(&self) -> Result<EngineOutput, EngineError>;

    /// `Ok(None)` only for a recognized not-found response.
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInspect>, EngineError>;

    /// Start a detached, auto-removing container and return its full id.
    async fn run_ephemeral(&self, name: &str, image: &str, command: &[String]) -> Result<String, EngineError>;

    /// Non-interactive exec, returning stdout.
    async fn exec_capture(&self, id: &str, command: &[String]) -> Result<String, EngineError>;

    /// Create the long-lived agent container from a validated request.
    async fn create(&self, request: &CreateRequest) -> Result<String, EngineError>;

    /// `run --rm` to completion, for one-shot maintenance jobs.
    async fn run_once(&self, request: &OneShotRequest) -> Result<(), EngineError>;

    /// `start -ai`: resume and attach the terminal. Returns the exit code.
    async fn start_attached(&self, name: &str) -> Result<i32, EngineError>;

    /// `exec -it`: interactive session in a running container.
    async fn exec_interactive(&self, name: &str, command: &[String]) -> Result<i32, EngineError>;

    async fn stop(&self, name: &str) -> Result<(), EngineError>;

    async fn remove(&self, id_or_name: &str, force: bool) -> Result<(), EngineError>;

    async fn volume_exists(&self, name: &str) -> Result<bool, EngineError>;

    async fn volume_create(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<(), EngineError>;

    /// Server API version, e.g. `1.45`.
    async fn api_version(&self) -> Result<String, EngineError>;
}
