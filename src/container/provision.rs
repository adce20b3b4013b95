//! Provisioning seam used by the orchestrator after creating a container.
//!
//! The data volume is not reachable from the host filesystem, so the layout
//! and env import steps run inside one-shot containers that mount it. Each
//! job invokes this same binary inside the image (`agentbox layout ensure`,
//! `agentbox env import`).

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

use super::request::{Mount, OneShotRequest};
use crate::engine::ContainerEngine;
use crate::error::Result;
use crate::paths::{DEFAULT_DATA_ROOT, WORKSPACE_TARGET};

/// Uid/gid of the service user baked into the agent image.
pub const SERVICE_UID: u32 = 1000;
pub const SERVICE_GID: u32 = 1000;

/// Allow-listed env import, run from the host side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvImportPlan {
    pub allowlist: Vec<String>,
    pub from_host: bool,
    /// Workspace-relative env file.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionPlan {
    pub image: String,
    pub data_volume: String,
    pub workspace: PathBuf,
    pub env: Option<EnvImportPlan>,
}

#[async_trait]
pub trait ProvisionVolume: Send + Sync {
    async fn provision(&self, engine: &dyn ContainerEngine, plan: &ProvisionPlan) -> Result<()>;
}

/// Runs each step as `run --rm` against the agent image.
#[derive(Debug, Clone, Default)]
pub struct InContainerProvisioner;

impl InContainerProvisioner {
    pub fn layout_job(plan: &ProvisionPlan) -> OneShotRequest {
        OneShotRequest {
            image: plan.image.clone(),
            mounts: vec![data_mount(plan)],
            env_passthrough: Vec::new(),
            user: Some("0:0".to_string()),
            command: owned([
                "agentbox",
                "layout",
                "ensure",
                "--data-root",
                DEFAULT_DATA_ROOT,
                "--uid",
                &SERVICE_UID.to_string(),
                "--gid",
                &SERVICE_GID.to_string(),
            ]),
        }
    }

    /// `None` when there is nothing to import.
    pub fn env_job(plan: &ProvisionPlan) -> Option<OneShotRequest> {
        let env = plan.env.as_ref().filter(|e| !e.allowlist.is_empty())?;

        let mut command = owned([
            "agentbox",
            "env",
            "import",
            "--data-root",
            DEFAULT_DATA_ROOT,
            "--workspace",
            WORKSPACE_TARGET,
            "--uid",
            &SERVICE_UID.to_string(),
            "--gid",
            &SERVICE_GID.to_string(),
            "--allow",
            &env.allowlist.join(","),
        ]);
        if let Some(file) = &env.file {
            command.push("--file".to_string());
            command.push(file.to_string_lossy().into_owned());
        }
        if !env.from_host {
            command.push("--no-host".to_string());
        }

        Some(OneShotRequest {
            image: plan.image.clone(),
            mounts: vec![
                data_mount(plan),
                Mount::Bind {
                    source: plan.workspace.clone(),
                    target: WORKSPACE_TARGET.to_string(),
                    read_only: true,
                },
            ],
            env_passthrough: if env.from_host { env.allowlist.clone() } else { Vec::new() },
            user: Some("0:0".to_string()),
            command,
        })
    }

    pub async fn import_env(&self, engine: &dyn ContainerEngine, plan: &ProvisionPlan) -> Result<()> {
        let Some(job) = Self::env_job(plan) else {
            debug!("env allowlist empty; skipping import");
            return Ok(());
        };
        job.validate()?;
        engine.run_once(&job).await?;
        info!("imported env into volume '{}'", plan.data_volume);
        Ok(())
    }
}

#[async_trait]
impl ProvisionVolume for InContainerProvisioner {
    async fn provision(&self, engine: &dyn ContainerEngine, plan: &ProvisionPlan) -> Result<()> {
        let layout = Self::layout_job(plan);
        layout.validate()?;
        engine.run_once(&layout).await?;
        info!("provisioned layout on volume '{}'", plan.data_volume);

        self.import_env(engine, plan).await
    }
}

fn data_mount(plan: &ProvisionPlan) -> Mount {
    Mount::Volume {
        name: plan.data_volume.clone(),
        target: DEFAULT_DATA_ROOT.to_string(),
        read_only: false,
    }
}

fn owned<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
