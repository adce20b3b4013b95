//! Typed container creation request.
//!
//! The orchestrator assembles a [`CreateRequest`], calls
//! [`validate`](CreateRequest::validate), and the engine serializes it exactly
//! once with [`to_args`](CreateRequest::to_args). No command line is ever
//! assembled by string interpolation.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::config::validate_volume_name;
use crate::credentials::is_valid_env_key;
use crate::error::{AgentboxError, Result};

/// Host path of the engine control socket.
pub const ENGINE_SOCKET: &str = "/var/run/docker.sock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mount {
    /// Named engine-managed volume.
    Volume {
        name: String,
        target: String,
        read_only: bool,
    },
    /// Host directory bind.
    Bind {
        source: PathBuf,
        target: String,
        read_only: bool,
    },
    /// Anonymous volume, used to mask excluded workspace paths.
    Anonymous { target: String },
}

impl Mount {
    pub fn target(&self) -> &str {
        match self {
            Mount::Volume { target, .. } | Mount::Bind { target, .. } | Mount::Anonymous { target } => target,
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let spec = match self {
            Mount::Volume {
                name,
                target,
                read_only,
            } => with_readonly(format!("type=volume,source={},target={}", name, target), *read_only),
            Mount::Bind {
                source,
                target,
                read_only,
            } => with_readonly(
                format!("type=bind,source={},target={}", source.display(), target),
                *read_only,
            ),
            Mount::Anonymous { target } => format!("type=volume,target={}", target),
        };
        vec!["--mount".to_string(), spec]
    }

    fn validate(&self) -> Result<()> {
        validate_target(self.target())?;
        match self {
            Mount::Volume { name, .. } => validate_volume_name(name),
            Mount::Bind { source, .. } => {
                let text = source.to_string_lossy();
                if !source.is_absolute() || text.contains(',') || text.contains('\n') {
                    return Err(AgentboxError::validation(
                        "bind source",
                        text.into_owned(),
                        "must be an absolute path without ',' or newlines",
                    ));
                }
                Ok(())
            }
            Mount::Anonymous { .. } => Ok(()),
        }
    }
}

fn with_readonly(spec: String, read_only: bool) -> String {
    if read_only { format!("{},readonly", spec) } else { spec }
}

fn validate_target(target: &str) -> Result<()> {
    let path = Path::new(target);
    let traverses = path.components().any(|c| matches!(c, Component::ParentDir));
    if !path.is_absolute() || traverses || target.contains(',') || target.contains('\n') {
        return Err(AgentboxError::validation(
            "mount target",
            target,
            "must be absolute, without '..', ',' or newlines",
        ));
    }
    Ok(())
}

/// Engine control socket exposure. Requires two separate opt-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketMount {
    #[default]
    Off,
    Requested { acknowledged: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub name: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    pub mounts: Vec<Mount>,
    pub env: BTreeMap<String, String>,
    pub workdir: String,
    pub command: Vec<String>,
    pub socket: SocketMount,
}

impl CreateRequest {
    pub fn validate(&self) -> Result<()> {
        crate::container::identity::validate_container_name(&self.name)?;

        if self.image.trim().is_empty() || self.image.chars().any(char::is_whitespace) {
            return Err(AgentboxError::validation("image", &self.image, "must be a non-empty reference"));
        }

        for key in self.labels.keys() {
            if key.is_empty() || key.contains('=') {
                return Err(AgentboxError::validation("label", key, "keys must be non-empty without '='"));
            }
        }

        for mount in &self.mounts {
            mount.validate()?;
        }

        for (key, value) in &self.env {
            if !is_valid_env_key(key) {
                return Err(AgentboxError::validation("env key", key, "must match [A-Za-z_][A-Za-z0-9_]*"));
            }
            if value.contains('\n') {
                return Err(AgentboxError::validation("env value", key, "must be a single line"));
            }
        }

        validate_target(&self.workdir)?;

        if self.command.is_empty() {
            return Err(AgentboxError::validation("command", &self.name, "container command is empty"));
        }

        if self.socket == (SocketMount::Requested { acknowledged: false }) {
            return Err(AgentboxError::validation(
                "socket mount",
                ENGINE_SOCKET,
                "mounting the engine socket grants host-level control; pass --accept-socket-risk to confirm",
            ));
        }

        Ok(())
    }

    /// Arguments following the engine's `create` verb.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--name".to_string(),
            self.name.clone(),
            "--hostname".to_string(),
            self.name.clone(),
            "-it".to_string(),
        ];

        for (key, value) in &self.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }

        for mount in &self.mounts {
            args.extend(mount.to_args());
        }

        if self.socket == (SocketMount::Requested { acknowledged: true }) {
            args.extend(
                Mount::Bind {
                    source: PathBuf::from(ENGINE_SOCKET),
                    target: ENGINE_SOCKET.to_string(),
                    read_only: false,
                }
                .to_args(),
            );
        }

        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push("-w".to_string());
        args.push(self.workdir.clone());
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// A `run --rm` maintenance job, e.g. provisioning the data volume.
///
/// `env_passthrough` carries names only: the engine CLI copies each value
/// from its own environment, so secrets never appear on a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneShotRequest {
    pub image: String,
    pub mounts: Vec<Mount>,
    pub env_passthrough: Vec<String>,
    pub user: Option<String>,
    pub command: Vec<String>,
}

impl OneShotRequest {
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() || self.image.chars().any(char::is_whitespace) {
            return Err(AgentboxError::validation("image", &self.image, "must be a non-empty reference"));
        }
        for mount in &self.mounts {
            mount.validate()?;
        }
        for key in &self.env_passthrough {
            if !is_valid_env_key(key) {
                return Err(AgentboxError::validation("env key", key, "must match [A-Za-z_][A-Za-z0-9_]*"));
            }
        }
        if self.command.is_empty() {
            return Err(AgentboxError::validation("command", &self.image, "one-shot command is empty"));
        }
        Ok(())
    }

    /// Arguments following the engine's `run --rm` verb.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for mount in &self.mounts {
            args.extend(mount.to_args());
        }
        for key in &self.env_passthrough {
            args.push("-e".to_string());
            args.push(key.clone());
        }
        if let Some(user) = &self.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}
