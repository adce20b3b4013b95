//! Docker-compatible CLI implementation of [`ContainerEngine`].
//!
//! Every management call is a child process bounded by a timeout; the child
//! is killed when the timeout fires. Interactive sessions inherit the terminal
//! and are not time bounded.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{ContainerEngine, ContainerInspect, ContainerState, EngineError, EngineOutput};
use crate::container::request::{CreateRequest, OneShotRequest};

/// Default bound for management calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Engine binary from `AGENTBOX_ENGINE`, else `docker`.
    pub fn from_env() -> Self {
        let binary = std::env::var("AGENTBOX_ENGINE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "docker".to_string());
        Self::new(binary, DEFAULT_TIMEOUT)
    }

    fn binary_name(&self) -> String {
        self.binary.display().to_string()
    }

    /// Run to completion under the timeout, returning output regardless of exit code.
    async fn output(&self, op: &str, args: &[String]) -> Result<EngineOutput, EngineError> {
        debug!("engine: {} {}", self.binary_name(), args.join(" "));

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => {
                return Err(EngineError::Timeout {
                    op: op.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::Missing {
                    binary: self.binary_name(),
                });
            }
            Ok(Err(e)) => return Err(EngineError::Spawn(e)),
            Ok(Ok(output)) => output,
        };

        Ok(EngineOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Like [`output`](Self::output) but a non-zero exit becomes an error.
    async fn checked(&self, op: &str, args: &[String]) -> Result<EngineOutput, EngineError> {
        let out = self.output(op, args).await?;
        if out.success() {
            Ok(out)
        } else {
            Err(classify_failure(op, &out))
        }
    }

    async fn interactive(&self, args: &[String]) -> Result<i32, EngineError> {
        debug!("engine (interactive): {} {}", self.binary_name(), args.join(" "));
        let status = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::Missing {
                        binary: self.binary_name(),
                    }
                } else {
                    EngineError::Spawn(e)
                }
            })?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Turn a failed call into the sharpest error we can recognize.
pub(crate) fn classify_failure(op: &str, out: &EngineOutput) -> EngineError {
    let lower = out.stderr.to_lowercase();
    if lower.contains("no such container")
        || lower.contains("no such object")
        || lower.contains("no such volume")
        || lower.contains("get volume: not found")
    {
        return EngineError::NotFound {
            op: op.to_string(),
            what: "container or volume".to_string(),
        };
    }
    if lower.contains("is not running") {
        return EngineError::NotRunning { op: op.to_string() };
    }
    EngineError::Failed {
        op: op.to_string(),
        code: out.status.unwrap_or(-1),
        stderr: out.stderr.trim().to_string(),
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn first_line(op: &str, stdout: &str) -> Result<String, EngineError> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| EngineError::Parse {
            op: op.to_string(),
            message: "empty output".to_string(),
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInspect {
    id: String,
    #[serde(default)]
    state: RawState,
    #[serde(default)]
    config: RawConfig,
    #[serde(default)]
    host_config: RawHostConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawState {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawConfig {
    #[serde(default)]
    image: String,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawHostConfig {
    #[serde(default)]
    runtime: Option<String>,
}

/// Parse `container inspect` JSON (an array with one object).
pub(crate) fn parse_inspect(op: &str, json: &str) -> Result<ContainerInspect, EngineError> {
    let mut items: Vec<RawInspect> = serde_json::from_str(json).map_err(|e| EngineError::Parse {
        op: op.to_string(),
        message: e.to_string(),
    })?;
    if items.is_empty() {
        return Err(EngineError::Parse {
            op: op.to_string(),
            message: "empty inspect result".to_string(),
        });
    }
    let raw = items.swap_remove(0);
    Ok(ContainerInspect {
        id: raw.id,
        state: ContainerState::from_status(&raw.state.status),
        labels: raw.config.labels.unwrap_or_default(),
        image: raw.config.image,
        runtime: raw.host_config.runtime.filter(|r| !r.is_empty()),
    })
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn list_sandboxes(&self) -> Result<EngineOutput, EngineError> {
        self.output("sandbox ls", &args(["sandbox", "ls"])).await
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInspect>, EngineError> {
        let op = "container inspect";
        match self.checked(op, &args(["container", "inspect", name])).await {
            Ok(out) => parse_inspect(op, &out.stdout).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn run_ephemeral(&self, name: &str, image: &str, command: &[String]) -> Result<String, EngineError> {
        let mut argv = args(["run", "-d", "--rm", "--name", name, image]);
        argv.extend(command.iter().cloned());
        let out = self.checked("run -d", &argv).await?;
        first_line("run -d", &out.stdout)
    }

    async fn exec_capture(&self, id: &str, command: &[String]) -> Result<String, EngineError> {
        let mut argv = args(["exec", id]);
        argv.extend(command.iter().cloned());
        let out = self.checked("exec", &argv).await?;
        Ok(out.stdout)
    }

    async fn create(&self, request: &CreateRequest) -> Result<String, EngineError> {
        let mut argv = args(["create"]);
        argv.extend(request.to_args());
        let out = self.checked("create", &argv).await?;
        first_line("create", &out.stdout)
    }

    async fn run_once(&self, request: &OneShotRequest) -> Result<(), EngineError> {
        let mut argv = args(["run", "--rm"]);
        argv.extend(request.to_args());
        self.checked("run --rm", &argv).await.map(|_| ())
    }

    async fn start_attached(&self, name: &str) -> Result<i32, EngineError> {
        self.interactive(&args(["start", "-ai", name])).await
    }

    async fn exec_interactive(&self, name: &str, command: &[String]) -> Result<i32, EngineError> {
        let mut argv = args(["exec", "-it", name]);
        argv.extend(command.iter().cloned());
        self.interactive(&argv).await
    }

    async fn stop(&self, name: &str) -> Result<(), EngineError> {
        self.checked("stop", &args(["stop", name])).await.map(|_| ())
    }

    async fn remove(&self, id_or_name: &str, force: bool) -> Result<(), EngineError> {
        let argv = if force {
            args(["rm", "-f", id_or_name])
        } else {
            args(["rm", id_or_name])
        };
        self.checked("rm", &argv).await.map(|_| ())
    }

    async fn volume_exists(&self, name: &str) -> Result<bool, EngineError> {
        match self.checked("volume inspect", &args(["volume", "inspect", name])).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn volume_create(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<(), EngineError> {
        let mut argv = args(["volume", "create"]);
        for (key, value) in labels {
            argv.push("--label".to_string());
            argv.push(format!("{}={}", key, value));
        }
        argv.push(name.to_string());
        self.checked("volume create", &argv).await.map(|_| ())
    }

    async fn api_version(&self) -> Result<String, EngineError> {
        let out = self
            .checked("version", &args(["version", "--format", "{{.Server.APIVersion}}"]))
            .await?;
        first_line("version", &out.stdout)
    }
}
