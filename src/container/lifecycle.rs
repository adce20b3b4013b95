//! Lifecycle state machine for the per-workspace agent container.
//!
//! | state   | Attach             | Shell               | Restart               |
//! |---------|--------------------|---------------------|-----------------------|
//! | Running | exec agent         | exec shell          | stop, remove, create  |
//! | Stopped | gate, `start -ai`  | gate, remove, create| remove, create        |
//! | None    | gate, create       | gate, create        | gate, create          |
//!
//! State and ownership are read fresh from the engine on every call. A
//! Foreign container blocks every mutating path, `--force` included.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::ownership::{OWNERSHIP_LABEL, OWNERSHIP_SENTINEL, Ownership, verify};
use super::provision::{EnvImportPlan, ProvisionPlan, ProvisionVolume};
use super::request::{CreateRequest, Mount, SocketMount};
use crate::engine::{ContainerEngine, ContainerState, EngineError};
use crate::error::{AgentboxError, Result};
use crate::paths::{DEFAULT_DATA_ROOT, WORKSPACE_TARGET};
use crate::sandbox::{
    Detection, IsolationStrength, PreflightPolicy, ProbeConfig, SandboxAvailability, detect_isolation_strength,
    detect_sandbox_availability, preflight,
};

/// Oldest engine API that honours `--label` on create.
const MIN_LABEL_API: (u32, u32) = (1, 18);

const DEFAULT_SHELL: &[&str] = &["bash", "-l"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Attach,
    Shell,
    Restart,
}

impl Mode {
    fn env_value(self) -> &'static str {
        match self {
            Mode::Shell => "shell",
            Mode::Attach | Mode::Restart => "agent",
        }
    }
}

/// What the container is for. Threaded explicitly into every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTarget {
    pub name: String,
    /// Host workspace, bound at `/workspace`.
    pub workspace: PathBuf,
    pub image: String,
    pub data_volume: String,
    pub exclude_patterns: Vec<String>,
    pub env_import: Option<EnvImportPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: Mode,
    pub force: bool,
    /// Explicit confirmation for destroying an Ambiguous container.
    pub confirm_ambiguous: bool,
    pub require_isolation: bool,
    pub socket: SocketMount,
    /// Additional user volumes and binds.
    pub extra_mounts: Vec<Mount>,
    pub env: BTreeMap<String, String>,
    pub agent_command: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Attach,
            force: false,
            confirm_ambiguous: false,
            require_isolation: false,
            socket: SocketMount::Off,
            extra_mounts: Vec::new(),
            env: BTreeMap::new(),
            agent_command: vec!["claude".to_string()],
        }
    }
}

/// A named container as the engine reports it right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub name: String,
    pub state: ContainerState,
    /// `None` when no container exists.
    pub ownership: Option<Ownership>,
    pub label_value: Option<String>,
    pub image_ref: Option<String>,
}

/// Inspect `name` and classify ownership against `expected_image`.
pub async fn read_record(engine: &dyn ContainerEngine, name: &str, expected_image: &str) -> Result<ContainerRecord> {
    let record = match engine.inspect_container(name).await? {
        Some(inspect) => ContainerRecord {
            name: name.to_string(),
            state: inspect.state,
            ownership: Some(verify(&inspect, expected_image)),
            label_value: inspect.labels.get(OWNERSHIP_LABEL).cloned(),
            image_ref: Some(inspect.image),
        },
        None => ContainerRecord {
            name: name.to_string(),
            state: ContainerState::None,
            ownership: None,
            label_value: None,
            image_ref: None,
        },
    };
    Ok(record)
}

pub struct Orchestrator<'a> {
    engine: &'a dyn ContainerEngine,
    provisioner: &'a dyn ProvisionVolume,
    probe: ProbeConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, provisioner: &'a dyn ProvisionVolume, probe: ProbeConfig) -> Self {
        Self {
            engine,
            provisioner,
            probe,
        }
    }

    /// Bring the container to the requested mode. Returns the session's
    /// exit code.
    pub async fn run(&self, target: &LaunchTarget, options: &RunOptions) -> Result<i32> {
        let record = read_record(self.engine, &target.name, &target.image).await?;
        debug!(
            "container '{}': {:?} ({:?}), mode {:?}",
            record.name, record.state, record.ownership, options.mode
        );

        match (record.state, options.mode) {
            (ContainerState::Running, Mode::Attach | Mode::Shell) => {
                self.check_ownership(&record, false, options.confirm_ambiguous)?;
                let availability = detect_sandbox_availability(self.engine).await;
                if availability.outcome == SandboxAvailability::Unavailable {
                    warn!(
                        "sandbox support is unavailable ({}); attaching to the running container anyway",
                        availability.reason
                    );
                }
                let command = session_command(options);
                info!("attaching to running container '{}'", target.name);
                Ok(self.engine.exec_interactive(&target.name, &command).await?)
            }
            (state, Mode::Restart) if state != ContainerState::None => {
                self.check_ownership(&record, true, options.confirm_ambiguous)?;
                self.gate(options).await?;
                self.tear_down(&target.name, state == ContainerState::Running).await?;
                self.create_and_start(target, options).await
            }
            (state, Mode::Shell) if state.is_stopped() => {
                self.check_ownership(&record, true, options.confirm_ambiguous)?;
                self.gate(options).await?;
                info!("recreating '{}' for a fresh shell session", target.name);
                self.tear_down(&target.name, false).await?;
                self.create_and_start(target, options).await
            }
            (state, Mode::Attach) if state.is_stopped() => {
                self.check_ownership(&record, false, options.confirm_ambiguous)?;
                self.gate(options).await?;
                info!("resuming stopped container '{}'", target.name);
                Ok(self.engine.start_attached(&target.name).await?)
            }
            _ => {
                self.gate(options).await?;
                self.create_and_start(target, options).await
            }
        }
    }

    /// Foreign always blocks. Ambiguous blocks destructive paths unless
    /// explicitly confirmed.
    fn check_ownership(&self, record: &ContainerRecord, destructive: bool, confirmed: bool) -> Result<()> {
        match record.ownership {
            Some(Ownership::Foreign) => Err(AgentboxError::OwnershipConflict {
                name: record.name.clone(),
                detail: format!(
                    "was not created by agentbox (label {:?}, image {:?})",
                    record.label_value, record.image_ref
                ),
                remediation: "Rename or remove that container yourself, or run from a different branch/workspace."
                    .to_string(),
            }),
            Some(Ownership::Ambiguous) if destructive && !confirmed => Err(AgentboxError::OwnershipConflict {
                name: record.name.clone(),
                detail: "has no ownership label; it may predate labels or belong to someone else".to_string(),
                remediation: "Pass --confirm-ambiguous to remove and recreate it.".to_string(),
            }),
            Some(Ownership::Ambiguous) => {
                warn!(
                    "container '{}' has no ownership label but matches the expected image; treating as ours",
                    record.name
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn gate(&self, options: &RunOptions) -> Result<()> {
        let availability = detect_sandbox_availability(self.engine).await;
        let isolation: Option<Detection<IsolationStrength>> = if options.require_isolation {
            Some(detect_isolation_strength(self.engine, &self.probe).await)
        } else {
            None
        };
        preflight(
            PreflightPolicy {
                force: options.force,
                require_isolation: options.require_isolation,
            },
            &availability,
            isolation.as_ref(),
        )
    }

    /// Stop (when running) and remove. Already-stopped and already-removed
    /// responses are fine; anything else aborts.
    async fn tear_down(&self, name: &str, running: bool) -> Result<()> {
        if running {
            match self.engine.stop(name).await {
                Ok(()) => info!("stopped '{}'", name),
                Err(EngineError::NotRunning { .. }) | Err(EngineError::NotFound { .. }) => {
                    debug!("'{}' was already stopped", name)
                }
                Err(e) => return Err(e.into()),
            }
        }
        match self.engine.remove(name, false).await {
            Ok(()) => info!("removed '{}'", name),
            Err(EngineError::NotFound { .. }) => debug!("'{}' was already removed", name),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn create_and_start(&self, target: &LaunchTarget, options: &RunOptions) -> Result<i32> {
        self.ensure_volume(&target.data_volume).await?;
        for mount in &options.extra_mounts {
            if let Mount::Volume { name, .. } = mount {
                self.ensure_volume(name).await?;
            }
        }

        let mut labels = BTreeMap::new();
        if self.labels_supported().await {
            labels.insert(OWNERSHIP_LABEL.to_string(), OWNERSHIP_SENTINEL.to_string());
        } else {
            warn!(
                "engine does not support container labels; ownership falls back to image matching (degraded protection)"
            );
        }

        let request = build_request(target, options, labels);
        request.validate()?;
        let id = self.engine.create(&request).await?;
        info!("created container '{}' ({})", target.name, short_id(&id));

        let plan = ProvisionPlan {
            image: target.image.clone(),
            data_volume: target.data_volume.clone(),
            workspace: target.workspace.clone(),
            env: target.env_import.clone(),
        };
        if let Err(e) = self.provisioner.provision(self.engine, &plan).await {
            warn!("provisioning failed; removing '{}'", target.name);
            if let Err(cleanup) = self.engine.remove(&id, true).await {
                warn!("failed to remove '{}': {}", target.name, cleanup);
            }
            return Err(e);
        }

        Ok(self.engine.start_attached(&target.name).await?)
    }

    async fn ensure_volume(&self, name: &str) -> Result<()> {
        if self.engine.volume_exists(name).await? {
            debug!("volume '{}' exists", name);
            return Ok(());
        }
        let labels = BTreeMap::from([(OWNERSHIP_LABEL.to_string(), OWNERSHIP_SENTINEL.to_string())]);
        self.engine.volume_create(name, &labels).await?;
        info!("created volume '{}'", name);
        Ok(())
    }

    async fn labels_supported(&self) -> bool {
        match self.engine.api_version().await {
            Ok(version) => match parse_api_version(&version) {
                Some(v) => v >= MIN_LABEL_API,
                None => {
                    debug!("unparseable engine API version '{}'", version);
                    false
                }
            },
            Err(e) => {
                debug!("engine API version probe failed: {}", e);
                false
            }
        }
    }
}

fn session_command(options: &RunOptions) -> Vec<String> {
    match options.mode {
        Mode::Shell => DEFAULT_SHELL.iter().map(|s| s.to_string()).collect(),
        Mode::Attach | Mode::Restart => options.agent_command.clone(),
    }
}

fn parse_api_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.trim().split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn build_request(target: &LaunchTarget, options: &RunOptions, labels: BTreeMap<String, String>) -> CreateRequest {
    let mut mounts = vec![
        Mount::Volume {
            name: target.data_volume.clone(),
            target: DEFAULT_DATA_ROOT.to_string(),
            read_only: false,
        },
        Mount::Bind {
            source: target.workspace.clone(),
            target: WORKSPACE_TARGET.to_string(),
            read_only: false,
        },
    ];
    for rel in expand_excludes(&target.workspace, &target.exclude_patterns) {
        mounts.push(Mount::Anonymous {
            target: format!("{}/{}", WORKSPACE_TARGET, rel.display()),
        });
    }
    mounts.extend(options.extra_mounts.iter().cloned());

    let mut env = options.env.clone();
    env.insert("AGENTBOX_MODE".to_string(), options.mode.env_value().to_string());
    env.insert("AGENTBOX_DATA_ROOT".to_string(), DEFAULT_DATA_ROOT.to_string());

    CreateRequest {
        name: target.name.clone(),
        image: target.image.clone(),
        labels,
        mounts,
        env,
        workdir: WORKSPACE_TARGET.to_string(),
        command: session_command(options),
        socket: options.socket,
    }
}

/// Workspace-relative paths matching the exclude globs.
pub fn expand_excludes(workspace: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let base = glob::Pattern::escape(&workspace.to_string_lossy());
    let mut out = Vec::new();

    for pattern in patterns {
        let rel = Path::new(pattern);
        if rel.is_absolute() || rel.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            warn!("ignoring exclude pattern '{}': must be workspace-relative", pattern);
            continue;
        }
        let matches = match glob::glob(&format!("{}/{}", base, pattern)) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("ignoring exclude pattern '{}': {}", pattern, e);
                continue;
            }
        };
        for path in matches.filter_map(|p| p.ok()) {
            if let Ok(rel) = path.strip_prefix(workspace)
                && !rel.as_os_str().is_empty()
                && !out.iter().any(|p: &PathBuf| p == rel)
            {
                out.push(rel.to_path_buf());
            }
        }
    }

    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::provision::InContainerProvisioner;
    use crate::engine::EngineOutput;
    use crate::engine::fake::FakeEngine;
    use std::fs;

    const IMAGE: &str = "agentbox/sandbox:latest";

    fn target() -> LaunchTarget {
        LaunchTarget {
            name: "proj-main".to_string(),
            workspace: PathBuf::from("/home/me/proj"),
            image: IMAGE.to_string(),
            data_volume: "agentbox-data".to_string(),
            exclude_patterns: Vec::new(),
            env_import: None,
        }
    }

    fn opts(mode: Mode) -> RunOptions {
        RunOptions {
            mode,
            ..Default::default()
        }
    }

    fn managed() -> [(&'static str, &'static str); 1] {
        [(OWNERSHIP_LABEL, OWNERSHIP_SENTINEL)]
    }

    fn unavailable(engine: &FakeEngine) {
        *engine.sandbox_ls.lock().unwrap() = Some(Ok(EngineOutput {
            status: Some(1),
            stdout: String::new(),
            stderr: "docker: 'sandbox' is not a docker command.".to_string(),
        }));
    }

    async fn run(engine: &FakeEngine, options: &RunOptions) -> Result<i32> {
        let provisioner = InContainerProvisioner;
        Orchestrator::new(engine, &provisioner, ProbeConfig::default())
            .run(&target(), options)
            .await
    }

    #[tokio::test]
    async fn none_creates_provisions_and_starts() {
        let engine = FakeEngine::new();
        assert_eq!(run(&engine, &opts(Mode::Attach)).await.unwrap(), 0);

        let calls = engine.calls();
        let order: Vec<&str> = calls
            .iter()
            .map(|c| c.split_whitespace().next().unwrap())
            .collect();
        assert_eq!(order, vec!["volume_create", "create", "run_once", "start_attached"]);

        let created = engine.created.lock().unwrap();
        let req = &created[0];
        assert_eq!(req.labels.get(OWNERSHIP_LABEL).map(String::as_str), Some(OWNERSHIP_SENTINEL));
        assert_eq!(req.command, vec!["claude"]);
        assert_eq!(req.env["AGENTBOX_MODE"], "agent");
        assert!(req.mounts.iter().any(|m| m.target() == WORKSPACE_TARGET));
    }

    #[tokio::test]
    async fn existing_volume_is_reused() {
        let engine = FakeEngine::new();
        engine.volumes.lock().unwrap().push("agentbox-data".to_string());
        run(&engine, &opts(Mode::Shell)).await.unwrap();
        assert!(!engine.calls().iter().any(|c| c.starts_with("volume_create")));
        assert_eq!(engine.created.lock().unwrap()[0].command, vec!["bash", "-l"]);
    }

    #[tokio::test]
    async fn foreign_blocks_restart_even_with_force() {
        let engine = FakeEngine::new().with_container("proj-main", ContainerState::Running, &[], "someone/else:1");
        let options = RunOptions {
            mode: Mode::Restart,
            force: true,
            confirm_ambiguous: true,
            ..Default::default()
        };
        let err = run(&engine, &options).await.unwrap_err();
        assert!(matches!(err, AgentboxError::OwnershipConflict { .. }), "{err:?}");
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn foreign_blocks_attach_to_running() {
        let engine = FakeEngine::new().with_container(
            "proj-main",
            ContainerState::Running,
            &[(OWNERSHIP_LABEL, "other-tool")],
            IMAGE,
        );
        assert!(run(&engine, &opts(Mode::Attach)).await.is_err());
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn ambiguous_restart_requires_confirmation() {
        let engine = FakeEngine::new().with_container("proj-main", ContainerState::Running, &[], IMAGE);
        assert!(run(&engine, &opts(Mode::Restart)).await.is_err());
        assert!(engine.calls().is_empty());

        let confirmed = RunOptions {
            mode: Mode::Restart,
            confirm_ambiguous: true,
            ..Default::default()
        };
        run(&engine, &confirmed).await.unwrap();
        let calls = engine.calls();
        assert_eq!(calls[0], "stop proj-main");
        assert_eq!(calls[1], "remove proj-main force=false");
        assert!(calls.contains(&"create proj-main".to_string()));
    }

    #[tokio::test]
    async fn ambiguous_attach_only_warns() {
        let engine = FakeEngine::new().with_container("proj-main", ContainerState::Running, &[], IMAGE);
        run(&engine, &opts(Mode::Attach)).await.unwrap();
        assert_eq!(engine.calls(), vec!["exec_interactive proj-main claude"]);
    }

    #[tokio::test]
    async fn running_attach_ignores_unavailable_sandbox() {
        let engine = FakeEngine::new().with_container("proj-main", ContainerState::Running, &managed(), IMAGE);
        unavailable(&engine);
        run(&engine, &opts(Mode::Shell)).await.unwrap();
        assert_eq!(engine.calls(), vec!["exec_interactive proj-main bash -l"]);
    }

    #[tokio::test]
    async fn stopped_attach_resumes_in_place() {
        let engine = FakeEngine::new().with_container("proj-main", ContainerState::Exited, &managed(), IMAGE);
        run(&engine, &opts(Mode::Attach)).await.unwrap();
        assert_eq!(engine.calls(), vec!["start_attached proj-main"]);
    }

    #[tokio::test]
    async fn stopped_shell_recreates() {
        let engine = FakeEngine::new().with_container("proj-main", ContainerState::Created, &managed(), IMAGE);
        run(&engine, &opts(Mode::Shell)).await.unwrap();
        let calls = engine.calls();
        assert_eq!(calls[0], "remove proj-main force=false");
        assert!(!calls.iter().any(|c| c.starts_with("stop")));
        assert!(calls.contains(&"create proj-main".to_string()));
    }

    #[tokio::test]
    async fn stopped_paths_are_gated() {
        let engine = FakeEngine::new().with_container("proj-main", ContainerState::Exited, &managed(), IMAGE);
        unavailable(&engine);
        let err = run(&engine, &opts(Mode::Attach)).await.unwrap_err();
        assert!(matches!(err, AgentboxError::CapabilityUnavailable { .. }));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn unavailable_blocks_creation_unless_forced() {
        let engine = FakeEngine::new();
        unavailable(&engine);
        assert!(run(&engine, &opts(Mode::Attach)).await.is_err());
        assert!(engine.calls().is_empty());

        unavailable(&engine);
        let forced = RunOptions {
            force: true,
            ..Default::default()
        };
        run(&engine, &forced).await.unwrap();
        assert!(engine.calls().contains(&"create proj-main".to_string()));
    }

    #[tokio::test]
    async fn required_isolation_blocks_even_with_force() {
        // Default fake uid_map is the identity map: not remapped.
        let engine = FakeEngine::new();
        *engine.probe_runtime.lock().unwrap() = Some("runc".to_string());
        let options = RunOptions {
            force: true,
            require_isolation: true,
            ..Default::default()
        };
        let err = run(&engine, &options).await.unwrap_err();
        assert!(matches!(err, AgentboxError::CapabilityUnavailable { .. }));
        assert!(!engine.calls().iter().any(|c| c.starts_with("create")));
        // Probe containers were still cleaned up.
        assert!(engine.calls().contains(&"remove probe-id-1 force=true".to_string()));
    }

    #[tokio::test]
    async fn inspect_errors_are_not_treated_as_absent() {
        let engine = FakeEngine::new();
        *engine.inspect_error.lock().unwrap() = Some(EngineError::Failed {
            op: "inspect".to_string(),
            code: 1,
            stderr: "error during connect".to_string(),
        });
        assert!(matches!(
            run(&engine, &opts(Mode::Attach)).await,
            Err(AgentboxError::Engine(EngineError::Failed { .. }))
        ));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn restart_tolerates_already_stopped_but_not_other_errors() {
        let engine = FakeEngine::new().with_container("proj-main", ContainerState::Running, &managed(), IMAGE);
        *engine.stop_error.lock().unwrap() = Some(EngineError::NotRunning { op: "stop".to_string() });
        run(&engine, &opts(Mode::Restart)).await.unwrap();
        assert!(engine.calls().contains(&"create proj-main".to_string()));

        let engine = FakeEngine::new().with_container("proj-main", ContainerState::Running, &managed(), IMAGE);
        *engine.remove_error.lock().unwrap() = Some(EngineError::Failed {
            op: "rm".to_string(),
            code: 1,
            stderr: "device or resource busy".to_string(),
        });
        assert!(run(&engine, &opts(Mode::Restart)).await.is_err());
        assert!(!engine.calls().iter().any(|c| c.starts_with("create")));
    }

    #[tokio::test]
    async fn missing_label_support_degrades_to_unlabelled() {
        let engine = FakeEngine::new();
        *engine.api_version.lock().unwrap() = Some("1.12".to_string());
        run(&engine, &opts(Mode::Attach)).await.unwrap();
        assert!(engine.created.lock().unwrap()[0].labels.is_empty());

        let engine = FakeEngine::new();
        *engine.api_version.lock().unwrap() = None;
        run(&engine, &opts(Mode::Attach)).await.unwrap();
        assert!(engine.created.lock().unwrap()[0].labels.is_empty());
    }

    #[tokio::test]
    async fn failed_provisioning_removes_the_new_container() {
        let engine = FakeEngine::new();
        *engine.run_once_error.lock().unwrap() = Some(EngineError::Failed {
            op: "run --rm".to_string(),
            code: 1,
            stderr: "boom".to_string(),
        });
        assert!(run(&engine, &opts(Mode::Attach)).await.is_err());
        let calls = engine.calls();
        assert!(calls.contains(&"remove id-proj-main force=true".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("start_attached")));
    }

    #[tokio::test]
    async fn unacknowledged_socket_is_rejected_before_create() {
        let engine = FakeEngine::new();
        let options = RunOptions {
            socket: SocketMount::Requested { acknowledged: false },
            ..Default::default()
        };
        assert!(matches!(
            run(&engine, &options).await,
            Err(AgentboxError::Validation { .. })
        ));
        assert!(!engine.calls().iter().any(|c| c.starts_with("create")));
    }

    #[test]
    fn excludes_expand_against_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = tmp.path();
        fs::create_dir_all(ws.join("node_modules")).unwrap();
        fs::create_dir_all(ws.join("pkg/a/node_modules")).unwrap();
        fs::create_dir_all(ws.join("target")).unwrap();

        let patterns = vec![
            "node_modules".to_string(),
            "**/node_modules".to_string(),
            "missing".to_string(),
            "../escape".to_string(),
            "/abs".to_string(),
        ];
        let rels = expand_excludes(ws, &patterns);
        assert_eq!(
            rels,
            vec![PathBuf::from("node_modules"), PathBuf::from("pkg/a/node_modules")]
        );
    }

    #[test]
    fn api_version_parsing() {
        assert_eq!(parse_api_version("1.45\n"), Some((1, 45)));
        assert_eq!(parse_api_version("2.0"), Some((2, 0)));
        assert_eq!(parse_api_version("garbage"), None);
        assert!(parse_api_version("1.9").unwrap() < MIN_LABEL_API);
    }
}
