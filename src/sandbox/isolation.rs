//! Isolation strength: user-namespace remapping and hardened runtime probes.
//!
//! Each probe starts its own ephemeral container, captures the id the engine
//! returns, and releases that id on every exit path. Containers are started
//! with `--rm` and a bounded `sleep`, so even a probe whose id was never
//! captured (e.g. a timeout during `run`) disappears on its own.

use tracing::{debug, warn};

use super::{Detection, IsolationStrength, ReasonCode};
use crate::engine::{ContainerEngine, EngineError};

/// Inner id 0 must map at or above this outer id to count as remapped.
pub const MIN_REMAPPED_OUTER_ID: u64 = 100_000;

/// The identity mapping of an unremapped namespace.
const FULL_RANGE: u64 = 4_294_967_295;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Pinned minimal image used for both probes.
    pub image: String,
    /// Runtime name that counts as hardened.
    pub hardened_runtime: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            image: "busybox:1.36.1".to_string(),
            hardened_runtime: "sysbox-runc".to_string(),
        }
    }
}

/// Run both probes and combine them. Never blocks on its own.
pub async fn detect_isolation_strength(engine: &dyn ContainerEngine, probe: &ProbeConfig) -> Detection<IsolationStrength> {
    let userns = probe_userns(engine, probe).await;
    let runtime = probe_runtime(engine, probe).await;
    let combined = combine(userns, runtime);
    debug!("isolation strength: {:?} ({})", combined.outcome, combined.reason);
    combined
}

/// An ephemeral container owned by one probe.
struct ProbeContainer<'a> {
    engine: &'a dyn ContainerEngine,
    id: String,
}

impl<'a> ProbeContainer<'a> {
    async fn start(engine: &'a dyn ContainerEngine, purpose: &str, image: &str) -> Result<Self, EngineError> {
        let name = format!("agentbox-probe-{}-{}", purpose, uuid::Uuid::new_v4().simple());
        let command = vec!["sleep".to_string(), "30".to_string()];
        let id = engine.run_ephemeral(&name, image, &command).await?;
        Ok(Self { engine, id })
    }

    /// Remove by captured id. Consumes the probe so it cannot be reused.
    async fn release(self) {
        if let Err(e) = self.engine.remove(&self.id, true).await
            && !e.is_not_found()
        {
            warn!("failed to remove probe container {}: {}", self.id, e);
        }
    }
}

async fn probe_userns(engine: &dyn ContainerEngine, probe: &ProbeConfig) -> Detection<IsolationStrength> {
    let container = match ProbeContainer::start(engine, "userns", &probe.image).await {
        Ok(c) => c,
        Err(e) => return probe_failed("userns probe could not start", &e),
    };
    let command = vec!["cat".to_string(), "/proc/self/uid_map".to_string()];
    let result = engine.exec_capture(&container.id, &command).await;
    container.release().await;

    match result {
        Ok(uid_map) => classify_uid_map(&uid_map),
        Err(e) => probe_failed("userns probe could not read uid_map", &e),
    }
}

async fn probe_runtime(engine: &dyn ContainerEngine, probe: &ProbeConfig) -> Detection<IsolationStrength> {
    let container = match ProbeContainer::start(engine, "runtime", &probe.image).await {
        Ok(c) => c,
        Err(e) => return probe_failed("runtime probe could not start", &e),
    };
    let result = engine.inspect_container(&container.id).await;
    container.release().await;

    match result {
        Ok(Some(inspect)) => match inspect.runtime {
            Some(runtime) => classify_runtime(&runtime, &probe.hardened_runtime),
            None => Detection::new(
                IsolationStrength::Unknown,
                ReasonCode::ProbeFailed,
                "engine did not report a runtime",
                "",
            ),
        },
        Ok(None) => Detection::new(
            IsolationStrength::Unknown,
            ReasonCode::ProbeFailed,
            "probe container vanished before inspection",
            "",
        ),
        Err(e) => probe_failed("runtime probe could not inspect", &e),
    }
}

fn probe_failed(context: &str, e: &EngineError) -> Detection<IsolationStrength> {
    warn!("{}: {}", context, e);
    Detection::new(
        IsolationStrength::Unknown,
        ReasonCode::ProbeFailed,
        format!("{}: {}", context, e),
        "",
    )
}

/// Classify the first row of `/proc/self/uid_map` (`inner outer count`).
pub fn classify_uid_map(uid_map: &str) -> Detection<IsolationStrength> {
    let row: Vec<u64> = match uid_map.lines().find(|l| !l.trim().is_empty()) {
        Some(line) => match line.split_whitespace().map(str::parse).collect::<Result<Vec<u64>, _>>() {
            Ok(row) if row.len() == 3 => row,
            _ => return unparseable(uid_map),
        },
        None => return unparseable(uid_map),
    };
    let (inner, outer, count) = (row[0], row[1], row[2]);

    if inner == 0 && outer >= MIN_REMAPPED_OUTER_ID {
        return Detection::new(
            IsolationStrength::Confirmed,
            ReasonCode::UsernsRemapped,
            format!("uid 0 maps to host uid {}", outer),
            "",
        );
    }
    if inner == 0 && outer == 0 && count == FULL_RANGE {
        return Detection::new(
            IsolationStrength::NotDetected,
            ReasonCode::UsernsNotRemapped,
            "container root is host root (identity uid_map)",
            "Enable user-namespace remapping (userns-remap in daemon.json) or use a hardened runtime.",
        );
    }
    Detection::new(
        IsolationStrength::NotDetected,
        ReasonCode::UsernsLowMapping,
        format!("uid {} maps to host uid {} (below {})", inner, outer, MIN_REMAPPED_OUTER_ID),
        "Configure subordinate id ranges starting at or above 100000 for the remapped user.",
    )
}

fn unparseable(uid_map: &str) -> Detection<IsolationStrength> {
    Detection::new(
        IsolationStrength::Unknown,
        ReasonCode::ProbeFailed,
        format!("unparseable uid_map ({} bytes)", uid_map.len()),
        "",
    )
}

pub fn classify_runtime(runtime: &str, hardened: &str) -> Detection<IsolationStrength> {
    if runtime == hardened {
        Detection::new(IsolationStrength::Confirmed, ReasonCode::RuntimeHardened, runtime, "")
    } else {
        Detection::new(
            IsolationStrength::NotDetected,
            ReasonCode::RuntimeNotHardened,
            format!("default runtime is '{}', expected '{}'", runtime, hardened),
            format!("Install {} and set it as the engine's default runtime.", hardened),
        )
    }
}

/// Both Confirmed => Confirmed; any NotDetected => NotDetected (most
/// informative reason); otherwise Unknown.
pub fn combine(
    userns: Detection<IsolationStrength>,
    runtime: Detection<IsolationStrength>,
) -> Detection<IsolationStrength> {
    use IsolationStrength::*;

    match (userns.outcome, runtime.outcome) {
        (Confirmed, Confirmed) => Detection::new(
            Confirmed,
            ReasonCode::IsolationConfirmed,
            format!("{}; {}", userns.detail, runtime.detail),
            "",
        ),
        (NotDetected, _) => userns,
        (_, NotDetected) => runtime,
        (Unknown, _) => userns,
        (_, Unknown) => runtime,
    }
}
