//! Capability detection and the preflight gate.
//!
//! Two independent tri-states are detected through the container engine:
//!
//! - sandbox availability (`sandbox ls`): Available / Unavailable / Unknown
//! - isolation strength (userns remap + hardened runtime probes):
//!   Confirmed / NotDetected / Unknown
//!
//! Confirmed negatives fail closed; genuine uncertainty fails open with a
//! warning. Isolation strength never blocks on its own; the
//! [`policy`] gate decides what blocks.

pub mod detect;
pub mod isolation;
pub mod policy;

use std::fmt;

use crate::engine::ContainerEngine;

pub use detect::{classify_sandbox_ls, detect_sandbox_availability};
pub use isolation::{ProbeConfig, detect_isolation_strength};
pub use policy::{PreflightPolicy, preflight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxAvailability {
    Available,
    Unavailable,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationStrength {
    Confirmed,
    NotDetected,
    Unknown,
}

/// Why a detection came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    SandboxListOk,
    EngineMissing,
    CommandUnavailable,
    FeatureDisabled,
    PermissionDenied,
    DaemonUnreachable,
    EmptyListWithError,
    Timeout,
    UnrecognizedFailure,
    IsolationConfirmed,
    UsernsRemapped,
    UsernsNotRemapped,
    UsernsLowMapping,
    RuntimeHardened,
    RuntimeNotHardened,
    ProbeFailed,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::SandboxListOk => "sandbox_ls_ok",
            ReasonCode::EngineMissing => "engine_missing",
            ReasonCode::CommandUnavailable => "command_unavailable",
            ReasonCode::FeatureDisabled => "feature_disabled",
            ReasonCode::PermissionDenied => "permission_denied",
            ReasonCode::DaemonUnreachable => "daemon_unreachable",
            ReasonCode::EmptyListWithError => "empty_list_with_error",
            ReasonCode::Timeout => "timeout",
            ReasonCode::UnrecognizedFailure => "unrecognized_failure",
            ReasonCode::IsolationConfirmed => "isolation_confirmed",
            ReasonCode::UsernsRemapped => "userns_remapped",
            ReasonCode::UsernsNotRemapped => "userns_not_remapped",
            ReasonCode::UsernsLowMapping => "userns_low_mapping",
            ReasonCode::RuntimeHardened => "runtime_hardened",
            ReasonCode::RuntimeNotHardened => "runtime_not_hardened",
            ReasonCode::ProbeFailed => "probe_failed",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tri-state outcome with its reason and remediation text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection<T> {
    pub outcome: T,
    pub reason: ReasonCode,
    pub detail: String,
    pub remediation: String,
}

impl<T> Detection<T> {
    pub fn new(outcome: T, reason: ReasonCode, detail: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self {
            outcome,
            reason,
            detail: detail.into(),
            remediation: remediation.into(),
        }
    }
}

/// Both capability tri-states, as shown by `agentbox status`.
#[derive(Debug, Clone)]
pub struct CapabilityStatus {
    pub availability: Detection<SandboxAvailability>,
    pub isolation: Detection<IsolationStrength>,
}

pub async fn detect_capabilities(engine: &dyn ContainerEngine, probe: &ProbeConfig) -> CapabilityStatus {
    CapabilityStatus {
        availability: detect_sandbox_availability(engine).await,
        isolation: detect_isolation_strength(engine, probe).await,
    }
}

impl CapabilityStatus {
    /// Human-readable lines for `agentbox status`.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "  Sandbox:    {:<12} ({})",
                format!("{:?}", self.availability.outcome),
                self.availability.reason
            ),
            format!(
                "  Isolation:  {:<12} ({})",
                format!("{:?}", self.isolation.outcome),
                self.isolation.reason
            ),
        ];
        for remediation in [&self.availability.remediation, &self.isolation.remediation] {
            if !remediation.is_empty() {
                lines.push(format!("  -> {}", remediation));
            }
        }
        lines
    }
}
