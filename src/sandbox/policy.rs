//! Preflight gate applied before any mutating lifecycle operation.

use tracing::warn;

use super::{Detection, IsolationStrength, SandboxAvailability};
use crate::error::{AgentboxError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreflightPolicy {
    /// Skip the availability check (with a warning). Never skips ownership
    /// checks or the isolation requirement.
    pub force: bool,
    /// Treat isolation strength as a hard requirement.
    pub require_isolation: bool,
}

/// Decide whether a mutating operation may proceed.
///
/// `isolation` is only consulted when `require_isolation` is set; callers
/// may pass `None` otherwise to avoid running the probes.
pub fn preflight(
    policy: PreflightPolicy,
    availability: &Detection<SandboxAvailability>,
    isolation: Option<&Detection<IsolationStrength>>,
) -> Result<()> {
    if policy.force {
        if availability.outcome != SandboxAvailability::Available {
            warn!(
                "--force: proceeding despite sandbox availability {:?} ({})",
                availability.outcome, availability.reason
            );
        }
    } else {
        match availability.outcome {
            SandboxAvailability::Unavailable => {
                return Err(AgentboxError::CapabilityUnavailable {
                    reason: format!(
                        "sandbox support is unavailable ({}): {}",
                        availability.reason, availability.detail
                    ),
                    remediation: with_force_hint(&availability.remediation),
                });
            }
            SandboxAvailability::Unknown => warn!(
                "sandbox availability could not be determined ({}); proceeding",
                availability.reason
            ),
            SandboxAvailability::Available => {}
        }
    }

    if policy.require_isolation {
        let Some(isolation) = isolation else {
            return Err(AgentboxError::CapabilityUnavailable {
                reason: "isolation is required but was not detected".to_string(),
                remediation: "Re-run without --require-isolation or fix engine probing.".to_string(),
            });
        };
        if isolation.outcome != IsolationStrength::Confirmed {
            return Err(AgentboxError::CapabilityUnavailable {
                reason: format!(
                    "isolation required but strength is {:?} ({}): {}",
                    isolation.outcome, isolation.reason, isolation.detail
                ),
                remediation: if isolation.remediation.is_empty() {
                    "Enable user-namespace remapping and a hardened runtime, or drop --require-isolation."
                        .to_string()
                } else {
                    isolation.remediation.clone()
                },
            });
        }
    } else if let Some(isolation) = isolation
        && isolation.outcome != IsolationStrength::Confirmed
    {
        warn!(
            "isolation strength is {:?} ({}); continuing (advisory)",
            isolation.outcome, isolation.reason
        );
    }

    Ok(())
}

fn with_force_hint(remediation: &str) -> String {
    if remediation.is_empty() {
        "Pass --force to proceed anyway.".to_string()
    } else {
        format!("{} Or pass --force to proceed anyway.", remediation)
    }
}
