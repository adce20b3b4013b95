//! Sandbox availability via the engine's `sandbox ls`.

use tracing::{debug, warn};

use super::{Detection, ReasonCode, SandboxAvailability};
use crate::engine::{ContainerEngine, EngineError, EngineOutput};

/// Probe the engine for sandbox support.
pub async fn detect_sandbox_availability(engine: &dyn ContainerEngine) -> Detection<SandboxAvailability> {
    let detection = classify_sandbox_ls(engine.list_sandboxes().await);
    match detection.outcome {
        SandboxAvailability::Unknown => warn!(
            "sandbox availability unknown ({}): {}; proceeding",
            detection.reason, detection.detail
        ),
        _ => debug!("sandbox availability: {:?} ({})", detection.outcome, detection.reason),
    }
    detection
}

/// Ordered rule set; the first matching rule wins.
pub fn classify_sandbox_ls(result: Result<EngineOutput, EngineError>) -> Detection<SandboxAvailability> {
    use SandboxAvailability::*;

    let out = match result {
        Ok(out) => out,
        Err(EngineError::Missing { binary }) => {
            return Detection::new(
                Unavailable,
                ReasonCode::EngineMissing,
                format!("'{}' not found", binary),
                "Install Docker Desktop (or a compatible engine) and make sure it is on PATH.",
            );
        }
        Err(EngineError::Timeout { secs, .. }) => {
            return Detection::new(
                Unknown,
                ReasonCode::Timeout,
                format!("`sandbox ls` did not answer within {}s", secs),
                "Check that the engine is responsive (`docker info`).",
            );
        }
        Err(e) => {
            return Detection::new(Unknown, ReasonCode::UnrecognizedFailure, e.to_string(), "");
        }
    };

    if out.success() {
        return Detection::new(Available, ReasonCode::SandboxListOk, "", "");
    }

    let stderr = out.stderr.trim();
    let lower = stderr.to_lowercase();

    if lower.contains("is not a docker command") || lower.contains("unknown command") {
        return Detection::new(
            Unavailable,
            ReasonCode::CommandUnavailable,
            stderr,
            "This engine has no sandbox support. Update Docker Desktop to a release that ships `docker sandbox`.",
        );
    }

    if lower.contains("disabled") || lower.contains("not enabled") {
        return Detection::new(
            Unavailable,
            ReasonCode::FeatureDisabled,
            stderr,
            "Enable the sandbox feature in Docker Desktop settings, then retry.",
        );
    }

    if lower.contains("permission denied") {
        return Detection::new(
            Unavailable,
            ReasonCode::PermissionDenied,
            stderr,
            "Your user cannot reach the engine socket. Add it to the 'docker' group or fix socket permissions.",
        );
    }

    if lower.contains("cannot connect to the docker daemon") || lower.contains("is the docker daemon running") {
        return Detection::new(
            Unavailable,
            ReasonCode::DaemonUnreachable,
            stderr,
            "Start the Docker daemon (or Docker Desktop) and retry.",
        );
    }

    if is_header_only(&out.stdout) && lower.contains("error") {
        return Detection::new(
            Unknown,
            ReasonCode::EmptyListWithError,
            stderr,
            "The engine returned an empty sandbox list with an error; re-run with --verbose if problems follow.",
        );
    }

    Detection::new(
        Unknown,
        ReasonCode::UnrecognizedFailure,
        format!("exit {}: {}", out.status.unwrap_or(-1), stderr),
        "",
    )
}

/// True when stdout carries no rows beyond an optional table header.
fn is_header_only(stdout: &str) -> bool {
    let rows: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    match rows.as_slice() {
        [] => true,
        [only] => only.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeEngine;

    fn failed(stdout: &str, stderr: &str) -> Result<EngineOutput, EngineError> {
        Ok(EngineOutput {
            status: Some(1),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn success_is_available() {
        let d = classify_sandbox_ls(Ok(EngineOutput {
            status: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }));
        assert_eq!(d.outcome, SandboxAvailability::Available);
        assert_eq!(d.reason, ReasonCode::SandboxListOk);
    }

    #[test]
    fn confirmed_negatives_fail_closed() {
        let cases = [
            ("docker: 'sandbox' is not a docker command.", ReasonCode::CommandUnavailable),
            ("Error: sandboxes are disabled by your administrator", ReasonCode::FeatureDisabled),
            (
                "permission denied while trying to connect to the Docker daemon socket",
                ReasonCode::PermissionDenied,
            ),
            (
                "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
                ReasonCode::DaemonUnreachable,
            ),
        ];
        for (stderr, reason) in cases {
            let d = classify_sandbox_ls(failed("", stderr));
            assert_eq!(d.outcome, SandboxAvailability::Unavailable, "{stderr}");
            assert_eq!(d.reason, reason, "{stderr}");
            assert!(!d.remediation.is_empty());
        }
    }

    #[test]
    fn missing_engine_is_unavailable() {
        let d = classify_sandbox_ls(Err(EngineError::Missing {
            binary: "docker".to_string(),
        }));
        assert_eq!(d.outcome, SandboxAvailability::Unavailable);
        assert_eq!(d.reason, ReasonCode::EngineMissing);
    }

    #[test]
    fn uncertainty_fails_open() {
        let d = classify_sandbox_ls(failed("SANDBOX ID   TEMPLATE\n", "error listing sandboxes: EOF"));
        assert_eq!(d.outcome, SandboxAvailability::Unknown);
        assert_eq!(d.reason, ReasonCode::EmptyListWithError);

        let d = classify_sandbox_ls(failed("", "something odd happened"));
        assert_eq!(d.outcome, SandboxAvailability::Unknown);
        assert_eq!(d.reason, ReasonCode::UnrecognizedFailure);

        let d = classify_sandbox_ls(Err(EngineError::Timeout {
            op: "sandbox ls".to_string(),
            secs: 30,
        }));
        assert_eq!(d.outcome, SandboxAvailability::Unknown);
        assert_eq!(d.reason, ReasonCode::Timeout);
    }

    #[test]
    fn header_detection() {
        assert!(is_header_only(""));
        assert!(is_header_only("SANDBOX ID   TEMPLATE   NAME\n"));
        assert!(!is_header_only("SANDBOX ID\nabc123 claude\n"));
    }

    #[tokio::test]
    async fn detects_through_engine() {
        let engine = FakeEngine::new();
        let d = detect_sandbox_availability(&engine).await;
        assert_eq!(d.outcome, SandboxAvailability::Available);
    }
}
