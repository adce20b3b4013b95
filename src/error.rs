//! Error taxonomy shared by every component.
//!
//! Validation and guard failures are per-item: batch operations record them
//! and keep going. Capability and ownership failures gate a whole invocation.
//! Capability *uncertainty* is not an error at all; it is a logged
//! [`Detection`](crate::sandbox::Detection) with an `Unknown` outcome.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;

pub type Result<T> = std::result::Result<T, AgentboxError>;

#[derive(Error, Debug)]
pub enum AgentboxError {
    /// Bad name, path or identifier. Rejects only the offending item.
    #[error("invalid {what} '{value}': {reason}")]
    Validation {
        what: &'static str,
        value: String,
        reason: String,
    },

    /// A confirmed negative capability result.
    #[error("{reason}\n  remediation: {remediation}")]
    CapabilityUnavailable { reason: String, remediation: String },

    /// The named container is not (provably) ours.
    #[error("container '{name}' {detail}\n  remediation: {remediation}")]
    OwnershipConflict {
        name: String,
        detail: String,
        remediation: String,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Symlink, TOCTOU or path-escape check failed. Carries the path, never content.
    #[error(transparent)]
    SecurityGuard(#[from] GuardError),

    #[error("config file {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentboxError {
    pub fn validation(what: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            what,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// A filesystem safety check tripped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("refusing to follow symlink at {0}")]
    Symlink(PathBuf),

    #[error("path {path} escapes {root}")]
    Escape { path: PathBuf, root: PathBuf },

    #[error("path {0} must be relative without '..' segments")]
    NotRelative(PathBuf),

    #[error("{path} is not a directory")]
    NotDirectory { path: PathBuf },

    #[error("cannot resolve {path}: {message}")]
    Unresolvable { path: PathBuf, message: String },
}
