//! agentbox - per-workspace isolated containers for autonomous coding agents
//!
//! This crate provides:
//! - Capability detection (sandbox availability, isolation strength) and the preflight gate
//! - Config resolution with workspace-scoped overrides
//! - Deterministic container naming and ownership verification
//! - The container lifecycle state machine over an injectable engine
//! - Symlink-safe provisioning of the persistent data volume
//! - Allow-listed credential import and generated home links and agent wrappers

pub mod cli;
pub mod config;
pub mod container;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod paths;
pub mod sandbox;
pub mod security;
pub mod volume;

pub use config::{EffectiveConfig, resolve};
pub use error::{AgentboxError, GuardError, Result};
