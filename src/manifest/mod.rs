//! User manifests: extra volume entries, home links and agent wrappers.
//!
//! Runs inside the container at startup, after the layout step.

pub mod links;
pub mod parse;
pub mod wrappers;

pub use links::{LinkRecord, LinkReport, LinkSpec, apply_links};
pub use parse::{AgentWrapper, EntryFlags, ManifestSet, ManifestSkip, UserManifestEntry, load_manifests};
pub use wrappers::{WrapperScript, find_executable, render_wrappers, write_wrappers};
