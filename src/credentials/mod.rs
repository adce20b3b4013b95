//! Allow-listed environment import.
//!
//! Values come from two sources: the process environment of the importing
//! invocation (`host`) and a workspace-relative env file (`file`). Host wins
//! for the same key. The merged set is persisted to the data volume and
//! exported at container startup by [`loader`].
//!
//! Nothing in this module logs or formats a value.

pub mod import;
pub mod loader;
pub mod parse;

use once_cell::sync::Lazy;
use regex::Regex;

pub use import::{EnvImportResult, EnvSource, ImportRequest, ImportedValue, import_env};
pub use loader::{export_lines, read_env_file};
pub use parse::{ParsedEnvFile, SkipReason, SkippedEnv, parse_env_file};

static ENV_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

pub fn is_valid_env_key(key: &str) -> bool {
    ENV_KEY_RE.is_match(key)
}
