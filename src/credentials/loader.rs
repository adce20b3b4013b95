//! Startup loader for the persisted env file.
//!
//! The container entrypoint evaluates the output of `agentbox env exports`.
//! A variable already present in the environment is left alone, including
//! one explicitly set to the empty string.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::{debug, warn};

use super::is_valid_env_key;
use crate::error::Result;

/// Read `KEY=VALUE` lines. Invalid lines are skipped by line number.
pub fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW)
        .open(path);
    let mut file = match file {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("no env file at {}", path.display());
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;

    let mut entries = BTreeMap::new();
    for (idx, line) in content.lines().enumerate() {
        match line.split_once('=') {
            Some((key, value)) if is_valid_env_key(key) => {
                entries.insert(key.to_string(), value.to_string());
            }
            _ if line.trim().is_empty() => {}
            _ => warn!("{} line {}: malformed, skipping", path.display(), idx + 1),
        }
    }
    Ok(entries)
}

/// POSIX `export` statements for keys absent from the environment.
pub fn export_lines<F>(entries: &BTreeMap<String, String>, env_fn: F) -> Vec<String>
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    entries
        .iter()
        .filter(|(key, _)| matches!(env_fn(key), Err(std::env::VarError::NotPresent)))
        .map(|(key, value)| format!("export {}={}", key, shell_quote(value)))
        .collect()
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
