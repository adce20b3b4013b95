//! Typed view of the config file.
//!
//! Only the keys below are consumed; anything else in the file is ignored.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AgentboxError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub agent: AgentSection,

    /// Keyed by absolute workspace path, e.g. `[workspace."/home/me/src/app"]`.
    #[serde(default)]
    pub workspace: BTreeMap<String, WorkspaceSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentSection {
    pub data_volume: Option<String>,
    pub image: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub require_isolation: Option<bool>,

    #[serde(default)]
    pub env: EnvSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvSection {
    #[serde(default)]
    pub allow: Vec<String>,
    pub from_host: Option<bool>,
    /// Workspace-relative env file.
    pub file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceSection {
    pub data_volume: Option<String>,
    pub exclude: Option<Vec<String>>,
}

impl ConfigDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| AgentboxError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| AgentboxError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Longest absolute `[workspace."<path>"]` key that is a component-wise
    /// prefix of `workspace` and for which `pick` yields a value.
    ///
    /// Relative keys (including `~` forms) never match.
    pub fn longest_workspace_match<'a, T, F>(&'a self, workspace: &Path, pick: F) -> Option<(PathBuf, T)>
    where
        F: Fn(&'a WorkspaceSection) -> Option<T>,
    {
        let mut best: Option<(usize, PathBuf, T)> = None;

        for (key, section) in &self.workspace {
            let key_path = Path::new(key);
            if !key_path.is_absolute() {
                debug!("ignoring relative workspace key '{}'", key);
                continue;
            }
            let key_path = key_path.canonicalize().unwrap_or_else(|_| key_path.to_path_buf());
            if !workspace.starts_with(&key_path) {
                continue;
            }
            let Some(value) = pick(section) else {
                continue;
            };
            let depth = key_path.components().count();
            if best.as_ref().is_none_or(|(d, _, _)| depth > *d) {
                best = Some((depth, key_path, value));
            }
        }

        best.map(|(_, path, value)| (path, value))
    }
}
