//! XDG-compliant host paths and container-side layout roots.
//!
//! Host directories resolve through a two-level fallback:
//! 1. agentbox-specific env var (`AGENTBOX_CONFIG_DIR`)
//! 2. XDG / platform default via `etcetera`
//!
//! Relative or empty env values are ignored per the XDG spec.

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Where the data volume is mounted inside the container.
pub const DEFAULT_DATA_ROOT: &str = "/data";

/// Home directory of the service user inside the container.
pub const DEFAULT_HOME_ROOT: &str = "/home/agent";

/// Workspace bind target inside the container.
pub const WORKSPACE_TARGET: &str = "/workspace";

#[derive(Debug, Clone)]
pub struct Paths {
    /// Per-user config directory: `config.toml` lives here.
    pub config_dir: PathBuf,
    /// User home, used for `~` expansion in diagnostics.
    pub home_dir: PathBuf,
}

impl Paths {
    /// Resolve using real environment variables.
    pub fn resolve() -> Result<Self> {
        Self::resolve_with_env(|key| std::env::var(key))
    }

    /// Resolve with a custom env lookup (for testing).
    pub fn resolve_with_env<F>(env_fn: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
    {
        use etcetera::BaseStrategy;

        let strategy = etcetera::choose_base_strategy()
            .map_err(|e| anyhow::anyhow!("Failed to determine base directories: {}", e))?;

        let config_dir = env_or(&env_fn, "AGENTBOX_CONFIG_DIR", || {
            strategy.config_dir().join("agentbox")
        });

        let home_dir =
            etcetera::home_dir().map_err(|e| anyhow::anyhow!("Failed to determine home directory: {}", e))?;

        Ok(Self { config_dir, home_dir })
    }

    /// Per-user fallback config: `config_dir/config.toml`.
    pub fn user_config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}

/// Container-side roots used by layout, link and env commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRoots {
    pub data_root: PathBuf,
    pub home_root: PathBuf,
}

impl ContainerRoots {
    pub fn new(data_root: impl Into<PathBuf>, home_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            home_root: home_root.into(),
        }
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.data_root.join("manifests")
    }

    pub fn env_dir(&self) -> PathBuf {
        self.data_root.join("env")
    }

    pub fn env_file(&self) -> PathBuf {
        self.env_dir().join("agent.env")
    }

    pub fn link_spec_file(&self) -> PathBuf {
        self.data_root.join("generated").join("links.json")
    }

    pub fn wrappers_file(&self) -> PathBuf {
        self.data_root.join("generated").join("wrappers.sh")
    }
}

impl Default for ContainerRoots {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_ROOT, DEFAULT_HOME_ROOT)
    }
}

/// Resolve an env var with fallback. Ignores empty and relative paths.
fn env_or<F>(env_fn: &F, var: &str, default: impl FnOnce() -> PathBuf) -> PathBuf
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    env_fn(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .unwrap_or_else(default)
}

/// Expand a leading `~` against the user's home.
pub fn expand_tilde(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_env(map: HashMap<&str, &str>) -> impl Fn(&str) -> std::result::Result<String, std::env::VarError> {
        move |key: &str| {
            map.get(key)
                .map(|v| v.to_string())
                .ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn default_config_dir_is_xdg() {
        let paths = Paths::resolve_with_env(make_env(HashMap::new())).unwrap();
        assert!(paths.config_dir.ends_with("agentbox"), "{:?}", paths.config_dir);
        assert!(paths.user_config_file().ends_with("agentbox/config.toml"));
    }

    #[test]
    fn env_override_and_relative_ignored() {
        let paths = Paths::resolve_with_env(make_env(HashMap::from([("AGENTBOX_CONFIG_DIR", "/custom/cfg")]))).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/custom/cfg"));

        let paths = Paths::resolve_with_env(make_env(HashMap::from([("AGENTBOX_CONFIG_DIR", "rel/cfg")]))).unwrap();
        assert!(paths.config_dir.is_absolute());

        let paths = Paths::resolve_with_env(make_env(HashMap::from([("AGENTBOX_CONFIG_DIR", "")]))).unwrap();
        assert!(paths.config_dir.ends_with("agentbox"));
    }

    #[test]
    fn container_roots_accessors() {
        let roots = ContainerRoots::default();
        assert_eq!(roots.env_file(), PathBuf::from("/data/env/agent.env"));
        assert_eq!(roots.manifests_dir(), PathBuf::from("/data/manifests"));
        assert!(roots.link_spec_file().ends_with("generated/links.json"));
    }
}
