//! Config file discovery.
//!
//! 1. An explicit path (`--config` / `AGENTBOX_CONFIG`) must exist.
//! 2. Otherwise walk up from the workspace looking for
//!    `.agentbox/config.toml`, stopping after the repository root (the first
//!    ancestor holding a `.git` entry).
//! 3. Fall back to the per-user config file.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AgentboxError, Result};
use crate::paths::{Paths, expand_tilde};

pub const PROJECT_CONFIG: &str = ".agentbox/config.toml";

pub fn discover_config(workspace: &Path, explicit: Option<&Path>, paths: &Paths) -> Result<Option<PathBuf>> {
    if let Some(explicit) = explicit {
        let path = expand_tilde(explicit);
        if !path.is_file() {
            return Err(AgentboxError::Config {
                path,
                message: "explicit config file does not exist".to_string(),
            });
        }
        return Ok(Some(path));
    }

    for dir in workspace.ancestors() {
        let candidate = dir.join(PROJECT_CONFIG);
        if candidate.is_file() {
            debug!("using project config {}", candidate.display());
            return Ok(Some(candidate));
        }
        if dir.join(".git").exists() {
            break;
        }
    }

    let user = paths.user_config_file();
    if user.is_file() {
        debug!("using user config {}", user.display());
        return Ok(Some(user));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn paths_in(dir: &Path) -> Paths {
        Paths {
            config_dir: dir.join("user-config"),
            home_dir: dir.join("home"),
        }
    }

    fn write_config(dir: &Path) -> PathBuf {
        let path = dir.join(PROJECT_CONFIG);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[agent]\n").unwrap();
        path
    }

    #[test]
    fn explicit_path_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = paths_in(tmp.path());
        let missing = tmp.path().join("nope.toml");
        assert!(discover_config(tmp.path(), Some(&missing), &paths).is_err());

        let present = tmp.path().join("cfg.toml");
        fs::write(&present, "").unwrap();
        assert_eq!(discover_config(tmp.path(), Some(&present), &paths).unwrap(), Some(present));
    }

    #[test]
    fn walk_stops_at_repo_root() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = paths_in(tmp.path());
        let outer = tmp.path().join("outer");
        let repo = outer.join("repo");
        let sub = repo.join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::create_dir_all(repo.join(".git")).unwrap();
        write_config(&outer);

        // The outer config sits above the repo root and is not consulted.
        assert_eq!(discover_config(&sub, None, &paths).unwrap(), None);

        let inner = write_config(&repo);
        assert_eq!(discover_config(&sub, None, &paths).unwrap(), Some(inner));
    }

    #[test]
    fn falls_back_to_user_config() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = paths_in(tmp.path());
        let ws = tmp.path().join("ws");
        fs::create_dir_all(ws.join(".git")).unwrap();

        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(paths.user_config_file(), "[agent]\n").unwrap();
        assert_eq!(discover_config(&ws, None, &paths).unwrap(), Some(paths.user_config_file()));
    }
}
