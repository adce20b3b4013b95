//! Effective settings for one invocation.
//!
//! Data volume precedence (first match wins):
//! 1. `--data-volume`
//! 2. `AGENTBOX_DATA_VOLUME`
//! 3. longest absolute `[workspace."<path>"]` prefix of the workspace
//! 4. `[agent] data_volume`
//! 5. [`DEFAULT_DATA_VOLUME`]
//!
//! The image follows the same chain without the workspace level.

mod discover;
mod document;

pub use discover::{PROJECT_CONFIG, discover_config};
pub use document::{AgentSection, ConfigDocument, EnvSection, WorkspaceSection};

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{AgentboxError, Result};
use crate::paths::Paths;

pub const DEFAULT_DATA_VOLUME: &str = "agentbox-data";
pub const DEFAULT_IMAGE: &str = "ghcr.io/agentbox/agent:latest";

pub const DATA_VOLUME_ENV: &str = "AGENTBOX_DATA_VOLUME";
pub const IMAGE_ENV: &str = "AGENTBOX_IMAGE";

const MAX_VOLUME_NAME: usize = 255;

static VOLUME_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid regex"));

pub fn validate_volume_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_VOLUME_NAME {
        return Err(AgentboxError::validation(
            "volume name",
            name,
            format!("must be 1-{} characters", MAX_VOLUME_NAME),
        ));
    }
    if !VOLUME_NAME_RE.is_match(name) {
        return Err(AgentboxError::validation(
            "volume name",
            name,
            "must start with a letter or digit and contain only letters, digits, '_', '.' or '-'",
        ));
    }
    Ok(())
}

/// Where the data volume name came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    Cli,
    Env,
    Workspace(PathBuf),
    Agent,
    Default,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigRequest {
    pub workspace: PathBuf,
    pub cli_data_volume: Option<String>,
    pub cli_image: Option<String>,
    pub explicit_config: Option<PathBuf>,
}

/// Settings computed once per invocation by [`resolve`].
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub data_volume: String,
    pub data_volume_source: VolumeSource,
    pub image: String,
    pub config_source: Option<PathBuf>,
    pub exclude_patterns: Vec<String>,
    pub env_allowlist: Vec<String>,
    pub env_from_host: bool,
    pub env_file: Option<PathBuf>,
    pub require_isolation: bool,
}

/// Resolve every setting for `request.workspace`.
pub fn resolve<F>(request: &ConfigRequest, env_fn: F, paths: &Paths) -> Result<EffectiveConfig>
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    let cli_volume = non_empty(request.cli_data_volume.clone());
    let env_volume = non_empty(env_fn(DATA_VOLUME_ENV).ok());
    if let Some(v) = &cli_volume {
        validate_volume_name(v)?;
    }
    if let Some(v) = &env_volume {
        validate_volume_name(v)?;
    }

    let config_source = discover_config(&request.workspace, request.explicit_config.as_deref(), paths)?;
    let doc = match &config_source {
        Some(path) => ConfigDocument::load(path)?,
        None => ConfigDocument::default(),
    };

    let workspace = request
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| request.workspace.clone());

    let (data_volume, data_volume_source) = if let Some(v) = cli_volume {
        (v, VolumeSource::Cli)
    } else if let Some(v) = env_volume {
        (v, VolumeSource::Env)
    } else if let Some((key, v)) = doc.longest_workspace_match(&workspace, |s| non_empty(s.data_volume.clone())) {
        (v, VolumeSource::Workspace(key))
    } else if let Some(v) = non_empty(doc.agent.data_volume.clone()) {
        (v, VolumeSource::Agent)
    } else {
        (DEFAULT_DATA_VOLUME.to_string(), VolumeSource::Default)
    };
    if data_volume_source != VolumeSource::Cli && data_volume_source != VolumeSource::Env {
        validate_volume_name(&data_volume).map_err(|e| in_config(&config_source, e))?;
    }
    debug!("data volume '{}' from {:?}", data_volume, data_volume_source);

    let image = non_empty(request.cli_image.clone())
        .or_else(|| non_empty(env_fn(IMAGE_ENV).ok()))
        .or_else(|| non_empty(doc.agent.image.clone()))
        .unwrap_or_else(|| DEFAULT_IMAGE.to_string());

    let exclude_patterns = doc
        .longest_workspace_match(&workspace, |s| s.exclude.clone())
        .map(|(_, patterns)| patterns)
        .or_else(|| doc.agent.exclude.clone())
        .unwrap_or_default();

    let mut env_allowlist = Vec::new();
    for key in &doc.agent.env.allow {
        if crate::credentials::is_valid_env_key(key) {
            if !env_allowlist.contains(key) {
                env_allowlist.push(key.clone());
            }
        } else {
            warn!("ignoring invalid allowlist key '{}'", key);
        }
    }

    Ok(EffectiveConfig {
        data_volume,
        data_volume_source,
        image,
        config_source,
        exclude_patterns,
        env_allowlist,
        env_from_host: doc.agent.env.from_host.unwrap_or(true),
        env_file: non_empty(doc.agent.env.file.clone()).map(PathBuf::from),
        require_isolation: doc.agent.require_isolation.unwrap_or(false),
    })
}

/// The data volume alone, for `agentbox config volume`.
pub fn resolve_data_volume<F>(
    cli_value: Option<&str>,
    workspace: &Path,
    explicit_config: Option<&Path>,
    env_fn: F,
    paths: &Paths,
) -> Result<String>
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    let request = ConfigRequest {
        workspace: workspace.to_path_buf(),
        cli_data_volume: cli_value.map(str::to_string),
        cli_image: None,
        explicit_config: explicit_config.map(Path::to_path_buf),
    };
    Ok(resolve(&request, env_fn, paths)?.data_volume)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn in_config(source: &Option<PathBuf>, err: AgentboxError) -> AgentboxError {
    match source {
        Some(path) => AgentboxError::Config {
            path: path.clone(),
            message: err.to_string(),
        },
        None => err,
    }
}
