pub mod config;
pub mod env;
pub mod layout;
pub mod paths;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::ConfigRequest;

#[derive(Parser)]
#[command(name = "agentbox")]
#[command(author, version, about = "Per-workspace isolated containers for coding agents")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file (skips discovery)
    #[arg(short, long, global = true, env = "AGENTBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Workspace directory (default: current directory)
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch, attach to, or restart the workspace container
    Run(run::RunArgs),

    /// Show engine capabilities and the resolved settings
    Status(status::StatusArgs),

    /// Show the workspace container's state and ownership
    Verify(status::VerifyArgs),

    /// Configuration queries
    Config(config::ConfigArgs),

    /// Data volume layout (runs inside the container)
    Layout(layout::LayoutArgs),

    /// Allow-listed credential import and startup exports
    Env(env::EnvArgs),

    /// Show resolved host paths
    Paths,
}

/// Workspace and config file as given on the command line.
#[derive(Debug, Clone)]
pub struct Scope {
    pub workspace: PathBuf,
    pub explicit_config: Option<PathBuf>,
}

impl Scope {
    pub fn new(workspace: Option<&Path>, explicit_config: Option<&Path>) -> Result<Self> {
        let workspace = match workspace {
            Some(path) => path.to_path_buf(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        let workspace = workspace
            .canonicalize()
            .with_context(|| format!("Workspace {} is not accessible", workspace.display()))?;
        Ok(Self {
            workspace,
            explicit_config: explicit_config.map(Path::to_path_buf),
        })
    }

    pub fn config_request(&self, data_volume: Option<String>, image: Option<String>) -> ConfigRequest {
        ConfigRequest {
            workspace: self.workspace.clone(),
            cli_data_volume: data_volume,
            cli_image: image,
            explicit_config: self.explicit_config.clone(),
        }
    }
}

/// Split a comma-separated list, dropping blanks.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_trailing_command() {
        let cli = Cli::try_parse_from(["agentbox", "run", "--shell", "--force", "--", "bash", "-c", "ls"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert!(args.shell);
                assert!(args.force);
                assert_eq!(args.command, vec!["bash", "-c", "ls"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn shell_and_restart_conflict() {
        assert!(Cli::try_parse_from(["agentbox", "run", "--shell", "--restart"]).is_err());
    }

    #[test]
    fn socket_risk_requires_socket_flag() {
        assert!(Cli::try_parse_from(["agentbox", "run", "--accept-socket-risk"]).is_err());
        assert!(Cli::try_parse_from(["agentbox", "run", "--mount-docker-socket", "--accept-socket-risk"]).is_ok());
    }

    #[test]
    fn list_splitting() {
        assert_eq!(split_list("A, B,,C "), vec!["A", "B", "C"]);
        assert!(split_list("").is_empty());
    }
}
