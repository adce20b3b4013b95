use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::Scope;
use crate::config::{self, PROJECT_CONFIG, discover_config};
use crate::paths::Paths;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the data volume name for the workspace
    Volume {
        /// Explicit volume name (highest precedence)
        #[arg(long)]
        data_volume: Option<String>,
    },

    /// Show the config file that applies to the workspace
    Path,

    /// Initialize a config file
    Init {
        /// Write `.agentbox/config.toml` in the workspace instead of the user config
        #[arg(long)]
        project: bool,

        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run(args: ConfigArgs, scope: &Scope) -> Result<()> {
    match args.command {
        ConfigCommands::Volume { data_volume } => show_volume(data_volume.as_deref(), scope),
        ConfigCommands::Path => show_path(scope),
        ConfigCommands::Init { project, force } => init_config(scope, project, force),
    }
}

fn show_volume(data_volume: Option<&str>, scope: &Scope) -> Result<()> {
    let paths = Paths::resolve()?;
    let volume = config::resolve_data_volume(
        data_volume,
        &scope.workspace,
        scope.explicit_config.as_deref(),
        |k| std::env::var(k),
        &paths,
    )?;
    println!("{}", volume);
    Ok(())
}

fn show_path(scope: &Scope) -> Result<()> {
    let paths = Paths::resolve()?;
    match discover_config(&scope.workspace, scope.explicit_config.as_deref(), &paths)? {
        Some(path) => println!("{}", path.display()),
        None => println!("(none; defaults apply)"),
    }
    Ok(())
}

fn init_config(scope: &Scope, project: bool, force: bool) -> Result<()> {
    let path: PathBuf = if project {
        scope.workspace.join(PROJECT_CONFIG)
    } else {
        Paths::resolve()?.user_config_file()
    };

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;

    println!("Created config file at {}", path.display());
    Ok(())
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# agentbox configuration

[agent]
# Named volume holding agent state, credentials and manifests.
# Overridden by --data-volume and AGENTBOX_DATA_VOLUME.
# data_volume = "agentbox-data"

# image = "ghcr.io/agentbox/agent:latest"

# Workspace paths masked with anonymous volumes (globs, workspace-relative).
# exclude = ["node_modules", "target"]

# Refuse to start without user-namespace remapping and a hardened runtime.
# require_isolation = false

[agent.env]
# Only these variables are ever imported into the data volume.
allow = []
# Read allow-listed values from the host environment.
from_host = true
# Workspace-relative env file; host values win over it.
# file = ".env.agent"

# Per-workspace overrides; the deepest matching absolute path wins.
# [workspace."/home/me/src/client-project"]
# data_volume = "agentbox-client"
# exclude = ["vendor"]
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigDocument;
    use std::path::Path;

    #[test]
    fn template_parses_to_defaults() {
        let doc = ConfigDocument::parse(DEFAULT_CONFIG_TEMPLATE, Path::new("template.toml")).unwrap();
        assert!(doc.agent.data_volume.is_none());
        assert!(doc.agent.env.allow.is_empty());
        assert_eq!(doc.agent.env.from_host, Some(true));
        assert!(doc.workspace.is_empty());
    }
}
