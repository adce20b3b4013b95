//! CLI subcommand: `agentbox env`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use super::{Scope, split_list};
use crate::config;
use crate::container::{EnvImportPlan, InContainerProvisioner, ProvisionPlan};
use crate::credentials::{ImportRequest, export_lines, import_env, read_env_file};
use crate::engine::DockerCli;
use crate::paths::{ContainerRoots, DEFAULT_DATA_ROOT, DEFAULT_HOME_ROOT, Paths};
use crate::security::Owner;

#[derive(Args)]
pub struct EnvArgs {
    #[command(subcommand)]
    pub command: EnvCommands,
}

#[derive(Subcommand)]
pub enum EnvCommands {
    /// Import allow-listed variables into the data volume
    ///
    /// With --data-root the import runs against that directory (inside the
    /// container). Without it, a one-shot container does the import against
    /// the resolved data volume.
    Import {
        /// Write directly under this data root
        #[arg(long)]
        data_root: Option<PathBuf>,

        /// Comma-separated allowlist (default: from config)
        #[arg(long, value_name = "KEYS")]
        allow: Option<String>,

        /// Workspace-relative env file (default: from config)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Do not read values from the host environment
        #[arg(long)]
        no_host: bool,

        /// Print what would be imported without writing
        #[arg(long)]
        dry_run: bool,

        /// Owner uid of the written file
        #[arg(long, requires = "gid")]
        uid: Option<u32>,

        /// Owner gid of the written file
        #[arg(long, requires = "uid")]
        gid: Option<u32>,

        /// Data volume name (host mode only)
        #[arg(long)]
        data_volume: Option<String>,
    },

    /// Print `export` lines for persisted variables not already set
    Exports {
        #[arg(long, default_value = DEFAULT_DATA_ROOT)]
        data_root: PathBuf,
    },
}

/// Allowlist and sources after applying flags over config.
struct ImportSettings {
    allowlist: Vec<String>,
    from_host: bool,
    file: Option<PathBuf>,
}

pub async fn run(args: EnvArgs, scope: &Scope) -> Result<()> {
    match args.command {
        EnvCommands::Import {
            data_root,
            allow,
            file,
            no_host,
            dry_run,
            uid,
            gid,
            data_volume,
        } => {
            let owner = match (uid, gid) {
                (Some(uid), Some(gid)) => Some(Owner { uid, gid }),
                _ => None,
            };
            match data_root {
                Some(root) => {
                    let settings = ImportSettings {
                        allowlist: allow.as_deref().map(split_list).unwrap_or_default(),
                        from_host: !no_host,
                        file,
                    };
                    import_local(&root, &scope.workspace, &settings, owner, dry_run)
                }
                None => {
                    let paths = Paths::resolve()?;
                    let effective =
                        config::resolve(&scope.config_request(data_volume, None), |k| std::env::var(k), &paths)?;
                    let settings = ImportSettings {
                        allowlist: allow.as_deref().map(split_list).unwrap_or(effective.env_allowlist),
                        from_host: effective.env_from_host && !no_host,
                        file: file.or(effective.env_file),
                    };
                    if dry_run {
                        let destination = ContainerRoots::default().env_file();
                        return preview(&settings, &scope.workspace, &destination);
                    }
                    import_via_engine(&effective.image, &effective.data_volume, &scope.workspace, settings).await
                }
            }
        }
        EnvCommands::Exports { data_root } => exports(&data_root),
    }
}

fn import_local(
    data_root: &Path,
    workspace: &Path,
    settings: &ImportSettings,
    owner: Option<Owner>,
    dry_run: bool,
) -> Result<()> {
    let destination = ContainerRoots::new(data_root, DEFAULT_HOME_ROOT).env_file();
    if dry_run {
        return preview(settings, workspace, &destination);
    }
    let request = ImportRequest {
        allowlist: &settings.allowlist,
        from_host: settings.from_host,
        env_file: settings.file.as_deref(),
        workspace_root: workspace,
        destination: &destination,
        owner,
        dry_run: false,
    };
    let result = import_env(&request, |k| std::env::var(k))
        .with_context(|| format!("Failed to import env into {}", destination.display()))?;

    println!("Imported {} variable(s)", result.merged.len());
    for key in &result.missing {
        println!("  not set anywhere: {}", key);
    }
    Ok(())
}

fn preview(settings: &ImportSettings, workspace: &Path, destination: &Path) -> Result<()> {
    let request = ImportRequest {
        allowlist: &settings.allowlist,
        from_host: settings.from_host,
        env_file: settings.file.as_deref(),
        workspace_root: workspace,
        destination,
        owner: None,
        dry_run: true,
    };
    let result = import_env(&request, |k| std::env::var(k))?;
    println!("Would import:");
    for line in result.summary_lines() {
        println!("  {}", line);
    }
    for key in &result.missing {
        println!("  (missing) {}", key);
    }
    Ok(())
}

async fn import_via_engine(image: &str, data_volume: &str, workspace: &Path, settings: ImportSettings) -> Result<()> {
    if settings.allowlist.is_empty() {
        println!("Env allowlist is empty; nothing to import.");
        return Ok(());
    }
    let count = settings.allowlist.len();
    let plan = ProvisionPlan {
        image: image.to_string(),
        data_volume: data_volume.to_string(),
        workspace: workspace.to_path_buf(),
        env: Some(EnvImportPlan {
            allowlist: settings.allowlist,
            from_host: settings.from_host,
            file: settings.file,
        }),
    };
    let engine = DockerCli::from_env();
    InContainerProvisioner.import_env(&engine, &plan).await?;
    println!("Imported up to {} allow-listed variable(s) into '{}'", count, data_volume);
    Ok(())
}

fn exports(data_root: &Path) -> Result<()> {
    let env_file = ContainerRoots::new(data_root, DEFAULT_HOME_ROOT).env_file();
    let entries = read_env_file(&env_file)?;
    for line in export_lines(&entries, |k| std::env::var(k)) {
        println!("{}", line);
    }
    Ok(())
}
