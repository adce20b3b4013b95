//! CLI subcommand: `agentbox layout`
//!
//! Runs inside the container: `ensure` from the one-shot provisioning job,
//! `links` from the entrypoint at every start.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use crate::manifest::{apply_links, load_manifests, write_wrappers};
use crate::paths::{ContainerRoots, DEFAULT_DATA_ROOT, DEFAULT_HOME_ROOT};
use crate::security::Owner;
use crate::volume::{builtin_entries, ensure_layout};

#[derive(Args)]
pub struct LayoutArgs {
    #[command(subcommand)]
    pub command: LayoutCommands,
}

#[derive(Args, Debug, Clone)]
pub struct RootArgs {
    /// Data volume mount point
    #[arg(long, default_value = DEFAULT_DATA_ROOT)]
    pub data_root: PathBuf,

    /// Service user's home directory
    #[arg(long, default_value = DEFAULT_HOME_ROOT)]
    pub home_root: PathBuf,
}

impl RootArgs {
    fn roots(&self) -> ContainerRoots {
        ContainerRoots::new(&self.data_root, &self.home_root)
    }
}

#[derive(Subcommand)]
pub enum LayoutCommands {
    /// Create the data volume layout and fix ownership and modes
    Ensure {
        #[command(flatten)]
        roots: RootArgs,

        /// Owner uid (default: invoking user)
        #[arg(long, requires = "gid")]
        uid: Option<u32>,

        /// Owner gid (default: invoking user)
        #[arg(long, requires = "uid")]
        gid: Option<u32>,
    },

    /// Link home paths into the volume and regenerate agent wrappers
    Links {
        #[command(flatten)]
        roots: RootArgs,
    },
}

pub async fn run(args: LayoutArgs) -> Result<()> {
    match args.command {
        LayoutCommands::Ensure { roots, uid, gid } => {
            let owner = match (uid, gid) {
                (Some(uid), Some(gid)) => Owner { uid, gid },
                _ => Owner::current(),
            };
            ensure(&roots.roots(), owner)
        }
        LayoutCommands::Links { roots } => links(&roots.roots()),
    }
}

fn ensure(roots: &ContainerRoots, owner: Owner) -> Result<()> {
    let report = ensure_layout(&roots.data_root, &builtin_entries(), Some(owner))
        .with_context(|| format!("Failed to provision {}", roots.data_root.display()))?;
    let mut ready = report.ready.len();
    let mut skipped = report.skipped;

    let manifests = load_manifests(roots)?;
    for skip in &manifests.skipped {
        warn!("manifest {}: {}", skip.file.display(), skip.reason);
    }
    let extra = manifests.volume_entries();
    if !extra.is_empty() {
        let report = ensure_layout(&roots.data_root, &extra, Some(owner))?;
        ready += report.ready.len();
        skipped.extend(report.skipped);
    }

    println!("Layout ready: {} entries", ready);
    for skip in &skipped {
        println!("  skipped {}: {}", skip.target.display(), skip.reason);
    }
    Ok(())
}

fn links(roots: &ContainerRoots) -> Result<()> {
    let manifests = load_manifests(roots)?;
    let mut entries = builtin_entries();
    entries.extend(manifests.volume_entries());

    let report = apply_links(roots, &entries)?;
    println!("Linked {} path(s) -> {}", report.spec.links.len(), report.spec_path.display());
    for skip in &report.skipped {
        println!("  skipped {}: {}", skip.link.display(), skip.reason);
    }

    let path_var = std::env::var("PATH").unwrap_or_default();
    let wrappers = write_wrappers(&roots.wrappers_file(), &manifests.agents, &path_var)?;
    if !wrappers.functions.is_empty() {
        println!("Wrappers: {}", wrappers.functions.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn roots() -> (tempfile::TempDir, ContainerRoots) {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().canonicalize().unwrap();
        fs::create_dir_all(base.join("data")).unwrap();
        fs::create_dir_all(base.join("home")).unwrap();
        (tmp, ContainerRoots::new(base.join("data"), base.join("home")))
    }

    #[test]
    fn ensure_then_links_with_manifest() {
        let (_tmp, roots) = roots();
        ensure(&roots, Owner::current()).unwrap();
        assert!(roots.manifests_dir().is_dir());

        fs::write(
            roots.manifests_dir().join("10-aider.toml"),
            "[[link]]\ntarget = \"aider\"\ncontainer_link = \".aider\"\nflags = \"dir\"\n",
        )
        .unwrap();
        ensure(&roots, Owner::current()).unwrap();
        assert!(roots.data_root.join("aider").is_dir());

        links(&roots).unwrap();
        assert_eq!(
            fs::read_link(roots.home_root.join(".aider")).unwrap(),
            roots.data_root.join("aider")
        );
        assert!(roots.link_spec_file().is_file());
        assert!(roots.wrappers_file().is_file());
    }
}
