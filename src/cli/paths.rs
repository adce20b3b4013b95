//! CLI subcommand: `agentbox paths`
//!
//! Prints resolved host paths and the container-side layout for debugging
//! and scripting.

use anyhow::Result;

use super::Scope;
use crate::config::{PROJECT_CONFIG, discover_config};
use crate::paths::{ContainerRoots, Paths, WORKSPACE_TARGET};

pub fn run(scope: &Scope) -> Result<()> {
    let paths = Paths::resolve()?;
    let roots = ContainerRoots::default();

    println!("agentbox Paths");
    println!("==============");
    println!();
    println!("Config:     {}", paths.config_dir.display());
    println!("  user config:    {}", paths.user_config_file().display());
    println!("  project config: {}", scope.workspace.join(PROJECT_CONFIG).display());
    match discover_config(&scope.workspace, scope.explicit_config.as_deref(), &paths)? {
        Some(path) => println!("  in effect:      {}", path.display()),
        None => println!("  in effect:      (none)"),
    }
    println!();
    println!("Container:");
    println!("  workspace:      {}", WORKSPACE_TARGET);
    println!("  data root:      {}", roots.data_root.display());
    println!("  home:           {}", roots.home_root.display());
    println!("  env file:       {}", roots.env_file().display());
    println!("  manifests:      {}", roots.manifests_dir().display());
    println!("  link spec:      {}", roots.link_spec_file().display());
    println!("  wrappers:       {}", roots.wrappers_file().display());

    Ok(())
}
