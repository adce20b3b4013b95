//! CLI subcommand: `agentbox run`

use anyhow::{Context, Result, bail};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use super::Scope;
use crate::config;
use crate::container::{
    EnvImportPlan, InContainerProvisioner, LaunchTarget, Mode, Mount, Orchestrator, RunOptions, SocketMount,
    derive_container_name,
};
use crate::engine::DockerCli;
use crate::paths::Paths;
use crate::sandbox::ProbeConfig;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Data volume name (overrides env and config)
    #[arg(long)]
    pub data_volume: Option<String>,

    /// Agent image (overrides env and config)
    #[arg(long)]
    pub image: Option<String>,

    /// Open a fresh shell instead of the agent
    #[arg(long, conflicts_with = "restart")]
    pub shell: bool,

    /// Stop, remove and recreate the container
    #[arg(long)]
    pub restart: bool,

    /// Proceed even if sandbox support is unavailable
    #[arg(long)]
    pub force: bool,

    /// Allow removing a container that has no ownership label
    #[arg(long)]
    pub confirm_ambiguous: bool,

    /// Refuse to start without confirmed isolation
    #[arg(long)]
    pub require_isolation: bool,

    /// Mount the engine control socket into the container
    #[arg(long)]
    pub mount_docker_socket: bool,

    /// Acknowledge that the socket grants host-level control
    #[arg(long, requires = "mount_docker_socket")]
    pub accept_socket_risk: bool,

    /// Extra mount: SOURCE:TARGET[:ro] (SOURCE is a volume name or absolute host path)
    #[arg(long = "mount", value_name = "SOURCE:TARGET[:ro]")]
    pub mounts: Vec<String>,

    /// Extra container environment: KEY=VALUE
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Image used for isolation probes
    #[arg(long, value_name = "IMAGE")]
    pub probe_image: Option<String>,

    /// Agent command (default: claude)
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    fn mode(&self) -> Mode {
        if self.restart {
            Mode::Restart
        } else if self.shell {
            Mode::Shell
        } else {
            Mode::Attach
        }
    }

    fn socket(&self) -> SocketMount {
        if self.mount_docker_socket {
            SocketMount::Requested {
                acknowledged: self.accept_socket_risk,
            }
        } else {
            SocketMount::Off
        }
    }
}

pub async fn run(args: RunArgs, scope: &Scope) -> Result<i32> {
    let paths = Paths::resolve()?;
    let request = scope.config_request(args.data_volume.clone(), args.image.clone());
    let effective = config::resolve(&request, |k| std::env::var(k), &paths)?;
    debug!("effective config: {:?}", effective);

    let target = LaunchTarget {
        name: derive_container_name(&scope.workspace),
        workspace: scope.workspace.clone(),
        image: effective.image.clone(),
        data_volume: effective.data_volume.clone(),
        exclude_patterns: effective.exclude_patterns.clone(),
        env_import: (!effective.env_allowlist.is_empty()).then(|| EnvImportPlan {
            allowlist: effective.env_allowlist.clone(),
            from_host: effective.env_from_host,
            file: effective.env_file.clone(),
        }),
    };

    let mut options = RunOptions {
        mode: args.mode(),
        force: args.force,
        confirm_ambiguous: args.confirm_ambiguous,
        require_isolation: args.require_isolation || effective.require_isolation,
        socket: args.socket(),
        extra_mounts: args.mounts.iter().map(|m| parse_mount(m)).collect::<Result<_>>()?,
        env: parse_env_pairs(&args.env)?,
        ..Default::default()
    };
    if !args.command.is_empty() {
        options.agent_command = args.command.clone();
    }

    let mut probe = ProbeConfig::default();
    if let Some(image) = &args.probe_image {
        probe.image = image.clone();
    }

    let engine = DockerCli::from_env();
    let provisioner = InContainerProvisioner;
    let code = Orchestrator::new(&engine, &provisioner, probe)
        .run(&target, &options)
        .await?;
    Ok(code)
}

/// `SOURCE:TARGET[:ro]`. An absolute SOURCE is a host bind, anything else a
/// named volume.
fn parse_mount(raw: &str) -> Result<Mount> {
    let parts: Vec<&str> = raw.split(':').collect();
    let (source, target, read_only) = match parts.as_slice() {
        [source, target] => (*source, *target, false),
        [source, target, "ro"] => (*source, *target, true),
        [source, target, "rw"] => (*source, *target, false),
        _ => bail!("Invalid --mount '{}': expected SOURCE:TARGET[:ro]", raw),
    };
    if source.is_empty() || target.is_empty() {
        bail!("Invalid --mount '{}': empty source or target", raw);
    }
    let mount = if source.starts_with('/') {
        Mount::Bind {
            source: PathBuf::from(source),
            target: target.to_string(),
            read_only,
        }
    } else {
        Mount::Volume {
            name: source.to_string(),
            target: target.to_string(),
            read_only,
        }
    };
    Ok(mount)
}

fn parse_env_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Invalid --env '{}': expected KEY=VALUE", pair))?;
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}
