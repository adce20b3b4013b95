//! CLI subcommands: `agentbox status` and `agentbox verify`

use anyhow::Result;
use clap::Args;

use super::Scope;
use crate::config::{self, VolumeSource};
use crate::container::{Ownership, derive_container_name, read_record};
use crate::engine::{ContainerState, DockerCli};
use crate::paths::Paths;
use crate::sandbox::{ProbeConfig, detect_capabilities, detect_sandbox_availability};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Skip the isolation probes (they start short-lived containers)
    #[arg(long)]
    pub no_probe: bool,

    /// Image used for isolation probes
    #[arg(long, value_name = "IMAGE")]
    pub probe_image: Option<String>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Container name (default: derived from the workspace)
    #[arg(long)]
    pub name: Option<String>,

    /// Expected image (default: resolved from config)
    #[arg(long)]
    pub image: Option<String>,
}

pub async fn run_status(args: StatusArgs, scope: &Scope) -> Result<()> {
    let paths = Paths::resolve()?;
    let effective = config::resolve(&scope.config_request(None, None), |k| std::env::var(k), &paths)?;
    let engine = DockerCli::from_env();

    println!("Capabilities:");
    if args.no_probe {
        let availability = detect_sandbox_availability(&engine).await;
        println!(
            "  Sandbox:    {:<12} ({})",
            format!("{:?}", availability.outcome),
            availability.reason
        );
        println!("  Isolation:  (not probed)");
        if !availability.remediation.is_empty() {
            println!("  -> {}", availability.remediation);
        }
    } else {
        let mut probe = ProbeConfig::default();
        if let Some(image) = args.probe_image {
            probe.image = image;
        }
        for line in detect_capabilities(&engine, &probe).await.status_lines() {
            println!("{}", line);
        }
    }
    println!();

    println!("Workspace:    {}", scope.workspace.display());
    println!("  Container:  {}", derive_container_name(&scope.workspace));
    match &effective.config_source {
        Some(path) => println!("  Config:     {}", path.display()),
        None => println!("  Config:     (none found)"),
    }
    println!(
        "  Volume:     {} ({})",
        effective.data_volume,
        describe_source(&effective.data_volume_source)
    );
    println!("  Image:      {}", effective.image);
    if !effective.exclude_patterns.is_empty() {
        println!("  Excludes:   {}", effective.exclude_patterns.join(", "));
    }
    if !effective.env_allowlist.is_empty() {
        println!(
            "  Env allow:  {} (host: {})",
            effective.env_allowlist.join(", "),
            if effective.env_from_host { "yes" } else { "no" }
        );
    }
    if effective.require_isolation {
        println!("  Isolation:  required");
    }

    Ok(())
}

pub async fn run_verify(args: VerifyArgs, scope: &Scope) -> Result<()> {
    let expected_image = match args.image {
        Some(image) => image,
        None => {
            let paths = Paths::resolve()?;
            config::resolve(&scope.config_request(None, None), |k| std::env::var(k), &paths)?.image
        }
    };
    let name = args.name.unwrap_or_else(|| derive_container_name(&scope.workspace));

    let engine = DockerCli::from_env();
    let record = read_record(&engine, &name, &expected_image).await?;

    println!("Container:  {}", record.name);
    if record.state == ContainerState::None {
        println!("  State:      (does not exist)");
        return Ok(());
    }
    println!("  State:      {:?}", record.state);
    println!("  Image:      {}", record.image_ref.as_deref().unwrap_or("-"));
    println!("  Label:      {}", record.label_value.as_deref().unwrap_or("(none)"));
    let verdict = match record.ownership {
        Some(Ownership::Confirmed) => "Confirmed (created by agentbox)",
        Some(Ownership::Ambiguous) => "Ambiguous (unlabelled, same image; destructive operations need --confirm-ambiguous)",
        Some(Ownership::Foreign) => "Foreign (agentbox will not touch it)",
        None => "-",
    };
    println!("  Ownership:  {}", verdict);

    Ok(())
}

fn describe_source(source: &VolumeSource) -> String {
    match source {
        VolumeSource::Cli => "--data-volume".to_string(),
        VolumeSource::Env => config::DATA_VOLUME_ENV.to_string(),
        VolumeSource::Workspace(key) => format!("[workspace.\"{}\"]", key.display()),
        VolumeSource::Agent => "[agent]".to_string(),
        VolumeSource::Default => "default".to_string(),
    }
}
