use anyhow::Result;
use clap::Parser;

use agentbox::cli::{self, Cli, Commands, Scope};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let code = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn async_main(cli: Cli) -> Result<i32> {
    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        // Runs inside the container; there is no workspace to resolve.
        Commands::Layout(args) => cli::layout::run(args).await.map(|_| 0),
        command => {
            let scope = Scope::new(cli.workspace.as_deref(), cli.config.as_deref())?;
            dispatch(command, &scope).await
        }
    }
}

async fn dispatch(command: Commands, scope: &Scope) -> Result<i32> {
    match command {
        Commands::Run(args) => cli::run::run(args, scope).await,
        Commands::Status(args) => cli::status::run_status(args, scope).await.map(|_| 0),
        Commands::Verify(args) => cli::status::run_verify(args, scope).await.map(|_| 0),
        Commands::Config(args) => cli::config::run(args, scope).await.map(|_| 0),
        Commands::Env(args) => cli::env::run(args, scope).await.map(|_| 0),
        Commands::Paths => cli::paths::run(scope).map(|_| 0),
        Commands::Layout(args) => cli::layout::run(args).await.map(|_| 0),
    }
}
