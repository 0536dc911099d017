use anyhow::Result;
use clap::Parser;
use pkgscope_core::PkgscopeConfig;
use pkgscope_core::config::normalize_registry_url;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod console;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = PkgscopeConfig::from_env();
    if let Some(registry) = &args.registry {
        config.npm_registry = normalize_registry_url(registry);
    }
    config.verbose |= args.verbose;

    init_tracing(config.verbose)?;

    match args.command {
        Command::Install(args) => commands::install::run(args, &config).await,
        Command::Exports(args) => commands::exports::run(args, &config).await,
        Command::Analyze(args) => commands::analyze::run(args, &config).await,
        Command::Bundle(args) => commands::bundle::run(args, &config).await,
        Command::Serve(args) => commands::serve::run(args, &config).await,
    }
}

// Logs go to stderr so `serve` can own stdout.
fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))?;
    Ok(())
}
