use crate::commands;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pkgscope",
    about = "install npm packages in memory and measure what they cost to ship",
    version,
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// npm registry to resolve against (overrides PKGSCOPE_REGISTRY)
    #[arg(long, global = true)]
    pub registry: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve and install a package into memory and print its layout
    Install(commands::install::InstallArgs),
    /// List the subpaths a package exports
    Exports(commands::exports::ExportsArgs),
    /// Classify a package module and list its exports
    Analyze(commands::analyze::AnalyzeArgs),
    /// Bundle exports of a package and report raw and compressed sizes
    Bundle(commands::bundle::BundleArgs),
    /// Answer init and bundle requests as JSON lines on stdin/stdout
    Serve(commands::serve::ServeArgs),
}
