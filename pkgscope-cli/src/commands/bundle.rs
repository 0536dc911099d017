use crate::console;
use anyhow::{Context, Result};
use clap::Args;
use pkgscope_core::bundle::{BundleOptions, ConcatEngine};
use pkgscope_core::worker::InitOptions;
use pkgscope_core::{PkgscopeConfig, Session, WorkerHandle};
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct BundleArgs {
    /// Package to bundle
    pub spec: String,

    /// Subpath to bundle; defaults to the package's main entry
    #[arg(short, long)]
    pub subpath: Option<String>,

    /// Only bundle these exports (comma separated); all exports when omitted
    #[arg(short, long, value_delimiter = ',')]
    pub exports: Vec<String>,

    /// Leave a module out of the bundle (repeatable)
    #[arg(long)]
    pub external: Vec<String>,

    #[arg(long = "no-minify")]
    pub no_minify: bool,

    /// Skip auto-installing missing peer dependencies
    #[arg(long = "no-peers")]
    pub no_peers: bool,

    /// Print the bundled code instead of the size report
    #[arg(long)]
    pub code: bool,

    /// Print the bundle result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: BundleArgs, config: &PkgscopeConfig) -> Result<()> {
    let quiet = args.json || args.code;
    if !quiet {
        console::header("bundle");
    }

    let worker = WorkerHandle::spawn(Session::new(config.clone()), Arc::new(ConcatEngine));
    let renderer = (!quiet).then(|| super::render_progress(worker.subscribe()));

    let init = worker
        .init(
            &args.spec,
            InitOptions {
                install_peers: Some(config.install_peers && !args.no_peers),
                concurrency: Some(config.concurrency),
            },
        )
        .await?;

    let subpath = args
        .subpath
        .or(init.default_subpath)
        .context("package has no subpath to bundle")?;
    let selection = (!args.exports.is_empty()).then_some(args.exports);
    let options = BundleOptions {
        external: args.external,
        minify: config.minify && !args.no_minify,
    };

    let result = worker.bundle(&subpath, selection, options).await?;
    drop(worker);
    if let Some(renderer) = renderer {
        renderer.abort();
        console::clear_line();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    if args.code {
        for chunk in &result.chunks {
            println!("{}", chunk.code);
        }
        return Ok(());
    }

    console::info(&format!(
        "{}@{} {}",
        console::green(&init.name),
        init.version,
        console::cyan(&subpath)
    ));
    if result.is_cjs {
        console::warn("CommonJS module, exports cannot be tree-shaken");
    }
    if !result.exports.is_empty() {
        console::info(&console::dim(&format!("  exports: {}", result.exports.join(", "))));
    }
    console::size_row("raw", Some(result.total.raw));
    console::size_row("gzip", Some(result.total.gzip));
    console::size_row("brotli", result.total.brotli);
    console::size_row("zstd", result.total.zstd);

    console::info(&console::dim(&format!(
        "\n{} packages installed, {} bundled in {:.2}s",
        init.package_count,
        console::format_bytes(init.install_size),
        console::elapsed_seconds()
    )));
    Ok(())
}
