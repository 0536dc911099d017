use crate::console;
use anyhow::{Context, Result};
use clap::Args;
use pkgscope_core::PkgscopeConfig;
use pkgscope_core::analyze::{ModuleKind, analyze_module};
use pkgscope_core::bundle::resolve_subpath_target;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Package to analyze
    pub spec: String,

    /// Subpath to analyze; defaults to the package's main entry
    #[arg(short, long)]
    pub subpath: Option<String>,

    /// Print the module info as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: AnalyzeArgs, config: &PkgscopeConfig) -> Result<()> {
    if !args.json {
        console::header("analyze");
    }

    let installation = super::install_with_progress(&args.spec, config).await?;
    let result = &installation.result;
    let subpath = args
        .subpath
        .or_else(|| result.default_subpath.clone())
        .context("package has no subpath to analyze")?;

    let target = resolve_subpath_target(&installation.fs, &result.name, &subpath)?;
    let source = installation
        .fs
        .read_to_string(&target)
        .with_context(|| format!("{target} is not readable as UTF-8"))?;
    let info = analyze_module(&source, &target)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let kind = match info.kind {
        ModuleKind::Esm => "ES module",
        ModuleKind::Cjs => "CommonJS",
        ModuleKind::Unknown => "no exports",
    };
    console::info(&format!("{} {}", console::cyan(&subpath), console::dim(&target)));
    console::info(&format!("  kind     {kind}"));
    console::info(&format!("  default  {}", info.has_default_export));
    if info.has_star_reexport {
        console::info("  re-exports * from another module");
    }
    for name in &info.named_exports {
        console::info(&format!("  export   {}", console::green(name)));
    }
    Ok(())
}
