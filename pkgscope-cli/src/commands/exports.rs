use crate::console;
use anyhow::Result;
use clap::Args;
use pkgscope_core::PkgscopeConfig;

#[derive(Args, Debug)]
pub struct ExportsArgs {
    /// Package whose subpaths to list
    pub spec: String,

    /// Print the subpaths as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ExportsArgs, config: &PkgscopeConfig) -> Result<()> {
    if !args.json {
        console::header("exports");
    }

    let installation = super::install_with_progress(&args.spec, config).await?;
    let result = installation.result;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.subpaths)?);
        return Ok(());
    }

    if result.subpaths.is_empty() {
        console::warn(&format!("{} exports nothing", result.name));
        return Ok(());
    }

    for subpath in &result.subpaths {
        let marker = if result.default_subpath.as_deref() == Some(subpath.subpath.as_str()) {
            console::green("*")
        } else {
            " ".to_string()
        };
        println!(
            "{} {} {}",
            marker,
            console::cyan(&subpath.subpath),
            console::dim(&subpath.target)
        );
    }
    Ok(())
}
