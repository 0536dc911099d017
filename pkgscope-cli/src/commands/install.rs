use crate::console;
use anyhow::Result;
use clap::Args;
use pkgscope_core::PkgscopeConfig;
use pkgscope_core::linker::HoistedNode;
use std::collections::BTreeMap;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Package to install, e.g. `react@^18`, `npm:alias@npm:pkg` or `jsr:@std/path`
    pub spec: String,

    /// Skip auto-installing missing peer dependencies
    #[arg(long = "no-peers")]
    pub no_peers: bool,

    /// Number of tarballs fetched at once
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Print the install result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: InstallArgs, config: &PkgscopeConfig) -> Result<()> {
    let mut config = config.clone();
    if args.no_peers {
        config.install_peers = false;
    }
    if let Some(concurrency) = args.concurrency.filter(|value| *value > 0) {
        config.concurrency = concurrency;
    }

    if !args.json {
        console::header("install");
    }

    let installation = super::install_with_progress(&args.spec, &config).await?;
    let result = &installation.result;

    if args.json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let own_size = result
        .tree
        .find(&result.name)
        .and_then(|node| node.unpacked_size)
        .map(|bytes| console::dim(&format!(" ({} on its own)", console::format_bytes(bytes))))
        .unwrap_or_default();
    console::info(&format!(
        "{}@{}{}",
        console::green(&result.name),
        result.version,
        own_size
    ));
    print_tree(&result.tree.root, 0);

    if installation.fs.is_empty() {
        console::warn("no files were extracted");
    }

    console::summary(
        result.package_count,
        result.install_size,
        console::elapsed_seconds(),
    );
    Ok(())
}

fn print_tree(nodes: &BTreeMap<String, HoistedNode>, depth: usize) {
    for (slot, node) in nodes {
        let label = if slot == &node.name {
            slot.clone()
        } else {
            format!("{slot} -> {}", node.name)
        };
        let size = node
            .unpacked_size
            .map(|bytes| console::dim(&format!(" ({})", console::format_bytes(bytes))))
            .unwrap_or_default();

        println!("{}{} {}{}", "  ".repeat(depth + 1), label, node.version, size);
        print_tree(&node.nested, depth + 1);
    }
}
