use crate::config::PkgscopeConfig;
use crate::exports::{Subpath, default_subpath, read_package_json, resolve_subpaths};
use crate::linker::{self, HoistedResult, install_dir};
use crate::progress::ProgressSink;
use crate::resolve::{self, ResolveOptions};
use crate::session::Session;
use crate::specifier::PackageSpecifier;
use crate::store::{self, FetchOptions};
use crate::vfs::VirtualFs;
use crate::{PkgscopeError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Clone, Debug, Default)]
pub struct InstallOptions {
    pub resolve: ResolveOptions,
    pub fetch: FetchOptions,
}

impl InstallOptions {
    pub fn from_config(config: &PkgscopeConfig) -> Self {
        InstallOptions {
            resolve: ResolveOptions {
                install_peers: config.install_peers,
            },
            fetch: FetchOptions {
                concurrency: config.concurrency,
                ..FetchOptions::default()
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResult {
    pub name: String,
    pub version: String,
    pub subpaths: Vec<Subpath>,
    pub default_subpath: Option<String>,
    pub package_count: usize,
    pub install_size: u64,
    pub tree: HoistedResult,
}

/// A package installed into memory: its summary and the filesystem holding
/// its `node_modules` tree.
#[derive(Clone, Debug)]
pub struct Installation {
    pub result: InitResult,
    pub fs: Arc<VirtualFs>,
}

/// Resolves, hoists and fetches `spec`, then lists the subpaths the root
/// package exports.
pub async fn install(
    session: &Session,
    spec: &PackageSpecifier,
    options: &InstallOptions,
    progress: &ProgressSink,
) -> Result<Installation> {
    let started = Instant::now();
    debug!("install start: {spec}");

    let resolution = resolve::resolve(session, std::slice::from_ref(spec), &options.resolve, progress).await?;
    let root = resolution.roots().next().ok_or_else(|| PkgscopeError::NoMatchingVersion {
        name: spec.name.clone(),
        range: spec.range.clone(),
    })?;
    let (name, version) = (root.name.clone(), root.version.clone());
    debug!(
        "resolved {}@{} with {} packages in {:.2?}",
        name,
        version,
        resolution.len(),
        started.elapsed()
    );

    let mut tree = linker::hoist(&resolution);

    let fs = VirtualFs::new();
    let summary = store::fetch_tarballs(session, &mut tree, &fs, &options.fetch, progress).await?;

    let package_dir = install_dir(std::slice::from_ref(&name));
    let subpaths = read_package_json(&fs, &package_dir)
        .map(|package_json| resolve_subpaths(&package_json, &fs, &package_dir))
        .unwrap_or_default();
    let default = default_subpath(&subpaths).map(|entry| entry.subpath.clone());

    let result = InitResult {
        package_count: tree.count(),
        install_size: tree.total_size(),
        name,
        version,
        subpaths,
        default_subpath: default,
        tree,
    };

    info!(
        "installed {}@{}: {} packages, {} files in {:.2?}",
        result.name,
        result.version,
        result.package_count,
        summary.files,
        started.elapsed()
    );

    Ok(Installation {
        result,
        fs: Arc::new(fs),
    })
}
