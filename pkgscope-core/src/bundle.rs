pub mod compress;
pub mod concat;
pub mod engine;
pub mod entry;

pub use compress::{ChunkSizes, CompressionSupport};
pub use concat::ConcatEngine;
pub use engine::{BundleEngine, BundlePlugin, EngineChunk, EngineInput, EntryPlugin};
pub use entry::{ENTRY_ID, EntryModule, synthesize_entry};

use crate::exports::{read_package_json, resolve_export, resolve_file};
use crate::linker::install_dir;
use crate::progress::{Progress, ProgressSink};
use crate::vfs::{VirtualFs, join};
use crate::{PkgscopeError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleOptions {
    /// Module ids left out of the bundle, including their deep imports.
    pub external: Vec<String>,
    pub minify: bool,
}

impl Default for BundleOptions {
    fn default() -> Self {
        BundleOptions {
            external: Vec::new(),
            minify: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleChunk {
    pub file_name: String,
    pub code: String,
    pub is_entry: bool,
    pub exports: Vec<String>,
    pub sizes: ChunkSizes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleResult {
    pub chunks: Vec<BundleChunk>,
    pub total: ChunkSizes,
    pub exports: Vec<String>,
    pub is_cjs: bool,
    /// Source of the synthetic entry handed to the engine.
    pub entry_module: String,
}

/// The file a subpath of an installed root package points at.
pub fn resolve_subpath_target(fs: &VirtualFs, package: &str, subpath: &str) -> Result<String> {
    let package_dir = install_dir(&[package.to_string()]);
    let package_json = read_package_json(fs, &package_dir)
        .ok_or_else(|| PkgscopeError::bundle(format!("{package} is not installed")))?;

    let target = resolve_export(&package_json, fs, &package_dir, subpath)
        .ok_or_else(|| PkgscopeError::bundle(format!("{package} does not export {subpath:?}")))?;

    if target.ends_with(".json") {
        return Ok(join(&package_dir, &target));
    }

    resolve_file(fs, &join(&package_dir, &target))
        .ok_or_else(|| PkgscopeError::bundle(format!("{package}: {target} does not exist")))
}

/// Bundles `selection` from `package`'s `subpath` and measures every chunk.
/// `None` selects every export.
#[allow(clippy::too_many_arguments)]
pub fn bundle_subpath<E: BundleEngine + ?Sized>(
    engine: &E,
    fs: Arc<VirtualFs>,
    compression: &CompressionSupport,
    package: &str,
    subpath: &str,
    selection: Option<&[String]>,
    options: &BundleOptions,
    progress: &ProgressSink,
) -> Result<BundleResult> {
    let started = Instant::now();
    let target_path = resolve_subpath_target(&fs, package, subpath)?;
    let entry = synthesize_entry(package, subpath, &target_path, &fs, selection)?;

    progress.emit(Progress::Bundle {
        subpath: subpath.to_string(),
    });

    let output = engine.bundle(EngineInput {
        fs,
        input: ENTRY_ID.to_string(),
        plugin: Arc::new(EntryPlugin::new(entry.code.clone())),
        external: options.external.clone(),
        minify: options.minify,
    })?;

    let mut chunks = Vec::with_capacity(output.len());
    for chunk in output {
        progress.emit(Progress::Compress {
            chunk: chunk.file_name.clone(),
        });

        let sizes = compression.measure(&chunk.code).map_err(|err| {
            PkgscopeError::bundle(format!("failed to compress {}: {err}", chunk.file_name))
        })?;

        chunks.push(BundleChunk {
            exports: if chunk.is_entry {
                entry.exports.clone()
            } else {
                Vec::new()
            },
            file_name: chunk.file_name,
            code: chunk.code,
            is_entry: chunk.is_entry,
            sizes,
        });
    }

    let total = ChunkSizes::total(chunks.iter().map(|chunk| &chunk.sizes));

    debug!(
        "bundled {}{} in {:.2?} ({} bytes raw, {} gzip)",
        package,
        subpath.trim_start_matches('.'),
        started.elapsed(),
        total.raw,
        total.gzip
    );

    Ok(BundleResult {
        chunks,
        total,
        exports: entry.exports,
        is_cjs: entry.is_cjs,
        entry_module: entry.code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    fn installed() -> Arc<VirtualFs> {
        let fs = VirtualFs::new();
        let files: &[(&str, &str)] = &[
            (
                "/node_modules/lib/package.json",
                r#"{ "name": "lib", "exports": { ".": "./index.js", "./legacy": "./legacy.js", "./pkg": "./package.json" } }"#,
            ),
            ("/node_modules/lib/index.js", "export const a = 1;\nexport const b = 2;\nexport default a + b;"),
            ("/node_modules/lib/legacy.js", "exports.c = 3;"),
        ];
        for (path, contents) in files {
            fs.write(path, contents.as_bytes().to_vec());
        }
        Arc::new(fs)
    }

    #[test]
    fn bundles_selected_exports_and_measures_chunks() {
        let fs = installed();
        let files = fs.len();
        let (sender, mut receiver) = broadcast::channel(16);

        let result = bundle_subpath(
            &ConcatEngine,
            fs.clone(),
            &CompressionSupport::new(),
            "lib",
            ".",
            Some(&["a".to_string()]),
            &BundleOptions::default(),
            &ProgressSink::new(sender),
        )
        .unwrap();

        assert_eq!(result.exports, vec!["a"]);
        assert!(!result.is_cjs);
        assert_eq!(result.chunks.len(), 1);
        let chunk = &result.chunks[0];
        assert!(chunk.is_entry);
        assert_eq!(chunk.exports, vec!["a"]);
        assert_eq!(chunk.sizes.raw, chunk.code.len() as u64);
        assert_eq!(result.total, chunk.sizes);
        assert_eq!(fs.len(), files);

        assert_eq!(
            receiver.try_recv().unwrap(),
            Progress::Bundle {
                subpath: ".".to_string()
            }
        );
        assert_eq!(
            receiver.try_recv().unwrap(),
            Progress::Compress {
                chunk: "index.js".to_string()
            }
        );
    }

    #[test]
    fn cjs_subpaths_report_default_only() {
        let result = bundle_subpath(
            &ConcatEngine,
            installed(),
            &CompressionSupport::new(),
            "lib",
            "./legacy",
            None,
            &BundleOptions::default(),
            &ProgressSink::silent(),
        )
        .unwrap();

        assert!(result.is_cjs);
        assert_eq!(result.exports, vec!["default"]);
    }

    #[test]
    fn unknown_subpaths_and_packages_fail() {
        let fs = installed();
        let missing_subpath = resolve_subpath_target(&fs, "lib", "./nope").unwrap_err();
        assert!(matches!(missing_subpath, PkgscopeError::Bundle { .. }));

        let missing_package = resolve_subpath_target(&fs, "other", ".").unwrap_err();
        assert!(missing_package.to_string().contains("other is not installed"));
    }

    #[test]
    fn engine_failures_surface_as_bundle_errors() {
        struct Failing;
        impl BundleEngine for Failing {
            fn bundle(&self, _input: EngineInput) -> Result<Vec<EngineChunk>> {
                Err(PkgscopeError::bundle("engine exploded"))
            }
        }

        let err = bundle_subpath(
            &Failing,
            installed(),
            &CompressionSupport::new(),
            "lib",
            ".",
            None,
            &BundleOptions::default(),
            &ProgressSink::silent(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("engine exploded"));
    }
}
