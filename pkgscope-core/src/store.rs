use crate::linker::{HoistedResult, NodePath, install_dir};
use crate::progress::{Progress, ProgressSink};
use crate::session::Session;
use crate::vfs::{VirtualFs, join};
use crate::{PkgscopeError, Result};
use flate2::read::GzDecoder;
use futures::future::try_join_all;
use glob::{MatchOptions, Pattern};
use reqwest::Client;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, trace, warn};

pub const DEFAULT_EXCLUDES: &[&str] = &[
    // docs
    "**/*.md",
    "**/*.markdown",
    "**/docs/**",
    // license and package meta
    "**/LICENSE*",
    "**/LICENCE*",
    "**/CHANGELOG*",
    "**/AUTHORS*",
    "**/.npmignore",
    "**/.editorconfig",
    // tests
    "**/test/**",
    "**/tests/**",
    "**/__tests__/**",
    "**/*.test.*",
    "**/*.spec.*",
    // lint and build config
    "**/.eslintrc*",
    "**/.prettierrc*",
    "**/.babelrc*",
    "**/tsconfig*.json",
    "**/.github/**",
    "**/.travis.yml",
    // source maps and type declarations
    "**/*.map",
    "**/*.d.ts",
    "**/*.d.mts",
    "**/*.d.cts",
];

#[derive(Clone, Debug)]
pub struct FetchOptions {
    pub concurrency: usize,
    pub exclude: Vec<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            concurrency: crate::config::DEFAULT_CONCURRENCY,
            exclude: DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub packages: usize,
    pub files: usize,
    pub bytes_total: u64,
}

struct WorkItem {
    path: NodePath,
    dir: String,
    name: String,
    version: String,
    tarball: String,
}

#[derive(Debug, Default)]
struct Extracted {
    files: usize,
    bytes_total: u64,
}

/// Downloads and unpacks every package of `tree` into `fs` using a fixed
/// pool of `options.concurrency` workers. The first failure aborts the stage.
pub async fn fetch_tarballs(
    session: &Session,
    tree: &mut HoistedResult,
    fs: &VirtualFs,
    options: &FetchOptions,
    progress: &ProgressSink,
) -> Result<FetchSummary> {
    let items: Vec<WorkItem> = tree
        .paths()
        .into_iter()
        .filter_map(|path| {
            let node = tree.node(&path)?;
            Some(WorkItem {
                dir: install_dir(&path),
                name: node.name.clone(),
                version: node.version.clone(),
                tarball: node.tarball.clone(),
                path,
            })
        })
        .collect();

    let excludes = ExcludeSet::new(&options.exclude);
    let total = items.len();
    let next = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let pool = options.concurrency.max(1).min(total.max(1));
    let started = Instant::now();

    debug!(packages = total, pool, "fetching tarballs");

    let workers = (0..pool).map(|_| async {
        let mut done = Vec::new();
        loop {
            let index = next.fetch_add(1, Ordering::Relaxed);
            let Some(item) = items.get(index) else {
                break;
            };

            let extracted = fetch_package(&session.client, item, fs, &excludes).await?;
            let current = completed.fetch_add(1, Ordering::Relaxed) + 1;
            progress.emit(Progress::Fetch {
                completed: current,
                total,
                name: item.name.clone(),
            });
            done.push((index, extracted));
        }
        Ok::<_, PkgscopeError>(done)
    });

    let results = try_join_all(workers).await?;

    let mut summary = FetchSummary {
        packages: total,
        ..FetchSummary::default()
    };

    for (index, extracted) in results.into_iter().flatten() {
        summary.files += extracted.files;
        summary.bytes_total += extracted.bytes_total;

        if let Some(node) = tree.node_mut(&items[index].path)
            && node.unpacked_size.is_none()
        {
            node.unpacked_size = Some(extracted.bytes_total);
        }
    }

    debug!(
        packages = summary.packages,
        files = summary.files,
        bytes = summary.bytes_total,
        elapsed = started.elapsed().as_secs_f64(),
        "tarballs extracted"
    );

    Ok(summary)
}

async fn fetch_package(
    client: &Client,
    item: &WorkItem,
    fs: &VirtualFs,
    excludes: &ExcludeSet,
) -> Result<Extracted> {
    let download_started = Instant::now();
    let bytes = download_tarball(client, &item.tarball).await?;
    debug!(
        name = %item.name,
        version = %item.version,
        bytes = bytes.len(),
        elapsed = download_started.elapsed().as_secs_f64(),
        "downloaded tarball"
    );

    unpack_tarball(&item.name, &bytes, &item.dir, fs, excludes)
}

async fn download_tarball(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| PkgscopeError::fetch(url, source))?;

    let bytes = response
        .error_for_status()
        .map_err(|source| PkgscopeError::fetch(url, source))?
        .bytes()
        .await
        .map_err(|source| PkgscopeError::fetch(url, source))?;

    if bytes.is_empty() {
        return Err(PkgscopeError::fetch(url, "empty tarball"));
    }

    Ok(bytes.to_vec())
}

// Header sizes are untrusted until the bytes arrive.
const MAX_PREALLOC: u64 = 1 << 20;

/// Streams a gzipped tarball into `fs` under `dir`. Sizes count every file
/// entry, excluded or not.
fn unpack_tarball(
    name: &str,
    data: &[u8],
    dir: &str,
    fs: &VirtualFs,
    excludes: &ExcludeSet,
) -> Result<Extracted> {
    let archive_err = |source: std::io::Error| PkgscopeError::Archive {
        name: name.to_string(),
        source,
    };

    let mut archive = tar::Archive::new(GzDecoder::new(data));
    let mut extracted = Extracted::default();

    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        let kind = entry.header().entry_type();

        if kind.is_dir() || !kind.is_file() {
            continue;
        }

        let raw_path = entry.path().map_err(archive_err)?.to_string_lossy().replace('\\', "/");
        let Some(relative) = strip_package_dir(&raw_path) else {
            continue;
        };

        extracted.bytes_total += entry.size();

        if excludes.matches(relative) {
            trace!(%name, path = %relative, "excluded");
            continue;
        }

        let declared = entry.size();
        let mut contents = Vec::with_capacity(declared.min(MAX_PREALLOC) as usize);
        entry.read_to_end(&mut contents).map_err(archive_err)?;
        if contents.len() as u64 != declared {
            return Err(archive_err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("{relative} is truncated: read {} of {declared} bytes", contents.len()),
            )));
        }
        fs.write(&join(dir, relative), contents);
        extracted.files += 1;
    }

    Ok(extracted)
}

/// npm packs everything under `package/`; a few old tarballs use another
/// top-level directory, which is stripped the same way.
fn strip_package_dir(path: &str) -> Option<&str> {
    let path = path.trim_start_matches("./");
    let (_, rest) = path.split_once('/')?;
    (!rest.is_empty()).then_some(rest)
}

struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(err) => {
                    warn!(pattern = %raw, error = %err, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();
        ExcludeSet { patterns }
    }

    fn matches(&self, path: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(path, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PkgscopeConfig;
    use crate::linker::HoistedNode;
    use crate::testing::tarball;
    use httpmock::prelude::*;
    use std::collections::BTreeMap;
    use tokio::sync::broadcast;

    fn node(name: &str, tarball: String, unpacked_size: Option<u64>) -> HoistedNode {
        HoistedNode {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            tarball,
            integrity: None,
            unpacked_size,
            dependency_count: 0,
            nested: BTreeMap::new(),
        }
    }

    #[test]
    fn oversized_entry_headers_fail_as_archive_errors() {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(1 << 46);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, "package/index.js", std::io::empty())
            .unwrap();
        let data = builder.into_inner().unwrap().finish().unwrap();

        let fs = VirtualFs::new();
        let excludes = ExcludeSet::new(&[]);
        let err = unpack_tarball("huge", &data, "/node_modules/huge", &fs, &excludes).unwrap_err();

        assert!(matches!(err, PkgscopeError::Archive { .. }));
        assert!(fs.is_empty());
    }

    #[test]
    fn default_excludes_cover_docs_tests_and_types() {
        let set = ExcludeSet::new(&FetchOptions::default().exclude);
        for excluded in [
            "README.md",
            "docs/guide.html",
            "LICENSE",
            "license.txt",
            "test/index.js",
            "lib/__tests__/a.js",
            "index.d.ts",
            "dist/index.js.map",
            "tsconfig.json",
            ".eslintrc.json",
            "src/a.spec.js",
        ] {
            assert!(set.matches(excluded), "{excluded} should be excluded");
        }
        for kept in ["index.js", "package.json", "lib/util.js", "dist/esm/index.mjs", "testing.js"] {
            assert!(!set.matches(kept), "{kept} should be kept");
        }
    }

    #[test]
    fn strips_the_top_level_directory() {
        assert_eq!(strip_package_dir("package/lib/a.js"), Some("lib/a.js"));
        assert_eq!(strip_package_dir("./package/index.js"), Some("index.js"));
        assert_eq!(strip_package_dir("package/"), None);
        assert_eq!(strip_package_dir("stray.js"), None);
    }

    #[tokio::test]
    async fn extracts_root_and_nested_packages() {
        let server = MockServer::start_async().await;
        let parent = tarball(&[
            ("package.json", r#"{"name":"parent","version":"1.0.0"}"#),
            ("index.js", "module.exports = 1;"),
            ("README.md", "# parent docs"),
        ]);
        let child = tarball(&[
            ("package.json", r#"{"name":"child","version":"1.0.0"}"#),
            ("lib/index.js", "export default 2;"),
        ]);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/parent.tgz");
                then.status(200).body(parent.clone());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/child.tgz");
                then.status(200).body(child.clone());
            })
            .await;

        let mut parent_node = node("parent", server.url("/parent.tgz"), None);
        parent_node
            .nested
            .insert("child".to_string(), node("child", server.url("/child.tgz"), Some(999)));
        let mut tree = HoistedResult::default();
        tree.root.insert("parent".to_string(), parent_node);

        let session = Session::new(PkgscopeConfig::default());
        let fs = VirtualFs::new();
        let (sender, mut receiver) = broadcast::channel(16);

        let summary = fetch_tarballs(
            &session,
            &mut tree,
            &fs,
            &FetchOptions {
                concurrency: 2,
                ..FetchOptions::default()
            },
            &ProgressSink::new(sender),
        )
        .await
        .unwrap();

        assert_eq!(summary.packages, 2);
        assert!(fs.is_file("/node_modules/parent/index.js"));
        assert!(!fs.is_file("/node_modules/parent/README.md"));
        assert!(fs.is_file("/node_modules/parent/node_modules/child/lib/index.js"));

        let measured = r#"{"name":"parent","version":"1.0.0"}"#.len()
            + "module.exports = 1;".len()
            + "# parent docs".len();
        assert_eq!(tree.root["parent"].unpacked_size, Some(measured as u64));
        assert_eq!(tree.root["parent"].nested["child"].unpacked_size, Some(999));

        let mut completed = Vec::new();
        while let Ok(Progress::Fetch { completed: n, total, .. }) = receiver.try_recv() {
            assert_eq!(total, 2);
            completed.push(n);
        }
        assert_eq!(completed, vec![1, 2]);
    }

    #[tokio::test]
    async fn a_failed_download_aborts_the_stage() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.tgz");
                then.status(404);
            })
            .await;

        let mut tree = HoistedResult::default();
        tree.root
            .insert("gone".to_string(), node("gone", server.url("/gone.tgz"), None));

        let err = fetch_tarballs(
            &Session::new(PkgscopeConfig::default()),
            &mut tree,
            &VirtualFs::new(),
            &FetchOptions::default(),
            &ProgressSink::silent(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PkgscopeError::Fetch { .. }));
    }
}
