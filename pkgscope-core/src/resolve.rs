pub mod peers;
pub mod types;

pub use types::*;

use crate::progress::{Progress, ProgressSink};
use crate::protocols::jsr;
use crate::registry::{self, RegistryKind};
use crate::session::Session;
use crate::specifier::{PackageSpecifier, parse_specifier};
use crate::version::pick_version;
use crate::Result;
use async_recursion::async_recursion;
use futures::future::try_join_all;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tracing::{debug, trace};

#[derive(Clone, Debug)]
pub struct ResolveOptions {
    pub install_peers: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            install_peers: true,
        }
    }
}

#[derive(Default)]
struct ResolveState {
    packages: BTreeMap<PackageKey, ResolvedPackage>,
    resolving: BTreeSet<PackageKey>,
}

struct ResolveContext<'a> {
    session: &'a Session,
    options: &'a ResolveOptions,
    progress: &'a ProgressSink,
    state: Mutex<ResolveState>,
}

impl ResolveContext<'_> {
    fn with_state<T>(&self, f: impl FnOnce(&mut ResolveState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

enum Visit {
    Done,
    InFlight,
    Start,
}

/// Builds the deduplicated dependency graph for `specs`. Siblings resolve
/// concurrently; the first failure aborts the whole resolution.
pub async fn resolve(
    session: &Session,
    specs: &[PackageSpecifier],
    options: &ResolveOptions,
    progress: &ProgressSink,
) -> Result<ResolutionResult> {
    let ctx = ResolveContext {
        session,
        options,
        progress,
        state: Mutex::new(ResolveState::default()),
    };

    let roots = try_join_all(
        specs
            .iter()
            .map(|spec| resolve_package(&ctx, &spec.name, &spec.range, spec.registry)),
    )
    .await?;

    let state = ctx
        .state
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    debug!(
        roots = roots.len(),
        packages = state.packages.len(),
        "resolution complete"
    );

    Ok(ResolutionResult {
        roots,
        packages: state.packages,
    })
}

#[async_recursion]
async fn resolve_package<'a>(
    ctx: &'a ResolveContext<'a>,
    name: &'a str,
    range: &'a str,
    registry: RegistryKind,
) -> Result<PackageKey> {
    let packument = registry::fetch_packument(ctx.session, name, registry).await?;
    let manifest = pick_version(name, range, &packument)?;
    let key = PackageKey::new(registry, name, &manifest.version);

    let visit = ctx.with_state(|state| {
        if state.packages.contains_key(&key) {
            Visit::Done
        } else if !state.resolving.insert(key.clone()) {
            Visit::InFlight
        } else {
            Visit::Start
        }
    });

    match visit {
        Visit::Done => return Ok(key),
        Visit::InFlight => {
            // The frame that owns `key` fills in its dependencies; the edge
            // stays valid because nodes are addressed by key.
            trace!(%key, "dependency already in flight");
            return Ok(key);
        }
        Visit::Start => {}
    }

    let mut edges: Vec<(String, DependencyEdge)> = manifest
        .dependencies
        .iter()
        .map(|(import, range)| (import.clone(), dependency_edge(import, range, registry)))
        .collect();

    if ctx.options.install_peers {
        for (peer, range) in peers::injected_peers(manifest) {
            let edge = dependency_edge(&peer, &range, registry);
            edges.push((peer, edge));
        }
    }

    let resolved = try_join_all(edges.iter().map(|(import, edge)| async move {
        let child = resolve_package(ctx, &edge.name, &edge.range, edge.registry).await?;
        Ok::<_, crate::PkgscopeError>((import.clone(), child))
    }))
    .await?;

    let dependencies: IndexMap<String, PackageKey> = resolved.into_iter().collect();

    let node = ResolvedPackage {
        key: key.clone(),
        name: name.to_string(),
        version: manifest.version.clone(),
        registry,
        tarball: manifest.dist.tarball.clone(),
        integrity: manifest.dist.integrity.clone(),
        unpacked_size: manifest.dist.unpacked_size,
        dependencies,
    };

    ctx.with_state(|state| {
        state.resolving.remove(&key);
        state.packages.insert(key.clone(), node);
    });

    ctx.progress.emit(Progress::Resolve {
        name: name.to_string(),
        version: manifest.version.clone(),
    });

    Ok(key)
}

#[derive(Debug, PartialEq, Eq)]
struct DependencyEdge {
    name: String,
    range: String,
    registry: RegistryKind,
}

/// Works out what a `dependencies` entry actually points at: `npm:`/`jsr:`
/// aliases, and JSR mirror names inside JSR packages.
fn dependency_edge(import: &str, range: &str, parent: RegistryKind) -> DependencyEdge {
    if (range.starts_with("npm:") || range.starts_with("jsr:"))
        && let Ok(spec) = parse_specifier(range)
    {
        return DependencyEdge {
            name: spec.name,
            range: spec.range,
            registry: spec.registry,
        };
    }

    if parent == RegistryKind::Jsr
        && let Some(canonical) = jsr::from_mirror_name(import)
    {
        return DependencyEdge {
            name: canonical,
            range: range.to_string(),
            registry: RegistryKind::Jsr,
        };
    }

    DependencyEdge {
        name: import.to_string(),
        range: range.to_string(),
        registry: RegistryKind::Npm,
    }
}
