//! Fixtures shared by unit tests.

use crate::config::PkgscopeConfig;
use crate::registry::{Dist, Manifest, Packument, PeerDependencyMeta, RegistryKind};
use crate::session::Session;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;

pub struct PackumentBuilder {
    registry: RegistryKind,
    packument: Packument,
    latest: Option<String>,
    tarball_base: String,
}

impl PackumentBuilder {
    pub fn new(name: &str) -> Self {
        PackumentBuilder {
            registry: RegistryKind::Npm,
            packument: Packument {
                name: name.to_string(),
                dist_tags: BTreeMap::new(),
                versions: BTreeMap::new(),
            },
            latest: None,
            tarball_base: "https://registry.test".to_string(),
        }
    }

    pub fn registry(mut self, registry: RegistryKind) -> Self {
        self.registry = registry;
        self
    }

    pub fn tarball_base(mut self, base: &str) -> Self {
        self.tarball_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn version(mut self, version: &str, deps: &[(&str, &str)]) -> Self {
        let name = self.packument.name.clone();
        let file = name.rsplit('/').next().unwrap_or(&name).to_string();
        self.packument.versions.insert(
            version.to_string(),
            Manifest {
                name: name.clone(),
                version: version.to_string(),
                dependencies: deps
                    .iter()
                    .map(|(dep, range)| (dep.to_string(), range.to_string()))
                    .collect(),
                peer_dependencies: BTreeMap::new(),
                peer_dependencies_meta: BTreeMap::new(),
                dist: Dist {
                    tarball: format!("{}/{name}/-/{file}-{version}.tgz", self.tarball_base),
                    integrity: None,
                    unpacked_size: None,
                },
                deprecated: None,
            },
        );
        self
    }

    pub fn peer(mut self, version: &str, name: &str, range: &str) -> Self {
        if let Some(meta) = self.packument.versions.get_mut(version) {
            meta.peer_dependencies
                .insert(name.to_string(), range.to_string());
        }
        self
    }

    pub fn optional_peer(mut self, version: &str, name: &str, range: &str) -> Self {
        if let Some(meta) = self.packument.versions.get_mut(version) {
            meta.peer_dependencies
                .insert(name.to_string(), range.to_string());
            meta.peer_dependencies_meta
                .insert(name.to_string(), PeerDependencyMeta { optional: true });
        }
        self
    }

    pub fn unpacked_size(mut self, version: &str, size: u64) -> Self {
        if let Some(meta) = self.packument.versions.get_mut(version) {
            meta.dist.unpacked_size = Some(size);
        }
        self
    }

    pub fn latest(mut self, version: &str) -> Self {
        self.latest = Some(version.to_string());
        self
    }

    pub fn build(mut self) -> (RegistryKind, Packument) {
        let latest = self
            .latest
            .or_else(|| self.packument.versions.keys().last().cloned());
        if let Some(latest) = latest {
            self.packument.dist_tags.insert("latest".to_string(), latest);
        }
        (self.registry, self.packument)
    }
}

/// A session whose packument cache is pre-seeded, so resolution never
/// touches the network.
pub fn session_with(packages: Vec<PackumentBuilder>) -> Session {
    session_with_config(PkgscopeConfig::default(), packages)
}

pub fn session_with_config(config: PkgscopeConfig, packages: Vec<PackumentBuilder>) -> Session {
    let session = Session::new(config);
    for builder in packages {
        let (registry, packument) = builder.build();
        let name = packument.name.clone();
        session.packuments.insert(registry, &name, packument);
    }
    session
}

/// Builds a `.tgz` the way npm packs it: every entry under `package/`.
pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("package/{path}"), contents.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}
