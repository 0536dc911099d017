use crate::registry::RegistryKind;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// `registry:name@version`. Doubles as the node id in the resolution arena.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageKey(String);

impl PackageKey {
    pub fn new(registry: RegistryKind, name: &str, version: &str) -> Self {
        PackageKey(format!("{registry}:{name}@{version}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPackage {
    pub key: PackageKey,
    pub name: String,
    pub version: String,
    pub registry: RegistryKind,
    pub tarball: String,
    pub integrity: Option<String>,
    pub unpacked_size: Option<u64>,
    /// Import name to node. Regular dependencies first, then injected peers.
    pub dependencies: IndexMap<String, PackageKey>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ResolutionResult {
    pub roots: Vec<PackageKey>,
    pub packages: BTreeMap<PackageKey, ResolvedPackage>,
}

impl ResolutionResult {
    pub fn get(&self, key: &PackageKey) -> Option<&ResolvedPackage> {
        self.packages.get(key)
    }

    pub fn roots(&self) -> impl Iterator<Item = &ResolvedPackage> {
        self.roots.iter().filter_map(|key| self.packages.get(key))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
