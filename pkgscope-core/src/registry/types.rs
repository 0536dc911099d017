use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Packument {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub versions: BTreeMap<String, Manifest>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PeerDependencyMeta {
    #[serde(default)]
    pub optional: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "peerDependenciesMeta")]
    pub peer_dependencies_meta: BTreeMap<String, PeerDependencyMeta>,
    pub dist: Dist,
    #[serde(default)]
    pub deprecated: Option<serde_json::Value>,
}

impl Manifest {
    /// npm marks deprecation with a message string; some mirrors send `true`.
    pub fn is_deprecated(&self) -> bool {
        match &self.deprecated {
            Some(serde_json::Value::String(message)) => !message.is_empty(),
            Some(serde_json::Value::Bool(flag)) => *flag,
            _ => false,
        }
    }

    /// Peers that must be installed: not marked optional in `peerDependenciesMeta`.
    pub fn required_peers(&self) -> impl Iterator<Item = (&String, &String)> {
        self.peer_dependencies.iter().filter(|(name, _)| {
            !self
                .peer_dependencies_meta
                .get(*name)
                .map(|meta| meta.optional)
                .unwrap_or(false)
        })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Dist {
    pub tarball: String,
    #[serde(default)]
    pub integrity: Option<String>,
    #[serde(default, rename = "unpackedSize")]
    pub unpacked_size: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    #[default]
    Npm,
    Jsr,
}

impl RegistryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Npm => "npm",
            RegistryKind::Jsr => "jsr",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
