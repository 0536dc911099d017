pub mod hoist;

pub use hoist::hoist;

use crate::resolve::ResolvedPackage;
use serde::Serialize;
use std::collections::BTreeMap;

pub const NODE_MODULES: &str = "/node_modules";

/// One physical package directory in the virtual `node_modules` tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoistedNode {
    pub name: String,
    pub version: String,
    pub tarball: String,
    pub integrity: Option<String>,
    pub unpacked_size: Option<u64>,
    pub dependency_count: usize,
    pub nested: BTreeMap<String, HoistedNode>,
}

impl HoistedNode {
    pub fn from_resolved(package: &ResolvedPackage) -> Self {
        HoistedNode {
            name: package.name.clone(),
            version: package.version.clone(),
            tarball: package.tarball.clone(),
            integrity: package.integrity.clone(),
            unpacked_size: package.unpacked_size,
            dependency_count: package.dependencies.len(),
            nested: BTreeMap::new(),
        }
    }

    pub fn is_same_package(&self, package: &ResolvedPackage) -> bool {
        self.name == package.name && self.version == package.version
    }
}

/// Slot names from the root map down to one node.
pub type NodePath = Vec<String>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HoistedResult {
    pub root: BTreeMap<String, HoistedNode>,
}

impl HoistedResult {
    pub fn node(&self, path: &[String]) -> Option<&HoistedNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.get(first)?;
        for slot in rest {
            node = node.nested.get(slot)?;
        }
        Some(node)
    }

    pub fn node_mut(&mut self, path: &[String]) -> Option<&mut HoistedNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.get_mut(first)?;
        for slot in rest {
            node = node.nested.get_mut(slot)?;
        }
        Some(node)
    }

    /// Every node with its path, parents before children.
    pub fn paths(&self) -> Vec<NodePath> {
        let mut out = Vec::new();
        for (slot, node) in &self.root {
            collect_paths(vec![slot.clone()], node, &mut out);
        }
        out
    }

    /// Every node with its install directory, parents before children.
    pub fn packages(&self) -> Vec<(String, &HoistedNode)> {
        self.paths()
            .into_iter()
            .filter_map(|path| Some((install_dir(&path), self.node(&path)?)))
            .collect()
    }

    /// The root-level node installed under `name`.
    pub fn find(&self, name: &str) -> Option<&HoistedNode> {
        self.root.get(name)
    }

    pub fn count(&self) -> usize {
        self.paths().len()
    }

    pub fn total_size(&self) -> u64 {
        self.packages()
            .iter()
            .filter_map(|(_, node)| node.unpacked_size)
            .sum()
    }
}

fn collect_paths(path: NodePath, node: &HoistedNode, out: &mut Vec<NodePath>) {
    out.push(path.clone());
    for (slot, child) in &node.nested {
        let mut child_path = path.clone();
        child_path.push(slot.clone());
        collect_paths(child_path, child, out);
    }
}

/// `/node_modules/a/node_modules/b` for `["a", "b"]`.
pub fn install_dir(path: &[String]) -> String {
    let mut dir = String::new();
    for slot in path {
        dir.push_str(NODE_MODULES);
        dir.push('/');
        dir.push_str(slot);
    }
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_dirs_nest_node_modules() {
        assert_eq!(install_dir(&["react".to_string()]), "/node_modules/react");
        assert_eq!(
            install_dir(&["@scope/a".to_string(), "b".to_string()]),
            "/node_modules/@scope/a/node_modules/b"
        );
    }

    fn node(name: &str, version: &str, size: Option<u64>) -> HoistedNode {
        HoistedNode {
            name: name.to_string(),
            version: version.to_string(),
            tarball: format!("https://registry.test/{name}/-/{name}-{version}.tgz"),
            integrity: None,
            unpacked_size: size,
            dependency_count: 0,
            nested: BTreeMap::new(),
        }
    }

    #[test]
    fn lists_packages_with_install_dirs() {
        let mut a = node("a", "1.0.0", Some(10));
        a.nested.insert("b".to_string(), node("b", "2.0.0", None));
        let mut tree = HoistedResult::default();
        tree.root.insert("a".to_string(), a);
        tree.root.insert("b".to_string(), node("b", "1.0.0", Some(5)));

        let dirs: Vec<_> = tree
            .packages()
            .into_iter()
            .map(|(dir, node)| (dir, node.version.clone()))
            .collect();
        assert_eq!(
            dirs,
            vec![
                ("/node_modules/a".to_string(), "1.0.0".to_string()),
                ("/node_modules/a/node_modules/b".to_string(), "2.0.0".to_string()),
                ("/node_modules/b".to_string(), "1.0.0".to_string()),
            ]
        );
        assert_eq!(tree.count(), 3);
        assert_eq!(tree.total_size(), 15);
        assert_eq!(tree.find("b").map(|node| node.version.as_str()), Some("1.0.0"));
        assert!(tree.find("c").is_none());
    }
}
