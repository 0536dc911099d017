use super::{HoistedNode, HoistedResult, NodePath};
use crate::resolve::{ResolutionResult, ResolvedPackage};
use std::collections::{BTreeMap, HashSet};
use tracing::trace;

/// Lays out `result` the way npm would: explicit roots first, then each
/// dependency as high as possible, nesting under its dependent on conflict.
pub fn hoist(result: &ResolutionResult) -> HoistedResult {
    let mut hoister = Hoister {
        result,
        tree: HoistedResult::default(),
        explicit: BTreeMap::new(),
        visited: HashSet::new(),
    };

    for package in result.roots() {
        hoister
            .tree
            .root
            .insert(package.name.clone(), HoistedNode::from_resolved(package));
        hoister
            .explicit
            .insert(package.name.clone(), package.version.clone());
    }

    for package in result.roots() {
        hoister.place_dependencies(package, vec![package.name.clone()]);
    }

    hoister.tree
}

struct Hoister<'a> {
    result: &'a ResolutionResult,
    tree: HoistedResult,
    explicit: BTreeMap<String, String>,
    visited: HashSet<String>,
}

impl Hoister<'_> {
    fn place_dependencies(&mut self, package: &ResolvedPackage, parent: NodePath) {
        for (slot, key) in &package.dependencies {
            let Some(dep) = self.result.get(key) else {
                continue;
            };

            if !self.visited.insert(format!("{}@{}", dep.name, dep.version)) {
                continue;
            }

            let reserved_conflict = self
                .explicit
                .get(slot)
                .is_some_and(|version| *version != dep.version || *slot != dep.name);

            let placed_at = if reserved_conflict {
                self.nest(&parent, slot, dep)
            } else {
                match self.tree.root.get(slot) {
                    None => {
                        self.tree
                            .root
                            .insert(slot.clone(), HoistedNode::from_resolved(dep));
                        vec![slot.clone()]
                    }
                    Some(existing) if existing.is_same_package(dep) => vec![slot.clone()],
                    Some(_) => self.nest(&parent, slot, dep),
                }
            };

            self.place_dependencies(dep, placed_at);
        }
    }

    fn nest(&mut self, parent: &[String], slot: &str, dep: &ResolvedPackage) -> NodePath {
        trace!(parent = %parent.join(" > "), %slot, version = %dep.version, "nesting on conflict");

        if let Some(node) = self.tree.node_mut(parent) {
            node.nested
                .entry(slot.to_string())
                .or_insert_with(|| HoistedNode::from_resolved(dep));
        }

        let mut path = parent.to_vec();
        path.push(slot.to_string());
        path
    }
}
