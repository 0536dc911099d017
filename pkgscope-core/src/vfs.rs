use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

/// In-memory filesystem keyed by absolute, `/`-separated paths. Directories
/// are implied by the files below them.
#[derive(Debug, Default)]
pub struct VirtualFs {
    files: RwLock<BTreeMap<String, Arc<[u8]>>>,
}

impl VirtualFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, path: &str, contents: impl Into<Arc<[u8]>>) {
        let path = normalize(path);
        let mut files = self.files.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        files.insert(path, contents.into());
    }

    pub fn read(&self, path: &str) -> Option<Arc<[u8]>> {
        let files = self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        files.get(&normalize(path)).cloned()
    }

    pub fn read_to_string(&self, path: &str) -> Option<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes.to_vec()).ok()
    }

    pub fn is_file(&self, path: &str) -> bool {
        let files = self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        files.contains_key(&normalize(path))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let prefix = dir_prefix(path);
        let files = self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }

    /// Every file below `dir`, recursively, as absolute paths.
    pub fn walk(&self, dir: &str) -> Vec<String> {
        let prefix = dir_prefix(dir);
        let files = self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        files
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Immediate entry names (files and directories) of `dir`.
    pub fn read_dir(&self, dir: &str) -> Vec<String> {
        let prefix = dir_prefix(dir);
        let entries: BTreeSet<String> = self
            .walk(dir)
            .iter()
            .filter_map(|path| path[prefix.len()..].split('/').next().map(str::to_string))
            .collect();
        entries.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        let files = self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> u64 {
        let files = self.files.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        files.values().map(|contents| contents.len() as u64).sum()
    }
}

/// Collapses `.`, `..` and repeated separators; the result always starts with `/`.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

pub fn join(base: &str, relative: &str) -> String {
    if relative.starts_with('/') {
        normalize(relative)
    } else {
        normalize(&format!("{base}/{relative}"))
    }
}

pub fn parent(path: &str) -> String {
    let normalized = normalize(path);
    match normalized.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => normalized[..idx].to_string(),
    }
}

fn dir_prefix(dir: &str) -> String {
    let normalized = normalize(dir);
    if normalized == "/" {
        normalized
    } else {
        format!("{normalized}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VirtualFs {
        let fs = VirtualFs::new();
        fs.write("/node_modules/a/package.json", b"{}".to_vec());
        fs.write("/node_modules/a/lib/index.js", b"export {}".to_vec());
        fs.write("/node_modules/a/lib/util/x.js", b"".to_vec());
        fs.write("/node_modules/ab/index.js", b"".to_vec());
        fs
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize("/a/./b//c/../d"), "/a/b/d");
        assert_eq!(join("/node_modules/a", "./lib/index.js"), "/node_modules/a/lib/index.js");
        assert_eq!(parent("/node_modules/a/index.js"), "/node_modules/a");
        assert_eq!(parent("/index.js"), "/");
    }

    #[test]
    fn directories_are_implied() {
        let fs = sample();
        assert!(fs.is_dir("/node_modules/a/lib"));
        assert!(!fs.is_dir("/node_modules/a/lib/index.js"));
        assert!(fs.is_file("/node_modules/a/lib/index.js"));
    }

    #[test]
    fn walks_without_leaking_sibling_prefixes() {
        let fs = sample();
        assert_eq!(fs.walk("/node_modules/a").len(), 3);
        assert_eq!(fs.read_dir("/node_modules/a"), vec!["lib", "package.json"]);
        assert_eq!(fs.read_dir("/node_modules"), vec!["a", "ab"]);
    }
}
