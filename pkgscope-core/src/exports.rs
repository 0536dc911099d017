use crate::vfs::{VirtualFs, join};
use serde::Serialize;
use serde_json::{Map, Value};

pub const RESOLVE_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs", ".json"];

/// Conditions considered when picking a target, lowest priority first.
/// `default`, `module`, `import` and `browser` rank in that order; `node`
/// and `require` are only used when none of those is present.
pub const CONDITION_PRIORITY: &[&str] = &["require", "node", "default", "module", "import", "browser"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subpath {
    pub subpath: String,
    pub target: String,
    pub is_wildcard: bool,
}

impl Subpath {
    fn new(subpath: &str, target: &str, is_wildcard: bool) -> Self {
        Subpath {
            subpath: subpath.to_string(),
            target: target.to_string(),
            is_wildcard,
        }
    }
}

pub fn read_package_json(fs: &VirtualFs, package_dir: &str) -> Option<Value> {
    let text = fs.read_to_string(&join(package_dir, "package.json"))?;
    serde_json::from_str(&text).ok()
}

/// Lists the importable subpaths of the package installed at `package_dir`.
pub fn resolve_subpaths(package_json: &Value, fs: &VirtualFs, package_dir: &str) -> Vec<Subpath> {
    match package_json.get("exports") {
        Some(Value::String(target)) => vec![Subpath::new(".", target, false)],
        Some(Value::Array(entries)) => entries
            .iter()
            .find_map(resolve_target)
            .map(|target| vec![Subpath::new(".", &target, false)])
            .unwrap_or_default(),
        Some(Value::Object(map)) if is_subpath_map(map) => {
            let mut subpaths = Vec::new();
            for (key, value) in map {
                if !key.starts_with('.') || key == "./package.json" {
                    continue;
                }
                let Some(target) = resolve_target(value) else {
                    continue;
                };
                if key.contains('*') {
                    subpaths.extend(expand_wildcard(key, &target, fs, package_dir));
                } else {
                    subpaths.push(Subpath::new(key, &target, false));
                }
            }
            subpaths
        }
        Some(Value::Object(map)) => resolve_conditions(map)
            .map(|target| vec![Subpath::new(".", &target, false)])
            .unwrap_or_default(),
        _ => legacy_entry(package_json, fs, package_dir)
            .map(|target| vec![Subpath::new(".", &target, false)])
            .unwrap_or_default(),
    }
}

/// `.` when present, otherwise the alphabetically first subpath.
pub fn default_subpath(subpaths: &[Subpath]) -> Option<&Subpath> {
    subpaths
        .iter()
        .find(|entry| entry.subpath == ".")
        .or_else(|| subpaths.iter().min_by(|a, b| a.subpath.cmp(&b.subpath)))
}

/// Resolves one requested subpath (`.` or `./x`) through the exports map,
/// including `*` patterns. Returns the target relative to the package.
pub fn resolve_export(package_json: &Value, fs: &VirtualFs, package_dir: &str, subpath: &str) -> Option<String> {
    match package_json.get("exports") {
        Some(Value::Object(map)) if is_subpath_map(map) => {
            if let Some(value) = map.get(subpath) {
                return resolve_target(value);
            }
            map.iter()
                .filter(|(key, _)| key.contains('*'))
                .find_map(|(key, value)| {
                    let matched = match_pattern(key, subpath)?;
                    let target = resolve_target(value)?;
                    Some(target.replacen('*', matched, 1))
                })
        }
        Some(exports) if subpath == "." => match exports {
            Value::Object(map) => resolve_conditions(map),
            other => resolve_target(other),
        },
        Some(_) => None,
        None if subpath == "." => legacy_entry(package_json, fs, package_dir),
        None => Some(subpath.to_string()),
    }
}

/// Node's file lookup: the exact path, then known extensions, then a
/// directory index.
pub fn resolve_file(fs: &VirtualFs, path: &str) -> Option<String> {
    if fs.is_file(path) {
        return Some(join(path, "."));
    }

    for extension in RESOLVE_EXTENSIONS {
        let candidate = format!("{path}{extension}");
        if fs.is_file(&candidate) {
            return Some(join(&candidate, "."));
        }
    }

    RESOLVE_EXTENSIONS
        .iter()
        .map(|extension| join(path, &format!("index{extension}")))
        .find(|candidate| fs.is_file(candidate))
}

fn is_subpath_map(map: &Map<String, Value>) -> bool {
    map.keys().any(|key| key.starts_with('.'))
}

fn resolve_target(value: &Value) -> Option<String> {
    match value {
        Value::String(target) => Some(target.clone()),
        Value::Array(entries) => entries.iter().find_map(resolve_target),
        Value::Object(map) => resolve_conditions(map),
        _ => None,
    }
}

fn resolve_conditions(map: &Map<String, Value>) -> Option<String> {
    CONDITION_PRIORITY
        .iter()
        .rev()
        .filter_map(|condition| map.get(*condition))
        .find_map(resolve_target)
}

fn legacy_entry(package_json: &Value, fs: &VirtualFs, package_dir: &str) -> Option<String> {
    for field in ["module", "main"] {
        if let Some(Value::String(target)) = package_json.get(field)
            && !target.is_empty()
        {
            return Some(target.clone());
        }
    }

    fs.is_file(&join(package_dir, "index.js"))
        .then(|| "./index.js".to_string())
}

fn match_pattern<'a>(pattern: &str, candidate: &'a str) -> Option<&'a str> {
    let (prefix, suffix) = pattern.split_once('*')?;
    if candidate.len() < prefix.len() + suffix.len() {
        return None;
    }
    candidate
        .strip_prefix(prefix)?
        .strip_suffix(suffix)
        .filter(|matched| !matched.is_empty())
}

/// Expands `./features/*` style keys by listing the files that match the
/// target pattern.
fn expand_wildcard(key: &str, target: &str, fs: &VirtualFs, package_dir: &str) -> Vec<Subpath> {
    let Some((target_prefix, _)) = target.split_once('*') else {
        return Vec::new();
    };

    let listing_dir = match target_prefix.rfind('/') {
        Some(idx) => &target_prefix[..idx],
        None => ".",
    };
    let root = format!("{}/", join(package_dir, ".").trim_end_matches('/'));
    let listing = join(package_dir, listing_dir);
    if !format!("{listing}/").starts_with(&root) {
        return Vec::new();
    }

    let mut expanded = Vec::new();
    for file in fs.walk(&listing) {
        let Some(inside) = file.strip_prefix(&root) else {
            continue;
        };
        let relative = format!("./{inside}");
        if let Some(matched) = match_pattern(target, &relative) {
            expanded.push(Subpath::new(&key.replacen('*', matched, 1), &relative, true));
        }
    }

    expanded.sort_by(|a, b| a.subpath.cmp(&b.subpath));
    expanded
}
