use crate::analyze::{ModuleKind, analyze_module};
use crate::vfs::VirtualFs;
use crate::{PkgscopeError, Result};

/// Module id of the synthetic entry. Never written to the filesystem, only
/// served by the entry plugin.
pub const ENTRY_ID: &str = "\0pkgscope:entry";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryModule {
    pub code: String,
    pub exports: Vec<String>,
    pub is_cjs: bool,
}

/// Builds the entry that re-exports `selection` from the module at
/// `target_path`. `None` selects everything the module exports.
pub fn synthesize_entry(
    package: &str,
    subpath: &str,
    target_path: &str,
    fs: &VirtualFs,
    selection: Option<&[String]>,
) -> Result<EntryModule> {
    let source = quote(target_path);

    if target_path.ends_with(".json") {
        return Ok(EntryModule {
            code: format!("export {{ default }} from {source};\n"),
            exports: vec!["default".to_string()],
            is_cjs: false,
        });
    }

    let text = fs.read_to_string(target_path).ok_or_else(|| {
        PkgscopeError::bundle(format!(
            "cannot read {target_path} (subpath {subpath} of {package})"
        ))
    })?;
    let info = analyze_module(&text, target_path)?;

    let entry = match info.kind {
        ModuleKind::Cjs => EntryModule {
            code: format!("export {{ default }} from {source};\n"),
            exports: vec!["default".to_string()],
            is_cjs: true,
        },
        ModuleKind::Unknown => side_effect_only(&source),
        ModuleKind::Esm => match selection {
            None => {
                let mut code = format!("export * from {source};\n");
                let mut exports = info.named_exports.clone();
                if info.has_default_export {
                    code.push_str(&format!("export {{ default }} from {source};\n"));
                    exports.push("default".to_string());
                }
                EntryModule {
                    code,
                    exports,
                    is_cjs: false,
                }
            }
            Some([]) => side_effect_only(&source),
            Some(names) => {
                let list = names.iter().map(|name| quote(name)).collect::<Vec<_>>().join(", ");
                EntryModule {
                    code: format!("export {{ {list} }} from {source};\n"),
                    exports: names.to_vec(),
                    is_cjs: false,
                }
            }
        },
    };

    Ok(entry)
}

fn side_effect_only(source: &str) -> EntryModule {
    EntryModule {
        code: format!("import {source};\n"),
        exports: Vec::new(),
        is_cjs: false,
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "/node_modules/pkg/index.js";

    fn fs_with(source: &str) -> VirtualFs {
        let fs = VirtualFs::new();
        fs.write(TARGET, source.as_bytes().to_vec());
        fs
    }

    #[test]
    fn json_targets_export_default() {
        let entry = synthesize_entry("pkg", "./data", "/node_modules/pkg/data.json", &VirtualFs::new(), None)
            .unwrap();
        assert_eq!(entry.code, "export { default } from \"/node_modules/pkg/data.json\";\n");
        assert_eq!(entry.exports, vec!["default"]);
    }

    #[test]
    fn cjs_targets_only_export_default() {
        let fs = fs_with("module.exports = { a: 1, b: 2 };");
        let entry = synthesize_entry("pkg", ".", TARGET, &fs, Some(&["a".to_string()])).unwrap();
        assert!(entry.is_cjs);
        assert_eq!(entry.exports, vec!["default"]);
        assert_eq!(entry.code, format!("export {{ default }} from \"{TARGET}\";\n"));
    }

    #[test]
    fn esm_without_selection_reexports_everything() {
        let fs = fs_with("export const a = 1; export default function main() {}");
        let entry = synthesize_entry("pkg", ".", TARGET, &fs, None).unwrap();
        assert_eq!(
            entry.code,
            format!("export * from \"{TARGET}\";\nexport {{ default }} from \"{TARGET}\";\n")
        );
        assert_eq!(entry.exports, vec!["a", "default"]);
        assert!(!entry.is_cjs);
    }

    #[test]
    fn esm_selection_is_json_quoted() {
        let fs = fs_with("const x = 1; export { x as \"odd-name\", x as b };");
        let selection = vec!["odd-name".to_string(), "b".to_string()];
        let entry = synthesize_entry("pkg", ".", TARGET, &fs, Some(&selection)).unwrap();
        assert_eq!(entry.code, format!("export {{ \"odd-name\", \"b\" }} from \"{TARGET}\";\n"));
        assert_eq!(entry.exports, selection);
    }

    #[test]
    fn empty_selection_and_side_effect_modules_export_nothing() {
        let esm = fs_with("export const a = 1;");
        let entry = synthesize_entry("pkg", ".", TARGET, &esm, Some(&[])).unwrap();
        assert!(entry.exports.is_empty());

        let script = fs_with("window.polyfilled = true;");
        let entry = synthesize_entry("pkg", ".", TARGET, &script, None).unwrap();
        assert!(entry.exports.is_empty());
        assert_eq!(entry.code, format!("import \"{TARGET}\";\n"));
    }

    #[test]
    fn missing_target_is_a_bundle_error() {
        let err = synthesize_entry("pkg", ".", TARGET, &VirtualFs::new(), None).unwrap_err();
        assert!(matches!(err, PkgscopeError::Bundle { .. }));
    }
}
