use super::entry::ENTRY_ID;
use crate::Result;
use crate::vfs::VirtualFs;
use std::sync::Arc;

/// Hooks an engine consults before falling back to the virtual filesystem.
pub trait BundlePlugin: Send + Sync {
    fn resolve_id(&self, specifier: &str, importer: Option<&str>) -> Option<String>;
    fn load(&self, id: &str) -> Option<String>;
}

pub struct EngineInput {
    pub fs: Arc<VirtualFs>,
    pub input: String,
    pub plugin: Arc<dyn BundlePlugin>,
    pub external: Vec<String>,
    pub minify: bool,
}

impl EngineInput {
    /// `react` also covers `react/jsx-runtime`.
    pub fn is_external(&self, specifier: &str) -> bool {
        self.external.iter().any(|external| {
            specifier == external
                || specifier
                    .strip_prefix(external.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineChunk {
    pub file_name: String,
    pub code: String,
    pub is_entry: bool,
}

/// A bundler that turns an entry module id into output chunks. Runs on a
/// blocking thread.
pub trait BundleEngine: Send + Sync + 'static {
    fn bundle(&self, input: EngineInput) -> Result<Vec<EngineChunk>>;
}

/// Serves the synthetic entry module.
pub struct EntryPlugin {
    code: String,
}

impl EntryPlugin {
    pub fn new(code: String) -> Self {
        EntryPlugin { code }
    }
}

impl BundlePlugin for EntryPlugin {
    fn resolve_id(&self, specifier: &str, _importer: Option<&str>) -> Option<String> {
        (specifier == ENTRY_ID).then(|| ENTRY_ID.to_string())
    }

    fn load(&self, id: &str) -> Option<String> {
        (id == ENTRY_ID).then(|| self.code.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn externals_cover_deep_imports() {
        let input = EngineInput {
            fs: Arc::new(VirtualFs::new()),
            input: ENTRY_ID.to_string(),
            plugin: Arc::new(EntryPlugin::new(String::new())),
            external: vec!["react".to_string()],
            minify: true,
        };

        assert!(input.is_external("react"));
        assert!(input.is_external("react/jsx-runtime"));
        assert!(!input.is_external("react-dom"));
    }

    #[test]
    fn entry_plugin_only_serves_the_entry() {
        let plugin = EntryPlugin::new("export {};".to_string());
        assert_eq!(plugin.resolve_id(ENTRY_ID, None).as_deref(), Some(ENTRY_ID));
        assert_eq!(plugin.resolve_id("./x.js", Some(ENTRY_ID)), None);
        assert_eq!(plugin.load(ENTRY_ID).as_deref(), Some("export {};"));
        assert_eq!(plugin.load("/node_modules/x/index.js"), None);
    }
}
