use std::env;

pub const DEFAULT_NPM_REGISTRY: &str = "https://registry.npmjs.org";
pub const DEFAULT_JSR_REGISTRY: &str = "https://npm.jsr.io";
pub const DEFAULT_CONCURRENCY: usize = 6;

#[derive(Debug, Clone)]
pub struct PkgscopeConfig {
    pub npm_registry: String,
    pub jsr_registry: String,
    pub concurrency: usize,
    pub install_peers: bool,
    pub minify: bool,
    pub verbose: bool,
}

impl Default for PkgscopeConfig {
    fn default() -> Self {
        PkgscopeConfig {
            npm_registry: DEFAULT_NPM_REGISTRY.to_string(),
            jsr_registry: DEFAULT_JSR_REGISTRY.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            install_peers: true,
            minify: true,
            verbose: false,
        }
    }
}

impl PkgscopeConfig {
    pub fn from_env() -> Self {
        let mut config = PkgscopeConfig::default();

        if let Ok(value) = env::var("PKGSCOPE_REGISTRY")
            .or_else(|_| env::var("NPM_CONFIG_REGISTRY"))
            .or_else(|_| env::var("npm_config_registry"))
        {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                config.npm_registry = normalize_registry_url(trimmed);
            }
        }

        if let Ok(value) = env::var("PKGSCOPE_REGISTRY_JSR") {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                config.jsr_registry = normalize_registry_url(trimmed);
            }
        }

        if let Ok(value) = env::var("PKGSCOPE_CONCURRENCY")
            && let Ok(parsed) = value.trim().parse::<usize>()
            && parsed > 0
        {
            config.concurrency = parsed;
        }

        if let Some(on) = env_flag("PKGSCOPE_INSTALL_PEERS") {
            config.install_peers = on;
        }

        if let Some(on) = env_flag("PKGSCOPE_MINIFY") {
            config.minify = on;
        }

        config.verbose = env_flag("PKGSCOPE_VERBOSE").unwrap_or(false);

        config
    }
}

pub fn normalize_registry_url(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let value = env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_registry_urls() {
        assert_eq!(
            normalize_registry_url("registry.example.com/"),
            "https://registry.example.com"
        );
        assert_eq!(
            normalize_registry_url("http://localhost:4873/"),
            "http://localhost:4873"
        );
    }

    #[test]
    fn defaults_match_npm() {
        let config = PkgscopeConfig::default();
        assert_eq!(config.npm_registry, DEFAULT_NPM_REGISTRY);
        assert_eq!(config.concurrency, 6);
        assert!(config.install_peers);
        assert!(config.minify);
    }
}
