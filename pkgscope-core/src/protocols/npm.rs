use crate::config::PkgscopeConfig;

pub fn registry_base(config: &PkgscopeConfig) -> &str {
    config.npm_registry.trim_end_matches('/')
}

pub fn packument_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), super::encode_package_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_unscoped_url() {
        assert_eq!(
            packument_url("https://registry.npmjs.org/", "is-odd"),
            "https://registry.npmjs.org/is-odd"
        );
    }

    #[test]
    fn encodes_only_after_the_scope_marker() {
        assert_eq!(
            packument_url("https://registry.npmjs.org", "@babel/core"),
            "https://registry.npmjs.org/@babel%2Fcore"
        );
    }
}
