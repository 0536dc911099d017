use crate::registry::RegistryKind;
use crate::{PkgscopeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_RANGE: &str = "latest";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpecifier {
    pub name: String,
    pub range: String,
    pub registry: RegistryKind,
}

impl fmt::Display for PackageSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.registry {
            RegistryKind::Npm => write!(f, "{}@{}", self.name, self.range),
            RegistryKind::Jsr => write!(f, "jsr:{}@{}", self.name, self.range),
        }
    }
}

/// Parses `name`, `name@range`, `@scope/name@range`, optionally prefixed
/// with `npm:` or `jsr:`.
pub fn parse_specifier(input: &str) -> Result<PackageSpecifier> {
    let trimmed = input.trim();

    let (registry, rest) = if let Some(rest) = trimmed.strip_prefix("npm:") {
        (RegistryKind::Npm, rest)
    } else if let Some(rest) = trimmed.strip_prefix("jsr:") {
        (RegistryKind::Jsr, rest)
    } else {
        (RegistryKind::Npm, trimmed)
    };

    if rest.is_empty() {
        return Err(invalid(input, "missing package name"));
    }

    let (name, range) = if let Some(scoped) = rest.strip_prefix('@') {
        // The scope's own `@` is skipped; the second one separates the range.
        match scoped.find('@') {
            Some(at) => (&rest[..at + 1], &scoped[at + 1..]),
            None => (rest, ""),
        }
    } else {
        match rest.split_once('@') {
            Some((name, range)) => (name, range),
            None => (rest, ""),
        }
    };

    let scoped = name.starts_with('@');

    if scoped {
        let Some((scope, pkg)) = name[1..].split_once('/') else {
            return Err(invalid(input, "scoped package name is missing '/name'"));
        };

        if scope.is_empty() || pkg.is_empty() || pkg.contains('/') {
            return Err(invalid(input, "malformed scoped package name"));
        }
    } else if name.is_empty() {
        return Err(invalid(input, "missing package name"));
    }

    if registry == RegistryKind::Jsr && !scoped {
        return Err(invalid(input, "JSR packages must be scoped (@scope/name)"));
    }

    let range = range.trim();

    Ok(PackageSpecifier {
        name: name.to_string(),
        range: if range.is_empty() {
            DEFAULT_RANGE.to_string()
        } else {
            range.to_string()
        },
        registry,
    })
}

fn invalid(input: &str, reason: &str) -> PkgscopeError {
    PkgscopeError::InvalidSpecifier {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, range: &str, registry: RegistryKind) -> PackageSpecifier {
        PackageSpecifier {
            name: name.to_string(),
            range: range.to_string(),
            registry,
        }
    }

    #[test]
    fn bare_name_defaults_to_latest() {
        assert_eq!(
            parse_specifier("react").unwrap(),
            spec("react", "latest", RegistryKind::Npm)
        );
    }

    #[test]
    fn splits_name_and_range() {
        assert_eq!(
            parse_specifier("is-odd@^3.0.0").unwrap(),
            spec("is-odd", "^3.0.0", RegistryKind::Npm)
        );
    }

    #[test]
    fn scoped_names_split_on_second_at() {
        assert_eq!(
            parse_specifier("@vue/reactivity@3.4.0").unwrap(),
            spec("@vue/reactivity", "3.4.0", RegistryKind::Npm)
        );
        assert_eq!(
            parse_specifier("@vue/reactivity").unwrap(),
            spec("@vue/reactivity", "latest", RegistryKind::Npm)
        );
    }

    #[test]
    fn recognizes_registry_prefixes() {
        assert_eq!(
            parse_specifier("npm:lodash@4").unwrap(),
            spec("lodash", "4", RegistryKind::Npm)
        );
        assert_eq!(
            parse_specifier("jsr:@std/path@^1.0.0").unwrap(),
            spec("@std/path", "^1.0.0", RegistryKind::Jsr)
        );
    }

    #[test]
    fn jsr_requires_a_scope() {
        let err = parse_specifier("jsr:path").unwrap_err();
        assert!(matches!(err, PkgscopeError::InvalidSpecifier { .. }));
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["", "   ", "@", "@scope", "@scope/", "@/name", "npm:", "@a/b/c", "@1.0.0"] {
            assert!(
                parse_specifier(input).is_err(),
                "expected {input:?} to be rejected"
            );
        }
    }

    #[test]
    fn trailing_at_means_latest() {
        assert_eq!(parse_specifier("react@").unwrap().range, "latest");
    }
}
