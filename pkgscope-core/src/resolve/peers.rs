use crate::registry::Manifest;

/// Peers to resolve as if they were regular dependencies of `manifest`.
///
/// Optional peers are skipped. A peer already declared as a regular
/// dependency is skipped by name without comparing ranges.
pub fn injected_peers(manifest: &Manifest) -> Vec<(String, String)> {
    manifest
        .required_peers()
        .filter(|(name, _)| !manifest.dependencies.contains_key(*name))
        .map(|(name, range)| (name.clone(), range.clone()))
        .collect()
}
