use crate::registry::{Manifest, Packument};
use crate::{PkgscopeError, Result};
use pkgscope_semver::{RangeSet, Version};

/// Picks the manifest a real install would choose for `range`:
/// dist-tag, then exact version, then the `latest` tag when it satisfies,
/// then the highest non-deprecated match, then the highest deprecated one.
pub fn pick_version<'a>(name: &str, range: &str, package: &'a Packument) -> Result<&'a Manifest> {
    let trimmed = range.trim();
    let wanted = if trimmed.is_empty() { "latest" } else { trimmed };

    if let Some(tag_version) = package.dist_tags.get(wanted)
        && let Some(meta) = package.versions.get(tag_version)
    {
        return Ok(meta);
    }

    if let Some(meta) = exact_version(wanted, package) {
        return Ok(meta);
    }

    let no_match = || PkgscopeError::NoMatchingVersion {
        name: name.to_string(),
        range: range.to_string(),
    };

    // A package without a `latest` tag still resolves `latest` to its highest version.
    // Anything that is neither a tag nor a range (`beta` without a `beta` tag) matches nothing.
    let ranges = parse_range_set(name, if wanted == "latest" { "*" } else { wanted })
        .map_err(|_| no_match())?;

    if let Some(latest) = package.dist_tags.get("latest")
        && let Some(meta) = package.versions.get(latest)
        && let Ok(ver) = Version::parse(latest)
        && ranges.matches(&ver)
    {
        return Ok(meta);
    }

    let mut candidates: Vec<(Version, &Manifest)> = package
        .versions
        .iter()
        .filter_map(|(version_str, meta)| {
            let ver = Version::parse(version_str).ok()?;
            ranges.matches(&ver).then_some((ver, meta))
        })
        .collect();

    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let picked = candidates
        .iter()
        .find(|(_, meta)| !meta.is_deprecated())
        .or_else(|| candidates.first());

    picked.map(|(_, meta)| *meta).ok_or_else(no_match)
}

pub fn parse_range_set(name: &str, original: &str) -> Result<RangeSet> {
    RangeSet::parse(original).map_err(|err| PkgscopeError::Semver {
        value: format!("{}@{}", name, original),
        reason: err.to_string(),
    })
}

fn exact_version<'a>(wanted: &str, package: &'a Packument) -> Option<&'a Manifest> {
    if let Some(meta) = package.versions.get(wanted) {
        return Some(meta);
    }

    let loose = pkgscope_semver::parse_loose(wanted)?;
    package.versions.get(&loose.to_string())
}
