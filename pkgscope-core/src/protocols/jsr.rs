pub const MIRROR_SCOPE: &str = "@jsr/";

/// `@scope/name` becomes `@jsr/scope__name`, the form the npm-compatible
/// JSR mirror publishes under.
pub fn to_mirror_name(name: &str) -> String {
    if name.starts_with(MIRROR_SCOPE) {
        return name.to_string();
    }

    if let Some(stripped) = name.strip_prefix('@') {
        if let Some((scope, pkg)) = stripped.split_once('/') {
            return format!("{MIRROR_SCOPE}{scope}__{pkg}");
        } else {
            return format!("{MIRROR_SCOPE}{stripped}");
        }
    }

    format!("{MIRROR_SCOPE}{name}")
}

/// Reverses [`to_mirror_name`]. Returns `None` for names outside the mirror scope.
pub fn from_mirror_name(name: &str) -> Option<String> {
    let rest = name.strip_prefix(MIRROR_SCOPE)?;
    let (scope, pkg) = rest.split_once("__")?;

    if scope.is_empty() || pkg.is_empty() {
        return None;
    }

    Some(format!("@{scope}/{pkg}"))
}
