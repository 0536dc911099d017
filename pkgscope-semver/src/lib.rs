use semver::VersionReq;
use std::error::Error as StdError;
use std::fmt;

/// An npm range: one or more `||`-separated comparator sets.
#[derive(Debug, Clone)]
pub struct RangeSet {
    original: String,
    ranges: Vec<VersionReq>,
    wildcard: bool,
}

#[derive(Debug, Clone)]
pub struct Error {
    input: String,
    message: String,
}

impl Error {
    pub fn new(input: String, message: String) -> Self {
        Self { input, message }
    }

    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.input)
    }
}

impl StdError for Error {}

impl RangeSet {
    pub fn parse(original: &str) -> Result<Self, Error> {
        let mut s = original.trim();

        if s.is_empty() {
            s = "*";
        }

        let wildcard = is_wildcard(s);
        let mut ranges = Vec::new();

        for part in s.split("||") {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let normalized = normalize_and_part(part);

            let req = VersionReq::parse(&normalized)
                .map_err(|err| Error::new(original.to_string(), err.to_string()))?;

            ranges.push(req);
        }

        if ranges.is_empty() {
            ranges.push(VersionReq::STAR);
        }

        Ok(RangeSet {
            original: original.to_string(),
            ranges,
            wildcard,
        })
    }

    /// Wildcard ranges (`*`, `x`, empty) also accept prereleases.
    pub fn matches(&self, version: &Version) -> bool {
        if self.wildcard {
            return true;
        }

        self.ranges.iter().any(|r| r.matches(version))
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn original(&self) -> &str {
        &self.original
    }
}

/// Parses a version leniently: surrounding whitespace, a leading `v` or `=`.
pub fn parse_loose(input: &str) -> Option<Version> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('=').unwrap_or(trimmed).trim_start();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    Version::parse(trimmed).ok()
}

fn is_wildcard(s: &str) -> bool {
    matches!(s.trim(), "" | "*" | "x" | "X")
}

fn normalize_and_part(part: &str) -> String {
    let tokens: Vec<&str> = part.split_whitespace().collect();

    if tokens.len() == 3 && tokens[1] == "-" {
        return hyphen_range(tokens[0], tokens[2]);
    }

    let mut result = String::new();
    let mut pending_op: Option<&str> = None;

    for token in tokens {
        if matches!(token, "=" | ">" | ">=" | "<" | "<=" | "~" | "^") {
            pending_op = Some(token);
            continue;
        }

        if !result.is_empty() {
            result.push_str(", ");
        }

        match pending_op.take() {
            Some(op) => {
                result.push_str(op);
                result.push_str(strip_v(token));
            }
            None => result.push_str(&normalize_comparator(token)),
        }
    }

    result
}

// npm treats a bare version as exact and a bare partial as an x-range, which
// is what `=` means to the semver crate.
fn normalize_comparator(token: &str) -> String {
    let (op, rest) = split_operator(token);
    let rest = strip_v(rest);

    if !op.is_empty() {
        return format!("{op}{rest}");
    }

    let core = rest.split(['-', '+']).next().unwrap_or(rest);
    if is_wildcard(rest) || core.contains(['x', 'X', '*']) {
        return rest.to_string();
    }

    format!("={rest}")
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in [">=", "<=", ">", "<", "=", "~", "^"] {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest);
        }
    }

    ("", token)
}

fn strip_v(token: &str) -> &str {
    token
        .strip_prefix('v')
        .or_else(|| token.strip_prefix('V'))
        .unwrap_or(token)
}

fn hyphen_range(lower: &str, upper: &str) -> String {
    let lower = strip_v(lower);
    let upper = strip_v(upper);
    let parts: Vec<&str> = upper.split('.').collect();

    let upper_bound = match parts.as_slice() {
        [major] => match major.parse::<u64>() {
            Ok(major) => format!("<{}.0.0", major + 1),
            Err(_) => String::new(),
        },
        [major, minor] => match (major.parse::<u64>(), minor.parse::<u64>()) {
            (Ok(major), Ok(minor)) => format!("<{}.{}.0", major, minor + 1),
            _ => String::new(),
        },
        _ => format!("<={upper}"),
    };

    if upper_bound.is_empty() {
        format!(">={lower}")
    } else {
        format!(">={lower}, {upper_bound}")
    }
}

pub use semver::Version;
