use thiserror::Error;

#[derive(Error, Debug)]
pub enum PkgscopeError {
    #[error("Invalid package specifier {input:?}: {reason}")]
    InvalidSpecifier { input: String, reason: String },

    #[error("Package {name} not found in the {registry} registry")]
    PackageNotFound { name: String, registry: String },

    #[error("No version of {name} matches {range:?}")]
    NoMatchingVersion { name: String, range: String },

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Malformed registry response for {name}: {source}")]
    InvalidPackument {
        name: String,
        source: serde_json::Error,
    },

    #[error("Invalid semver range {value}: {reason}")]
    Semver { value: String, reason: String },

    #[error("Failed to extract tarball for {name}: {source}")]
    Archive {
        name: String,
        source: std::io::Error,
    },

    #[error("Bundle failed: {reason}")]
    Bundle { reason: String },

    #[error("Bundle request superseded by a newer request")]
    Superseded,

    #[error("Worker is not initialized; call init first")]
    NotInitialized,

    #[error("Worker channel closed")]
    WorkerClosed,
}

impl PkgscopeError {
    pub fn bundle(reason: impl Into<String>) -> Self {
        PkgscopeError::Bundle {
            reason: reason.into(),
        }
    }

    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        PkgscopeError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
