//! JSON messages exchanged with a worker host, one object per line.

use crate::bundle::{BundleOptions, BundleResult};
use crate::operations::InitResult;
use crate::progress::Progress;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::LazyLock;

static STRIP_ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x1b\x9b][\[()#;?]*(?:[0-9]{1,4}(?:;[0-9]{0,4})*)?[0-9A-PRZcf-nqry=><]")
        .expect("ANSI escape pattern is valid")
});

pub fn strip_ansi_codes(s: &str) -> Cow<'_, str> {
    STRIP_ANSI_RE.replace_all(s, "")
}

/// Per-call overrides of the session configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitOptions {
    pub install_peers: Option<bool>,
    pub concurrency: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Init {
        id: u64,
        spec: String,
        #[serde(default)]
        options: InitOptions,
    },
    Bundle {
        id: u64,
        subpath: String,
        /// Absent or `null` selects every export.
        #[serde(default)]
        exports: Option<Vec<String>>,
        #[serde(default)]
        options: BundleOptions,
    },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Ready,
    Init { id: u64, result: Box<InitResult> },
    Bundle { id: u64, result: Box<BundleResult> },
    Error { id: u64, error: String },
    Progress(Progress),
}

impl ServerMessage {
    pub fn error(id: u64, error: &impl ToString) -> Self {
        ServerMessage::Error {
            id,
            error: strip_ansi_codes(&error.to_string()).into_owned(),
        }
    }
}
