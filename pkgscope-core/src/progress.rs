use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Progress {
    Resolve { name: String, version: String },
    Fetch { completed: usize, total: usize, name: String },
    Bundle { subpath: String },
    Compress { chunk: String },
}

/// Fire-and-forget progress channel. Events are dropped when nobody listens.
#[derive(Clone, Debug, Default)]
pub struct ProgressSink {
    sender: Option<broadcast::Sender<Progress>>,
}

impl ProgressSink {
    pub fn new(sender: broadcast::Sender<Progress>) -> Self {
        ProgressSink {
            sender: Some(sender),
        }
    }

    pub fn silent() -> Self {
        ProgressSink::default()
    }

    pub fn emit(&self, event: Progress) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
