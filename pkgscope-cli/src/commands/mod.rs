pub mod analyze;
pub mod bundle;
pub mod exports;
pub mod install;
pub mod serve;

use crate::console;
use anyhow::Result;
use pkgscope_core::operations::{self, InstallOptions, Installation};
use pkgscope_core::progress::{Progress, ProgressSink};
use pkgscope_core::{PkgscopeConfig, Session, parse_specifier};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const PROGRESS_CAPACITY: usize = 256;

/// Installs `spec` with a progress line on stderr.
pub async fn install_with_progress(spec: &str, config: &PkgscopeConfig) -> Result<Installation> {
    let specifier = parse_specifier(spec)?;
    let session = Session::new(config.clone());
    let options = InstallOptions::from_config(config);

    let (sender, receiver) = broadcast::channel(PROGRESS_CAPACITY);
    let renderer = render_progress(receiver);

    let installation = operations::install(&session, &specifier, &options, &ProgressSink::new(sender)).await;
    let _ = renderer.await;
    console::clear_line();

    Ok(installation?)
}

/// Draws progress events until every sender is dropped.
pub fn render_progress(mut receiver: broadcast::Receiver<Progress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut resolved = 0;
        loop {
            match receiver.recv().await {
                Ok(Progress::Resolve { name, version }) => {
                    resolved += 1;
                    console::counter("resolve", &format!("{name}@{version}"), resolved);
                }
                Ok(Progress::Fetch {
                    completed,
                    total,
                    name,
                }) => console::progress("fetch", &name, completed, total),
                Ok(Progress::Bundle { subpath }) => console::step(&format!("bundling {subpath}")),
                Ok(Progress::Compress { chunk }) => console::step(&format!("compressing {chunk}")),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
