use crate::bundle::{BundleEngine, BundleOptions, BundleResult, bundle_subpath};
use crate::progress::ProgressSink;
use crate::session::Session;
use crate::vfs::VirtualFs;
use crate::{PkgscopeError, Result};
use std::sync::Arc;

pub struct BundleRequest {
    pub package: String,
    pub subpath: String,
    /// `None` bundles every export.
    pub exports: Option<Vec<String>>,
    pub options: BundleOptions,
}

/// Runs one bundle on the blocking pool. The engine and parser are
/// synchronous and may take a while on large packages.
pub async fn bundle<E: BundleEngine>(
    session: Arc<Session>,
    engine: Arc<E>,
    fs: Arc<VirtualFs>,
    request: BundleRequest,
    progress: ProgressSink,
) -> Result<BundleResult> {
    tokio::task::spawn_blocking(move || {
        bundle_subpath(
            engine.as_ref(),
            fs,
            &session.compression,
            &request.package,
            &request.subpath,
            request.exports.as_deref(),
            &request.options,
            &progress,
        )
    })
    .await
    .map_err(|err| PkgscopeError::bundle(format!("bundle task failed: {err}")))?
}
