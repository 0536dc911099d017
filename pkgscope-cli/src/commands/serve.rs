use anyhow::Result;
use clap::Args;
use pkgscope_core::bundle::ConcatEngine;
use pkgscope_core::worker::serve;
use pkgscope_core::{PkgscopeConfig, Session, WorkerHandle};
use std::sync::Arc;
use tokio::io::{BufReader, stdin, stdout};
use tracing::debug;

#[derive(Args, Debug)]
pub struct ServeArgs {}

pub async fn run(_args: ServeArgs, config: &PkgscopeConfig) -> Result<()> {
    let worker = WorkerHandle::spawn(Session::new(config.clone()), Arc::new(ConcatEngine));
    debug!("serving worker requests on stdio");
    serve(worker, BufReader::new(stdin()), stdout()).await?;
    Ok(())
}
