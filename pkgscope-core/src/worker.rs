pub mod protocol;
pub mod queue;

pub use protocol::{ClientMessage, InitOptions, ServerMessage, strip_ansi_codes};
pub use queue::{BundleQueue, QueueState, Submitted};

use crate::bundle::{BundleEngine, BundleOptions, BundleResult};
use crate::operations::{self, BundleRequest, InitResult, InstallOptions, Installation};
use crate::progress::{Progress, ProgressSink};
use crate::session::Session;
use crate::specifier::parse_specifier;
use crate::{PkgscopeError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, warn};

const PROGRESS_CAPACITY: usize = 1024;

#[derive(Debug)]
pub enum Command {
    Init {
        spec: String,
        options: InitOptions,
    },
    Bundle {
        subpath: String,
        exports: Option<Vec<String>>,
        options: BundleOptions,
    },
}

#[derive(Debug)]
pub enum Reply {
    Init(Box<InitResult>),
    Bundle(Box<BundleResult>),
}

struct Request {
    id: u64,
    command: Command,
}

struct Response {
    id: u64,
    outcome: Result<Reply>,
}

type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Reply>>>>>;

fn lock_pending(pending: &PendingReplies) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Reply>>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Client side of a worker. Requests are sent when a method is called, so
/// call order is the order the worker sees them in.
#[derive(Clone)]
pub struct WorkerHandle {
    requests: mpsc::UnboundedSender<Request>,
    pending: PendingReplies,
    progress: broadcast::Sender<Progress>,
    next_id: Arc<AtomicU64>,
}

impl WorkerHandle {
    pub fn spawn<E: BundleEngine>(session: Session, engine: Arc<E>) -> Self {
        Self::start(session, engine, None)
    }

    /// A worker that starts out initialized with an existing installation.
    pub fn with_installation<E: BundleEngine>(session: Session, engine: Arc<E>, installation: Installation) -> Self {
        Self::start(session, engine, Some(installation))
    }

    fn start<E: BundleEngine>(session: Session, engine: Arc<E>, installation: Option<Installation>) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, mut response_rx) = mpsc::unbounded_channel::<Response>();
        let (progress, _) = broadcast::channel(PROGRESS_CAPACITY);
        let pending = PendingReplies::default();

        let actor = WorkerActor {
            session: Arc::new(session),
            engine,
            installation,
            queue: BundleQueue::new(),
            responses: response_tx,
            progress: ProgressSink::new(progress.clone()),
        };
        tokio::spawn(actor.run(request_rx));

        let routes = pending.clone();
        tokio::spawn(async move {
            while let Some(response) = response_rx.recv().await {
                let slot = lock_pending(&routes).remove(&response.id);
                match slot {
                    Some(slot) => {
                        let _ = slot.send(response.outcome);
                    }
                    None => warn!("dropping response for unknown request {}", response.id),
                }
            }
        });

        WorkerHandle {
            requests: request_tx,
            pending,
            progress,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn init(&self, spec: &str, options: InitOptions) -> impl Future<Output = Result<InitResult>> + Send + 'static {
        let reply = self.call(Command::Init {
            spec: spec.to_string(),
            options,
        });
        async move {
            match reply.await? {
                Reply::Init(result) => Ok(*result),
                Reply::Bundle(_) => Err(PkgscopeError::WorkerClosed),
            }
        }
    }

    pub fn bundle(
        &self,
        subpath: &str,
        exports: Option<Vec<String>>,
        options: BundleOptions,
    ) -> impl Future<Output = Result<BundleResult>> + Send + 'static {
        let reply = self.call(Command::Bundle {
            subpath: subpath.to_string(),
            exports,
            options,
        });
        async move {
            match reply.await? {
                Reply::Bundle(result) => Ok(*result),
                Reply::Init(_) => Err(PkgscopeError::WorkerClosed),
            }
        }
    }

    fn call(&self, command: Command) -> impl Future<Output = Result<Reply>> + Send + 'static {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(id, tx);

        let sent = self.requests.send(Request { id, command }).is_ok();
        if !sent {
            lock_pending(&self.pending).remove(&id);
        }

        async move {
            if !sent {
                return Err(PkgscopeError::WorkerClosed);
            }
            rx.await.map_err(|_| PkgscopeError::WorkerClosed)?
        }
    }
}

struct BundleJob {
    id: u64,
    request: BundleRequest,
}

struct WorkerActor<E> {
    session: Arc<Session>,
    engine: Arc<E>,
    installation: Option<Installation>,
    queue: BundleQueue<BundleJob>,
    responses: mpsc::UnboundedSender<Response>,
    progress: ProgressSink,
}

impl<E: BundleEngine> WorkerActor<E> {
    async fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(u64, Result<BundleResult>)>();

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request { id, command }) => self.handle(id, command, &done_tx).await,
                    None => break,
                },
                Some((id, outcome)) = done_rx.recv() => {
                    self.respond(id, outcome.map(|result| Reply::Bundle(Box::new(result))));
                    if let Some(next) = self.queue.finish() {
                        self.start_bundle(next, &done_tx);
                    }
                }
            }
        }

        debug!("worker stopped");
    }

    async fn handle(&mut self, id: u64, command: Command, done: &mpsc::UnboundedSender<(u64, Result<BundleResult>)>) {
        match command {
            Command::Init { spec, options } => {
                let outcome = self.initialize(&spec, &options).await;
                self.respond(id, outcome.map(|result| Reply::Init(Box::new(result))));
            }
            Command::Bundle {
                subpath,
                exports,
                options,
            } => {
                let Some(installation) = &self.installation else {
                    self.respond(id, Err(PkgscopeError::NotInitialized));
                    return;
                };

                let job = BundleJob {
                    id,
                    request: BundleRequest {
                        package: installation.result.name.clone(),
                        subpath,
                        exports,
                        options,
                    },
                };

                match self.queue.submit(job) {
                    Submitted::Start(job) => self.start_bundle(job, done),
                    Submitted::Queued { superseded } => {
                        if let Some(old) = superseded {
                            debug!("bundle request {} superseded by {}", old.id, id);
                            self.respond(old.id, Err(PkgscopeError::Superseded));
                        }
                    }
                }
            }
        }
    }

    async fn initialize(&mut self, spec: &str, options: &InitOptions) -> Result<InitResult> {
        if let Some(installation) = &self.installation {
            debug!("already initialized, returning cached result");
            return Ok(installation.result.clone());
        }

        let spec = parse_specifier(spec)?;
        let mut install_options = InstallOptions::from_config(&self.session.config);
        if let Some(install_peers) = options.install_peers {
            install_options.resolve.install_peers = install_peers;
        }
        if let Some(concurrency) = options.concurrency.filter(|n| *n > 0) {
            install_options.fetch.concurrency = concurrency;
        }

        let installation = operations::install(&self.session, &spec, &install_options, &self.progress).await?;
        let result = installation.result.clone();
        self.installation = Some(installation);
        Ok(result)
    }

    fn start_bundle(&self, job: BundleJob, done: &mpsc::UnboundedSender<(u64, Result<BundleResult>)>) {
        let Some(installation) = &self.installation else {
            self.respond(job.id, Err(PkgscopeError::NotInitialized));
            return;
        };

        let session = self.session.clone();
        let engine = self.engine.clone();
        let fs = installation.fs.clone();
        let progress = self.progress.clone();
        let done = done.clone();

        tokio::spawn(async move {
            let outcome = operations::bundle(session, engine, fs, job.request, progress).await;
            let _ = done.send((job.id, outcome));
        });
    }

    fn respond(&self, id: u64, outcome: Result<Reply>) {
        if self.responses.send(Response { id, outcome }).is_err() {
            warn!("response router gone, dropping reply to {id}");
        }
    }
}

/// Hosts `worker` over a line-delimited JSON stream: requests in on
/// `reader`, responses and progress out on `writer`. Returns once the input
/// ends and every accepted request has been answered.
pub async fn serve<R, W>(worker: WorkerHandle, reader: R, writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(message) = out_rx.recv().await {
            let mut line = match serde_json::to_string(&message) {
                Ok(line) => line,
                Err(err) => {
                    warn!("failed to encode message: {err}");
                    continue;
                }
            };
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut progress = worker.subscribe();
    let progress_out = out_tx.clone();
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let forwarder = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                event = progress.recv() => match event {
                    Ok(event) => {
                        if progress_out.send(ServerMessage::Progress(event)).is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("progress forwarder skipped {skipped} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
                _ = &mut stop_rx => {
                    // Flush whatever was emitted before the last reply.
                    loop {
                        match progress.try_recv() {
                            Ok(event) => {
                                let _ = progress_out.send(ServerMessage::Progress(event));
                            }
                            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                            Err(_) => return,
                        }
                    }
                }
            }
        }
    });

    let _ = out_tx.send(ServerMessage::Ready);

    let mut in_flight = JoinSet::new();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let message: ClientMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(err) => {
                let id = serde_json::from_str::<serde_json::Value>(&line)
                    .ok()
                    .and_then(|value| value.get("id").and_then(serde_json::Value::as_u64))
                    .unwrap_or(0);
                let _ = out_tx.send(ServerMessage::error(id, &format!("invalid request: {err}")));
                continue;
            }
        };

        let out = out_tx.clone();
        match message {
            ClientMessage::Init { id, spec, options } => {
                let reply = worker.init(&spec, options);
                in_flight.spawn(async move {
                    let message = match reply.await {
                        Ok(result) => ServerMessage::Init {
                            id,
                            result: Box::new(result),
                        },
                        Err(err) => ServerMessage::error(id, &err),
                    };
                    let _ = out.send(message);
                });
            }
            ClientMessage::Bundle {
                id,
                subpath,
                exports,
                options,
            } => {
                let reply = worker.bundle(&subpath, exports, options);
                in_flight.spawn(async move {
                    let message = match reply.await {
                        Ok(result) => ServerMessage::Bundle {
                            id,
                            result: Box::new(result),
                        },
                        Err(err) => ServerMessage::error(id, &err),
                    };
                    let _ = out.send(message);
                });
            }
        }
    }

    while in_flight.join_next().await.is_some() {}

    let _ = stop_tx.send(());
    let _ = forwarder.await;
    drop(out_tx);

    match writer_task.await {
        Ok(result) => result,
        Err(err) => Err(std::io::Error::other(err)),
    }
}
