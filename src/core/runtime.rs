//! Task runtime command router.
//!
//! A thin async command queue that owns the single worker slot. The
//! foreground submits list-formats and download-queue tasks through the
//! handle; at most one worker runs at a time and its events flow back over
//! an unbounded channel in emission order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::core::engine::MediaEngine;
use crate::core::formats::formats_from_info;
use crate::core::models::{AppError, AppResult, DownloadItem, TaskEvent, TaskKind};
use crate::core::options::EngineConfig;
use crate::core::progress_tracker::ProgressRelay;

pub type EventSender = mpsc::UnboundedSender<TaskEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TaskEvent>;

/// Cooperative cancellation flag shared by the foreground and the worker
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The task currently occupying the worker slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTask {
    pub id: String,
    pub kind: TaskKind,
}

/// Commands understood by the runtime router.
#[derive(Debug)]
pub enum RuntimeCommand {
    ListFormats {
        url: String,
        config: EngineConfig,
        respond_to: oneshot::Sender<AppResult<String>>,
    },
    DownloadQueue {
        items: Vec<DownloadItem>,
        config: EngineConfig,
        respond_to: oneshot::Sender<AppResult<String>>,
    },
    Cancel {
        respond_to: oneshot::Sender<AppResult<bool>>,
    },
    Status {
        respond_to: oneshot::Sender<AppResult<Option<ActiveTask>>>,
    },
}

/// Handle exposed to the foreground dispatcher.
#[derive(Clone)]
pub struct TaskRuntimeHandle {
    sender: mpsc::Sender<RuntimeCommand>,
}

impl TaskRuntimeHandle {
    pub fn new(sender: mpsc::Sender<RuntimeCommand>) -> Self {
        Self { sender }
    }

    async fn send_command<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<AppResult<T>>) -> RuntimeCommand,
    ) -> AppResult<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| AppError::System(format!("Task runtime unavailable: {}", e)))?;
        rx.await
            .map_err(|_| AppError::System("Task runtime dropped response".into()))?
    }

    /// Start listing formats for `url`; returns the task id
    pub async fn list_formats(&self, url: String, config: EngineConfig) -> AppResult<String> {
        self.send_command(|tx| RuntimeCommand::ListFormats {
            url,
            config,
            respond_to: tx,
        })
        .await
    }

    /// Start downloading `items` in order; returns the task id
    pub async fn download_queue(
        &self,
        items: Vec<DownloadItem>,
        config: EngineConfig,
    ) -> AppResult<String> {
        self.send_command(|tx| RuntimeCommand::DownloadQueue {
            items,
            config,
            respond_to: tx,
        })
        .await
    }

    /// Request cooperative cancellation; true when a task was running
    pub async fn cancel(&self) -> AppResult<bool> {
        self.send_command(|tx| RuntimeCommand::Cancel { respond_to: tx })
            .await
    }

    pub async fn active_task(&self) -> AppResult<Option<ActiveTask>> {
        self.send_command(|tx| RuntimeCommand::Status { respond_to: tx })
            .await
    }

    pub async fn is_busy(&self) -> AppResult<bool> {
        Ok(self.active_task().await?.is_some())
    }
}

/// Spawn the router loop on the current tokio runtime.
pub fn spawn_task_runtime(
    engine: Arc<dyn MediaEngine>,
    relay_interval: Duration,
) -> AppResult<(TaskRuntimeHandle, EventReceiver)> {
    let handle = Handle::try_current()
        .map_err(|e| AppError::System(format!("No tokio runtime available: {}", e)))?;

    let (tx, rx) = mpsc::channel(64);
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let router = Router {
        engine,
        events: event_tx,
        cancel: CancelFlag::new(),
        busy: Arc::new(AtomicBool::new(false)),
        active: None,
        relay_interval,
    };

    info!("[RUNTIME] Spawning task router");
    handle.spawn(router_loop(router, rx));

    Ok((TaskRuntimeHandle::new(tx), event_rx))
}

struct Router {
    engine: Arc<dyn MediaEngine>,
    events: EventSender,
    cancel: CancelFlag,
    /// Cleared by the worker's supervisor right before `Finished` is sent
    busy: Arc<AtomicBool>,
    active: Option<ActiveTask>,
    relay_interval: Duration,
}

impl Router {
    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn spawn_worker<F>(&mut self, kind: TaskKind, work: F) -> AppResult<String>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.is_busy() {
            warn!("[RUNTIME] Rejecting {} task, worker busy", kind);
            return Err(AppError::Busy);
        }

        let task_id = Uuid::new_v4().to_string();
        self.cancel.reset();
        self.busy.store(true, Ordering::SeqCst);
        self.active = Some(ActiveTask {
            id: task_id.clone(),
            kind,
        });

        let span = info_span!("task", id = %task_id, kind = %kind);
        let busy = Arc::clone(&self.busy);
        let events = self.events.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            if let Err(join_err) = tokio::spawn(work.instrument(span)).await {
                error!("[RUNTIME] Worker for {} task failed: {}", kind, join_err);
                let _ = events.send(TaskEvent::error(format!("Worker failed: {}", join_err)));
            }
            busy.store(false, Ordering::SeqCst);
            let _ = events.send(TaskEvent::Finished {
                task: kind,
                cancelled: cancel.is_cancelled(),
            });
        });

        info!("[RUNTIME] Started {} task {}", kind, task_id);
        Ok(task_id)
    }
}

async fn router_loop(mut router: Router, mut rx: mpsc::Receiver<RuntimeCommand>) {
    while let Some(cmd) = rx.recv().await {
        debug!("[RUNTIME] Processing command: {:?}", cmd);
        handle_command(&mut router, cmd);
    }
    debug!("Task runtime channel closed, exiting router loop");
}

#[instrument(skip(router, command))]
fn handle_command(router: &mut Router, command: RuntimeCommand) {
    match command {
        RuntimeCommand::ListFormats {
            url,
            config,
            respond_to,
        } => {
            let work = list_formats_task(
                Arc::clone(&router.engine),
                router.events.clone(),
                url,
                config,
            );
            let _ = respond_to.send(router.spawn_worker(TaskKind::ListFormats, work));
        }
        RuntimeCommand::DownloadQueue {
            items,
            config,
            respond_to,
        } => {
            let relay = ProgressRelay::new(
                router.events.clone(),
                router.cancel.clone(),
                router.relay_interval,
            );
            let work = download_queue_task(
                Arc::clone(&router.engine),
                router.events.clone(),
                router.cancel.clone(),
                relay,
                items,
                config,
            );
            let _ = respond_to.send(router.spawn_worker(TaskKind::DownloadQueue, work));
        }
        RuntimeCommand::Cancel { respond_to } => {
            let was_running = router.is_busy();
            router.cancel.cancel();
            debug!("[RUNTIME] Cancel requested, task running: {}", was_running);
            let _ = respond_to.send(Ok(was_running));
        }
        RuntimeCommand::Status { respond_to } => {
            let active = if router.is_busy() {
                router.active.clone()
            } else {
                None
            };
            let _ = respond_to.send(Ok(active));
        }
    }
}

async fn list_formats_task(
    engine: Arc<dyn MediaEngine>,
    events: EventSender,
    url: String,
    config: EngineConfig,
) {
    info!("Listing formats for {} via {}", url, engine.name());
    match engine.extract_info(&url, &config).await {
        Ok(info) => {
            let formats = formats_from_info(&info);
            debug!("Extracted {} formats", formats.len());
            let _ = events.send(TaskEvent::FormatsReady { formats });
        }
        Err(e) => {
            warn!("Format listing failed for {}: {}", url, e);
            let _ = events.send(TaskEvent::error(e.to_string()));
        }
    }
}

async fn download_queue_task(
    engine: Arc<dyn MediaEngine>,
    events: EventSender,
    cancel: CancelFlag,
    mut relay: ProgressRelay,
    items: Vec<DownloadItem>,
    config: EngineConfig,
) {
    let total = items.len();
    for (index, item) in items.iter().enumerate() {
        if cancel.is_cancelled() {
            let _ = events.send(TaskEvent::log("Canceled before next item."));
            return;
        }

        let _ = events.send(TaskEvent::ItemStarted {
            url: item.url.clone(),
        });
        let _ = events.send(TaskEvent::log(format!(
            "--- [{}/{}] {} ---",
            index + 1,
            total,
            item.url
        )));

        match engine.download(&item.url, &config, &mut relay).await {
            Ok(()) => {
                info!("Downloaded {}", item.url);
                let _ = events.send(TaskEvent::ItemDone {
                    url: item.url.clone(),
                });
            }
            Err(AppError::Cancelled) => {
                info!("Download of {} canceled", item.url);
                let _ = events.send(TaskEvent::log("Canceled."));
                return;
            }
            Err(e) => {
                warn!("Download of {} failed: {}", item.url, e);
                let _ = events.send(TaskEvent::log(format!("Error: {}", e)));
            }
        }
    }
}
