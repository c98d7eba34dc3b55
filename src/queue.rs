//! Render queue and the inline render path.
//!
//! Tasks enter an unbounded FIFO and are drained by a fixed number of
//! worker tasks (default 1). A worker skips a task whose card is already
//! cached unless the task is forced; otherwise it resolves the article,
//! leases a renderer from the shared pool, captures the bitmap, and stores
//! it. Failures are logged and never retried; each task also reports its
//! outcome through a oneshot channel and the queryable status store, so
//! callers that care can observe what fire-and-forget callers ignore.
//!
//! The inline path ([`RenderQueue::render_now`]) runs the same resolve →
//! render sequence on the caller's task, leasing from the same pool. It
//! never reads the cache; whether the result is written through is the call
//! site's decision.
//!
//! Identical in-flight keys are not deduplicated. With one worker the FIFO
//! serializes them; with more workers two tasks for the same page can render
//! concurrently and double-write the cache entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info};
use tokio::sync::{mpsc, oneshot};

use crate::api::WikiClient;
use crate::cache::CardCache;
use crate::metadata;
use crate::pool::RendererPool;
use crate::renderer::BackendFactory;
use crate::{Error, Result, ServiceConfig};

/// Queue-visible state of a submitted task, keyed by page id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Running,
    Done,
    Failed(String),
}

/// Terminal result of a submitted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// A fresh bitmap was rendered and stored
    Rendered,
    /// The cache already held a bitmap and the task was not forced
    Skipped,
    /// The task failed; the message is also in the status store and the log
    Failed(String),
}

/// Receipt for a submitted task. Await [`TaskHandle::outcome`] to observe
/// the result, or drop the handle for fire-and-forget semantics.
pub struct TaskHandle {
    pub page_id: u64,
    outcome_rx: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    /// Wait for the task to finish.
    pub async fn outcome(self) -> Result<TaskOutcome> {
        self.outcome_rx
            .await
            .map_err(|_| Error::RenderFailure("Render queue dropped the task".to_string()))
    }
}

struct RenderTask {
    page_id: u64,
    // Display data only; identity is the page id
    title: String,
    force: bool,
    outcome_tx: oneshot::Sender<TaskOutcome>,
}

/// FIFO render queue with a fixed worker pool.
pub struct RenderQueue {
    task_tx: mpsc::UnboundedSender<RenderTask>,
    shared: Arc<QueueShared>,
}

struct QueueShared {
    config: Arc<ServiceConfig>,
    client: Arc<WikiClient>,
    cache: Arc<CardCache>,
    pool: RendererPool,
    statuses: Mutex<HashMap<u64, TaskStatus>>,
}

impl RenderQueue {
    /// Spawn the worker pool. Must be called within a Tokio runtime.
    pub fn new(
        config: Arc<ServiceConfig>,
        client: Arc<WikiClient>,
        cache: Arc<CardCache>,
        factory: BackendFactory,
    ) -> Self {
        let workers = config.workers.max(1);
        let pool = RendererPool::new(workers, factory);
        let shared = Arc::new(QueueShared {
            config,
            client,
            cache,
            pool,
            statuses: Mutex::new(HashMap::new()),
        });

        let (task_tx, task_rx) = mpsc::unbounded_channel::<RenderTask>();
        let task_rx = Arc::new(tokio::sync::Mutex::new(task_rx));
        for worker in 0..workers {
            tokio::spawn(worker_loop(worker, task_rx.clone(), shared.clone()));
        }

        Self { task_tx, shared }
    }

    /// Append a task to the FIFO. Returns immediately; the render happens on
    /// a worker.
    pub fn submit(&self, page_id: u64, title: &str, force: bool) -> TaskHandle {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        self.shared.set_status(page_id, TaskStatus::Queued);

        let task = RenderTask {
            page_id,
            title: title.to_string(),
            force,
            outcome_tx,
        };

        if let Err(send_err) = self.task_tx.send(task) {
            let message = "Render queue is shut down".to_string();
            self.shared
                .set_status(page_id, TaskStatus::Failed(message.clone()));
            let _ = send_err.0.outcome_tx.send(TaskOutcome::Failed(message));
        }

        TaskHandle { page_id, outcome_rx }
    }

    /// Last observed status of the most recent task for `page_id`.
    pub fn status(&self, page_id: u64) -> Option<TaskStatus> {
        self.shared.statuses().get(&page_id).cloned()
    }

    /// Render inline and return the bytes, bypassing the cache entirely.
    /// Leases from the same pool as the workers, so inline renders and
    /// queued renders never exceed the configured capacity together.
    pub async fn render_now(&self, page_id: u64, title: &str) -> Result<Vec<u8>> {
        self.shared.render_bitmap(page_id, title).await
    }
}

async fn worker_loop(
    worker: usize,
    task_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<RenderTask>>>,
    shared: Arc<QueueShared>,
) {
    loop {
        let task = { task_rx.lock().await.recv().await };
        let Some(task) = task else {
            break;
        };
        shared.process(worker, task).await;
    }
}

impl QueueShared {
    fn statuses(&self) -> MutexGuard<'_, HashMap<u64, TaskStatus>> {
        self.statuses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_status(&self, page_id: u64, status: TaskStatus) {
        self.statuses().insert(page_id, status);
    }

    async fn process(&self, worker: usize, task: RenderTask) {
        info!(
            "Worker {} processing page {} ({}), force={}",
            worker, task.page_id, task.title, task.force
        );
        self.set_status(task.page_id, TaskStatus::Running);

        if !task.force && self.cache.has(task.page_id) {
            info!(
                "Card already rendered for page {} ({})",
                task.page_id, task.title
            );
            self.set_status(task.page_id, TaskStatus::Done);
            let _ = task.outcome_tx.send(TaskOutcome::Skipped);
            return;
        }

        match self.render_and_store(task.page_id, &task.title).await {
            Ok(()) => {
                info!("Generated card for page {} ({})", task.page_id, task.title);
                self.set_status(task.page_id, TaskStatus::Done);
                let _ = task.outcome_tx.send(TaskOutcome::Rendered);
            }
            Err(err) => {
                error!(
                    "Error generating card for page {} ({}): {}",
                    task.page_id, task.title, err
                );
                self.set_status(task.page_id, TaskStatus::Failed(err.to_string()));
                let _ = task.outcome_tx.send(TaskOutcome::Failed(err.to_string()));
            }
        }
    }

    async fn render_and_store(&self, page_id: u64, title: &str) -> Result<()> {
        let bytes = self.render_bitmap(page_id, title).await?;
        self.cache.put(page_id, &bytes)
    }

    async fn render_bitmap(&self, page_id: u64, title: &str) -> Result<Vec<u8>> {
        let meta = metadata::resolve_page(&self.client, &self.config, title).await?;
        let target = self.config.view_target(page_id, &meta.encoded_title);
        let timeout_ms = self.config.render_timeout_ms;

        let lease = self.pool.lease().await?;
        lease.renderer.navigate(&target, timeout_ms).await?;
        let bytes = lease.renderer.capture(&self.config.capture, timeout_ms).await?;
        lease.close().await?;

        Ok(bytes)
    }
}
