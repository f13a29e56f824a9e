use crate::classifier::ChangeClassifier;
use crate::error::{IndexerError, Result};
use crate::monitor::{ChangeKind, FileChangeEvent, FileMonitorConfig};
use crate::queue::{self, PendingOp, WorkItem, WorkQueue};
use crate::scanner::FileScanner;
use crate::state::{ConcurrencyGuard, IndexState, IndexingLease, IndexingProgress};
use crate::stats::IndexBatchStats;
use codeindex_pipeline::{Chunker, EmbeddingProvider, PipelineError, VectorStore};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, Mutex as TokioMutex};

/// Consecutive failed attempts against the vector store before the job is
/// declared systemically broken.
const SYSTEMIC_FAILURE_THRESHOLD: usize = 3;
const STORE_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// User-facing notifications for the UI/message boundary.
#[derive(Debug, Clone)]
pub enum IndexerNotice {
    AlreadyRunning,
    ReindexStarted,
    FileFailed { path: String, error: String },
    BatchCompleted(IndexBatchStats),
    SystemicFailure { error: String },
}

impl IndexerNotice {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::AlreadyRunning => "An indexing operation is already running.".to_string(),
            Self::ReindexStarted => "Configuration changed. Re-indexing workspace…".to_string(),
            Self::FileFailed { path, error } => format!("Failed to index {path}: {error}"),
            Self::BatchCompleted(stats) => {
                format!("Indexed {} files ({} failed)", stats.files, stats.failures)
            }
            Self::SystemicFailure { error } => format!("Indexing stopped: {error}"),
        }
    }
}

/// The central state machine: consumes normalized change events and explicit
/// commands, drives the persisted work queue through the chunk → embed →
/// store pipeline, and reports state and progress.
///
/// `Idle --start--> Indexing --pause--> Paused --resume--> Indexing
/// --drained--> Idle`; systemic failures land in `Error` until an explicit
/// restart.
#[derive(Clone)]
pub struct IndexingOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    queue_path: PathBuf,
    monitor_config: FileMonitorConfig,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    guard: ConcurrencyGuard,
    // Every state transition happens under this lock, so transitions are
    // serialized and the guard lease is acquired/released atomically with
    // the matching queue mutation.
    core: TokioMutex<Core>,
    state_tx: watch::Sender<IndexState>,
    pause_requested: AtomicBool,
    notice_tx: broadcast::Sender<IndexerNotice>,
}

struct Core {
    queue: WorkQueue,
    progress: IndexingProgress,
}

impl IndexingOrchestrator {
    pub fn new(
        root: impl AsRef<Path>,
        monitor_config: FileMonitorConfig,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            return Err(IndexerError::InvalidPath(format!(
                "Path does not exist: {}",
                root.display()
            )));
        }

        let queue_path = queue::queue_path_for_root(&root);

        // A non-empty snapshot left behind by a pause (or a dispose mid-drain)
        // means the previous run has pending work; come up paused so a resume
        // continues from the same queue.
        let initial_state = match std::fs::read(&queue_path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<WorkItem>>(&bytes) {
                Ok(items) if !items.is_empty() => IndexState::Paused,
                _ => IndexState::Idle,
            },
            Err(_) => IndexState::Idle,
        };

        let (state_tx, _) = watch::channel(initial_state);
        let (notice_tx, _) = broadcast::channel(32);

        Ok(Self {
            inner: Arc::new(Inner {
                queue_path,
                root,
                monitor_config,
                chunker,
                embedder,
                store,
                guard: ConcurrencyGuard::new(),
                core: TokioMutex::new(Core {
                    queue: WorkQueue::new(),
                    progress: IndexingProgress::default(),
                }),
                state_tx,
                pause_requested: AtomicBool::new(false),
                notice_tx,
            }),
        })
    }

    #[must_use]
    pub fn index_state(&self) -> IndexState {
        *self.inner.state_tx.borrow()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<IndexState> {
        self.inner.state_tx.subscribe()
    }

    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<IndexerNotice> {
        self.inner.notice_tx.subscribe()
    }

    /// The cross-component "is a job active" flag, shared by handle.
    #[must_use]
    pub fn guard(&self) -> ConcurrencyGuard {
        self.inner.guard.clone()
    }

    pub async fn progress(&self) -> IndexingProgress {
        self.inner.core.lock().await.progress.clone()
    }

    /// Seed the queue with upserts for `initial_files` and start draining.
    ///
    /// Rejected while a job is active (with an [`IndexerNotice::AlreadyRunning`]
    /// notice) and while paused — a paused job owns the persisted queue and
    /// must be resumed instead.
    pub async fn start_indexing(&self, initial_files: Vec<PathBuf>) -> Result<()> {
        let mut core = self.inner.core.lock().await;
        if self.index_state() == IndexState::Paused {
            return Err(IndexerError::InvalidState {
                state: "paused",
                action: "start",
            });
        }
        let Some(lease) = self.inner.guard.try_acquire() else {
            let _ = self.inner.notice_tx.send(IndexerNotice::AlreadyRunning);
            return Err(IndexerError::InvalidState {
                state: "indexing",
                action: "start",
            });
        };

        core.queue.clear();
        for path in &initial_files {
            core.queue
                .enqueue(normalize_path(&self.inner.root, path), PendingOp::Upsert);
        }
        core.progress = IndexingProgress {
            files_processed: 0,
            total_files: core.queue.len(),
            current_file: None,
        };
        self.inner.pause_requested.store(false, Ordering::SeqCst);
        self.inner.state_tx.send_replace(IndexState::Indexing);
        info!(
            "Indexing started with {} files at {}",
            core.queue.len(),
            self.inner.root.display()
        );
        drop(core);

        self.spawn_drain(lease);
        Ok(())
    }

    /// Request a pause. The drain loop observes the flag at its next file
    /// boundary — a file's chunk/embed/store sequence is never interrupted
    /// partway.
    pub async fn pause_indexing(&self) -> Result<()> {
        let current = self.index_state();
        if current != IndexState::Indexing {
            return Err(IndexerError::InvalidState {
                state: current.as_str(),
                action: "pause",
            });
        }
        self.inner.pause_requested.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Reload the persisted queue and continue draining. Progress is
    /// cumulative: it is never reset by a resume.
    pub async fn resume_indexing(&self) -> Result<()> {
        let mut core = self.inner.core.lock().await;
        let current = self.index_state();
        if current != IndexState::Paused {
            return Err(IndexerError::InvalidState {
                state: current.as_str(),
                action: "resume",
            });
        }
        let Some(lease) = self.inner.guard.try_acquire() else {
            let _ = self.inner.notice_tx.send(IndexerNotice::AlreadyRunning);
            return Err(IndexerError::InvalidState {
                state: "indexing",
                action: "resume",
            });
        };

        core.queue = queue::load_queue(&self.inner.queue_path).await?;
        core.progress.total_files = core.progress.files_processed + core.queue.len();
        self.inner.pause_requested.store(false, Ordering::SeqCst);
        self.inner.state_tx.send_replace(IndexState::Indexing);
        info!("Indexing resumed with {} items pending", core.queue.len());
        drop(core);

        self.spawn_drain(lease);
        Ok(())
    }

    /// Feed one normalized change event into the queue. Arriving while idle
    /// auto-starts a drain; while in `Error`, events are queued but draining
    /// waits for an explicit restart.
    pub async fn enqueue_change(&self, event: FileChangeEvent) -> Result<()> {
        let relative = normalize_path(&self.inner.root, &event.path);
        let op = match event.kind {
            ChangeKind::Delete => PendingOp::Delete,
            ChangeKind::Create | ChangeKind::Modify => PendingOp::Upsert,
        };

        let mut core = self.inner.core.lock().await;
        let appended = core.queue.enqueue(relative, op);

        match self.index_state() {
            IndexState::Indexing => {
                if appended {
                    core.progress.total_files += 1;
                }
            }
            IndexState::Paused => {
                if appended {
                    core.progress.total_files += 1;
                }
                // Keep the on-disk snapshot current so a resume after a
                // process restart does not lose this event.
                if let Err(err) = queue::save_queue(&self.inner.queue_path, &core.queue).await {
                    warn!("Failed to persist work queue while paused: {err}");
                }
            }
            IndexState::Error => {}
            IndexState::Idle => {
                if let Some(lease) = self.inner.guard.try_acquire() {
                    core.progress = IndexingProgress {
                        files_processed: 0,
                        total_files: core.queue.len(),
                        current_file: None,
                    };
                    self.inner.pause_requested.store(false, Ordering::SeqCst);
                    self.inner.state_tx.send_replace(IndexState::Indexing);
                    drop(core);
                    self.spawn_drain(lease);
                }
            }
        }
        Ok(())
    }

    /// Discard the incremental queue, drop the stored collection, and re-seed
    /// from a full workspace scan. Used when a configuration change has
    /// invalidated the existing index.
    pub async fn trigger_full_reindex(&self) -> Result<()> {
        let mut core = self.inner.core.lock().await;
        let Some(lease) = self.inner.guard.try_acquire() else {
            let _ = self.inner.notice_tx.send(IndexerNotice::AlreadyRunning);
            return Err(IndexerError::InvalidState {
                state: "indexing",
                action: "full reindex",
            });
        };

        self.inner.store.delete_collection().await?;

        let classifier = ChangeClassifier::new(&self.inner.root, &self.inner.monitor_config)?;
        let files = FileScanner::new(&self.inner.root).scan(&classifier);

        core.queue.clear();
        for path in &files {
            core.queue
                .enqueue(normalize_path(&self.inner.root, path), PendingOp::Upsert);
        }
        core.progress = IndexingProgress {
            files_processed: 0,
            total_files: core.queue.len(),
            current_file: None,
        };
        if let Err(err) = queue::save_queue(&self.inner.queue_path, &core.queue).await {
            warn!("Failed to persist re-seeded work queue: {err}");
        }

        let _ = self.inner.notice_tx.send(IndexerNotice::ReindexStarted);
        self.inner.pause_requested.store(false, Ordering::SeqCst);
        self.inner.state_tx.send_replace(IndexState::Indexing);
        info!("Full re-index started: {} files", core.queue.len());
        drop(core);

        self.spawn_drain(lease);
        Ok(())
    }

    /// Implicit pause: persist pending work before in-memory state goes away,
    /// so a future resume (even after restart) loses nothing.
    pub async fn dispose(&self) {
        if self.index_state() == IndexState::Indexing {
            self.inner.pause_requested.store(true, Ordering::SeqCst);
            let mut state_rx = self.subscribe_state();
            while *state_rx.borrow() == IndexState::Indexing {
                if state_rx.changed().await.is_err() {
                    break;
                }
            }
            return;
        }

        let core = self.inner.core.lock().await;
        if !core.queue.is_empty() {
            if let Err(err) = queue::save_queue(&self.inner.queue_path, &core.queue).await {
                warn!("Failed to persist work queue on dispose: {err}");
            }
        }
    }

    fn spawn_drain(&self, lease: IndexingLease) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            drain(inner, lease).await;
        });
    }
}

/// Drain the queue one item at a time, strictly FIFO. The pause flag is
/// checked between items; every exit path releases the guard lease under the
/// core lock so command handlers never observe a half-finished transition.
async fn drain(inner: Arc<Inner>, lease: IndexingLease) {
    let started = Instant::now();
    let mut batch = IndexBatchStats::default();
    let mut consecutive_store_failures = 0usize;

    loop {
        if inner.pause_requested.swap(false, Ordering::SeqCst) {
            let mut core = inner.core.lock().await;
            core.progress.current_file = None;
            if let Err(err) = queue::save_queue(&inner.queue_path, &core.queue).await {
                warn!("Failed to persist work queue on pause: {err}");
            }
            info!("Indexing paused with {} items pending", core.queue.len());
            inner.state_tx.send_replace(IndexState::Paused);
            drop(lease);
            return;
        }

        let item = {
            let mut core = inner.core.lock().await;
            match core.queue.pop_front() {
                Some(item) => {
                    core.progress.current_file = Some(item.path.clone());
                    item
                }
                None => {
                    core.progress.current_file = None;
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        batch.time_ms = started.elapsed().as_millis() as u64;
                    }
                    info!(
                        "Indexing finished: {} files, {} failures in {}ms",
                        batch.files, batch.failures, batch.time_ms
                    );
                    inner.state_tx.send_replace(IndexState::Idle);
                    let _ = inner.notice_tx.send(IndexerNotice::BatchCompleted(batch));
                    drop(lease);
                    return;
                }
            }
        };

        match process_item(&inner, &item).await {
            Ok(()) => {
                consecutive_store_failures = 0;
                let mut core = inner.core.lock().await;
                core.progress.files_processed += 1;
                batch.add_file();
            }
            Err(err) if err.is_systemic() => {
                consecutive_store_failures += 1;
                let mut core = inner.core.lock().await;
                core.queue.requeue_front(item);
                if consecutive_store_failures >= SYSTEMIC_FAILURE_THRESHOLD {
                    core.progress.current_file = None;
                    if let Err(persist_err) =
                        queue::save_queue(&inner.queue_path, &core.queue).await
                    {
                        warn!("Failed to persist work queue on failure: {persist_err}");
                    }
                    error!("Systemic failure, indexing halted: {err}");
                    inner.state_tx.send_replace(IndexState::Error);
                    let _ = inner.notice_tx.send(IndexerNotice::SystemicFailure {
                        error: err.to_string(),
                    });
                    drop(lease);
                    return;
                }
                drop(core);
                tokio::time::sleep(STORE_RETRY_BACKOFF).await;
            }
            Err(err) => {
                warn!("Failed to index {}: {err}", item.path);
                batch.add_error(format!("{}: {err}", item.path));
                let _ = inner.notice_tx.send(IndexerNotice::FileFailed {
                    path: item.path.clone(),
                    error: err.to_string(),
                });
            }
        }
    }
}

/// One file through the pipeline. Deletes go straight to the store; upserts
/// run read → chunk → embed → upsert.
async fn process_item(inner: &Inner, item: &WorkItem) -> codeindex_pipeline::Result<()> {
    match item.op {
        PendingOp::Delete => inner.store.delete(&item.path).await,
        PendingOp::Upsert => {
            let absolute = inner.root.join(&item.path);
            let content = tokio::fs::read_to_string(&absolute)
                .await
                .map_err(|e| PipelineError::Other(format!("read failed: {e}")))?;

            let chunks = inner.chunker.chunk(&item.path, &content).await?;
            if chunks.is_empty() {
                return Ok(());
            }

            let mut vectors = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                let embedding = inner.embedder.embed(&chunk.content).await?;
                vectors.push((chunk, embedding));
            }
            inner.store.upsert(&item.path, vectors).await
        }
    }
}

fn normalize_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut normalized = relative.to_string_lossy().to_string();
    if normalized.contains('\\') {
        normalized = normalized.replace('\\', "/");
    }
    normalized
}
