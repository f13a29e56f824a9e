use crate::classifier::ChangeClassifier;
use crate::debounce::DebounceScheduler;
use crate::error::{IndexerError, Result};
use crate::scanner::FileScanner;
use crate::stats::{FileMonitorStats, MonitorCounters};
use log::{debug, warn};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Modify,
    Delete,
}

/// Normalized change event, consumed exactly once by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct FileChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub timestamp: SystemTime,
    /// True when this event superseded at least one earlier event for the
    /// same path inside the debounce window. Deletes are never debounced.
    pub debounced: bool,
}

/// Immutable monitor configuration snapshot, supplied at construction.
#[derive(Debug, Clone)]
pub struct FileMonitorConfig {
    /// Zero means immediate: no coalescing window.
    pub debounce_delay: Duration,
    /// Include globs; empty means "everything the other rules allow".
    pub patterns: Vec<String>,
    pub respect_ignore_file: bool,
    pub max_file_size: u64,
    pub skip_binary_files: bool,
}

impl Default for FileMonitorConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(500),
            patterns: Vec::new(),
            respect_ignore_file: true,
            max_file_size: 1024 * 1024,
            skip_binary_files: true,
        }
    }
}

/// Classification and debounce routing for raw notifications. Split from the
/// watcher plumbing so the routing rules are testable without a live watcher.
struct EventRouter {
    classifier: ChangeClassifier,
    scheduler: DebounceScheduler<FileChangeEvent>,
    counters: Arc<MonitorCounters>,
    // Membership set behind the watched-files count. The OS may deliver
    // duplicate notifications for a path; only genuine set changes move the
    // counter.
    watched: Mutex<HashSet<PathBuf>>,
    events_tx: mpsc::Sender<FileChangeEvent>,
    closed: AtomicBool,
}

impl EventRouter {
    async fn route(&self, kind: ChangeKind, path: PathBuf) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        if kind == ChangeKind::Delete {
            // A deleted file cannot be stat'd, so deletes skip classification
            // entirely, and any pending upsert for the path must not fire.
            self.scheduler.cancel(&path);
            self.counters.record_delete();
            if lock(&self.watched).remove(&path) {
                self.counters.remove_watched();
            }
            let event = FileChangeEvent {
                kind,
                path,
                timestamp: SystemTime::now(),
                debounced: false,
            };
            if !self.closed.load(Ordering::SeqCst) {
                let _ = self.events_tx.send(event).await;
            }
            return;
        }

        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return,
            Err(err) => {
                debug!("Dropped event for unreadable {}: {err}", path.display());
                return;
            }
        };
        if !self.classifier.should_process(&path, size) {
            return;
        }

        match kind {
            ChangeKind::Create => self.counters.record_create(),
            ChangeKind::Modify => self.counters.record_change(),
            ChangeKind::Delete => unreachable!("deletes handled above"),
        }
        if lock(&self.watched).insert(path.clone()) {
            self.counters.add_watched();
        }

        // The last event inside the window wins: cancel-then-schedule keeps
        // the freshest kind and marks the survivor as debounced.
        let superseded = self.scheduler.cancel(&path);
        if superseded {
            self.counters.record_debounced();
        }
        let event = FileChangeEvent {
            kind,
            path: path.clone(),
            timestamp: SystemTime::now(),
            debounced: superseded,
        };
        self.scheduler.schedule(path, event);
    }
}

/// Watches a workspace root for file changes, filters them through the
/// classifier, debounces create/modify per path, and emits normalized
/// [`FileChangeEvent`]s.
///
/// State machine: `Stopped -> Watching -> Stopped` via [`FileChangeMonitor::start`],
/// [`FileChangeMonitor::stop`] and [`FileChangeMonitor::dispose`].
pub struct FileChangeMonitor {
    root: PathBuf,
    router: Arc<EventRouter>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    watching: AtomicBool,
}

impl FileChangeMonitor {
    /// Build a monitor plus the receiving end of its event stream.
    pub fn new(
        root: impl Into<PathBuf>,
        config: FileMonitorConfig,
    ) -> Result<(Self, mpsc::Receiver<FileChangeEvent>)> {
        let root = root.into();
        let classifier = ChangeClassifier::new(&root, &config)?;
        let (events_tx, events_rx) = mpsc::channel(256);
        let scheduler = DebounceScheduler::new(config.debounce_delay, events_tx.clone());

        let monitor = Self {
            root,
            router: Arc::new(EventRouter {
                classifier,
                scheduler,
                counters: Arc::new(MonitorCounters::new(0)),
                watched: Mutex::new(HashSet::new()),
                events_tx,
                closed: AtomicBool::new(false),
            }),
            watcher: Mutex::new(None),
            loop_handle: Mutex::new(None),
            watching: AtomicBool::new(false),
        };
        Ok((monitor, events_rx))
    }

    /// Establish the watch and start routing notifications.
    ///
    /// Failure to establish the underlying watch (permissions, missing root)
    /// is fatal and surfaces here; later per-event errors are only logged.
    pub fn start(&self) -> Result<()> {
        if self.watching.swap(true, Ordering::SeqCst) {
            return Err(IndexerError::InvalidState {
                state: "watching",
                action: "start",
            });
        }

        let initial: HashSet<PathBuf> = FileScanner::new(&self.root)
            .scan(&self.router.classifier)
            .into_iter()
            .collect();
        self.router.counters.set_watched_files(initial.len());
        *lock(&self.router.watched) = initial;

        let (raw_tx, mut raw_rx) = mpsc::channel::<notify::Result<Event>>(1024);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = raw_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )
        .inspect_err(|_| self.watching.store(false, Ordering::SeqCst))?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .inspect_err(|_| self.watching.store(false, Ordering::SeqCst))?;

        let router = self.router.clone();
        let handle = tokio::spawn(async move {
            while let Some(result) = raw_rx.recv().await {
                match result {
                    Ok(event) => {
                        let Some(kind) = map_event_kind(&event.kind) else {
                            continue;
                        };
                        for path in event.paths {
                            router.route(kind, path).await;
                        }
                    }
                    Err(err) => warn!("Watcher error: {err}"),
                }
            }
        });

        *lock(&self.watcher) = Some(watcher);
        *lock(&self.loop_handle) = Some(handle);
        Ok(())
    }

    /// Stop watching. Pending debounce timers are cancelled; the monitor can
    /// be started again.
    pub fn stop(&self) {
        self.watching.store(false, Ordering::SeqCst);
        lock(&self.watcher).take();
        self.router.scheduler.cancel_all();
    }

    /// Stop permanently. No events are emitted after dispose, even for
    /// notifications already in flight.
    pub fn dispose(&self) {
        self.router.closed.store(true, Ordering::SeqCst);
        self.router.scheduler.shutdown();
        self.watching.store(false, Ordering::SeqCst);
        lock(&self.watcher).take();
        if let Some(handle) = lock(&self.loop_handle).take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stats(&self) -> FileMonitorStats {
        self.router.counters.snapshot()
    }
}

impl Drop for FileChangeMonitor {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn map_event_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Modify(_) => Some(ChangeKind::Modify),
        EventKind::Remove(_) => Some(ChangeKind::Delete),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
