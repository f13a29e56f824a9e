use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::SystemTime;

/// Snapshot of monitor activity, taken via [`MonitorCounters::snapshot`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileMonitorStats {
    pub watched_files: usize,
    pub change_events: u64,
    pub create_events: u64,
    pub delete_events: u64,
    pub debounced_events: u64,
    pub start_time: SystemTime,
}

/// Live counters owned by the file-change monitor. Incremented as events are
/// classified and dispatched, readable at any time.
#[derive(Debug)]
pub struct MonitorCounters {
    watched_files: AtomicUsize,
    change_events: AtomicU64,
    create_events: AtomicU64,
    delete_events: AtomicU64,
    debounced_events: AtomicU64,
    start_time: SystemTime,
}

impl MonitorCounters {
    #[must_use]
    pub fn new(watched_files: usize) -> Self {
        Self {
            watched_files: AtomicUsize::new(watched_files),
            change_events: AtomicU64::new(0),
            create_events: AtomicU64::new(0),
            delete_events: AtomicU64::new(0),
            debounced_events: AtomicU64::new(0),
            start_time: SystemTime::now(),
        }
    }

    pub fn set_watched_files(&self, count: usize) {
        self.watched_files.store(count, Ordering::Relaxed);
    }

    pub fn record_create(&self) {
        self.create_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_change(&self) {
        self.change_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.delete_events.fetch_add(1, Ordering::Relaxed);
    }

    // Watched-file tracking is separate from event counting: the router only
    // calls these on genuine membership changes, so duplicate notifications
    // for a path never skew the count.
    pub fn add_watched(&self) {
        self.watched_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remove_watched(&self) {
        let _ = self
            .watched_files
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    pub fn record_debounced(&self) {
        self.debounced_events.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> FileMonitorStats {
        FileMonitorStats {
            watched_files: self.watched_files.load(Ordering::Relaxed),
            change_events: self.change_events.load(Ordering::Relaxed),
            create_events: self.create_events.load(Ordering::Relaxed),
            delete_events: self.delete_events.load(Ordering::Relaxed),
            debounced_events: self.debounced_events.load(Ordering::Relaxed),
            start_time: self.start_time,
        }
    }
}

/// Outcome of one drain of the work queue.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IndexBatchStats {
    pub files: usize,
    pub failures: usize,
    pub time_ms: u64,
    pub errors: Vec<String>,
}

impl IndexBatchStats {
    pub fn add_file(&mut self) {
        self.files += 1;
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.failures += 1;
        self.errors.push(error.into());
    }
}
