use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Orchestrator-level job state. Exactly one value at any instant; the
/// orchestrator's command handlers serialize every transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Idle,
    Indexing,
    Paused,
    Error,
}

impl IndexState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Indexing => "indexing",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }
}

/// Cumulative progress for the current job. Survives pause/resume cycles;
/// reset only when a fresh job starts.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IndexingProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub current_file: Option<String>,
}

/// Single authoritative flag for "an indexing job is active", shared by
/// handle across components so overlapping start requests can be rejected.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGuard {
    active: Arc<AtomicBool>,
}

impl ConcurrencyGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_indexing(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Claim the flag. Returns `None` when a job is already active. The
    /// returned lease clears the flag on drop, so the cleanup runs on
    /// success, failure, and unwind alike.
    #[must_use]
    pub fn try_acquire(&self) -> Option<IndexingLease> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| IndexingLease {
                active: self.active.clone(),
            })
    }
}

#[derive(Debug)]
pub struct IndexingLease {
    active: Arc<AtomicBool>,
}

impl Drop for IndexingLease {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}
