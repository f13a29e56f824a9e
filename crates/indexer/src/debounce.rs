use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

/// Keyed timer table coalescing rapid repeated events into one delayed
/// delivery per key.
///
/// At most one timer is pending per key; rescheduling a key cancels the old
/// timer and the latest payload wins. A zero delay delivers on the next
/// scheduling opportunity with no coalescing window.
#[derive(Clone)]
pub struct DebounceScheduler<T: Send + 'static> {
    inner: Arc<SchedulerInner<T>>,
}

struct SchedulerInner<T: Send + 'static> {
    delay: Duration,
    out: mpsc::Sender<T>,
    pending: Mutex<HashMap<PathBuf, PendingTimer>>,
    next_token: AtomicU64,
    closed: AtomicBool,
}

struct PendingTimer {
    token: u64,
    handle: JoinHandle<()>,
}

impl<T: Send + 'static> DebounceScheduler<T> {
    #[must_use]
    pub fn new(delay: Duration, out: mpsc::Sender<T>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                delay,
                out,
                pending: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Schedule `payload` for `key`, superseding any pending timer.
    ///
    /// Returns `true` when an earlier payload for the key was still pending
    /// (the caller counts that as one debounced event).
    pub fn schedule(&self, key: PathBuf, payload: T) -> bool {
        if self.inner.closed.load(Ordering::SeqCst) {
            return false;
        }

        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let task_key = key.clone();

        // Hold the table lock across spawn+insert so a zero-delay timer
        // cannot observe the table before its own entry exists.
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let superseded = pending.remove(&key).map(|old| old.handle.abort()).is_some();

        let handle = tokio::spawn(async move {
            if !inner.delay.is_zero() {
                time::sleep(inner.delay).await;
            }
            if inner.closed.load(Ordering::SeqCst) {
                return;
            }
            {
                let mut pending = inner
                    .pending
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                match pending.get(&task_key) {
                    Some(entry) if entry.token == token => {
                        pending.remove(&task_key);
                    }
                    _ => return,
                }
            }
            let _ = inner.out.send(payload).await;
        });

        pending.insert(key, PendingTimer { token, handle });
        superseded
    }

    /// Drop any pending timer for `key`. Used when a delete arrives so no
    /// stale upsert fires afterwards.
    pub fn cancel(&self, key: &Path) -> bool {
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match pending.remove(key) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, timer) in pending.drain() {
            timer.handle.abort();
        }
    }

    /// Cancel everything and refuse further deliveries, including from timers
    /// already past their sleep.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.cancel_all();
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
