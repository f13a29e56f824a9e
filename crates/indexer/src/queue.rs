use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

const QUEUE_FILE_NAME: &str = "work_queue.json";

/// Pending operation for a queued path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PendingOp {
    Upsert,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkItem {
    pub path: String,
    pub op: PendingOp,
}

/// Ordered pending work, one entry per path.
///
/// FIFO by enqueue time; re-enqueueing a path keeps its original position and
/// replaces the operation payload, so hot files never grow the queue and
/// unrelated files never get reordered.
#[derive(Debug, Default)]
pub struct WorkQueue {
    order: VecDeque<String>,
    ops: HashMap<String, PendingOp>,
}

impl WorkQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when a new entry was appended, `false` when an existing
    /// entry had its operation replaced in place.
    pub fn enqueue(&mut self, path: impl Into<String>, op: PendingOp) -> bool {
        let path = path.into();
        match self.ops.insert(path.clone(), op) {
            Some(_) => false,
            None => {
                self.order.push_back(path);
                true
            }
        }
    }

    pub fn pop_front(&mut self) -> Option<WorkItem> {
        let path = self.order.pop_front()?;
        let op = self.ops.remove(&path)?;
        Some(WorkItem { path, op })
    }

    /// Put an item back at the head, e.g. after a store outage interrupted
    /// its processing. If a newer operation for the path was enqueued while
    /// the item was in flight, the newer one wins and the stale item is
    /// dropped.
    pub fn requeue_front(&mut self, item: WorkItem) {
        if self.ops.contains_key(&item.path) {
            return;
        }
        self.ops.insert(item.path.clone(), item.op);
        self.order.push_front(item.path);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.ops.clear();
    }

    /// Snapshot in queue order, sufficient to reconstruct pending work after
    /// a process restart.
    #[must_use]
    pub fn items(&self) -> Vec<WorkItem> {
        self.order
            .iter()
            .filter_map(|path| {
                self.ops.get(path).map(|op| WorkItem {
                    path: path.clone(),
                    op: *op,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn from_items(items: Vec<WorkItem>) -> Self {
        let mut queue = Self::new();
        for item in items {
            queue.enqueue(item.path, item.op);
        }
        queue
    }
}

#[must_use]
pub fn queue_path_for_root(root: &Path) -> PathBuf {
    root.join(".codeindex").join(QUEUE_FILE_NAME)
}

/// Persist the queue snapshot. Written via tmp-then-rename so a crash never
/// leaves a truncated snapshot behind.
pub async fn save_queue(path: &Path, queue: &WorkQueue) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(&queue.items())?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Load a persisted snapshot; a missing file is an empty queue.
pub async fn load_queue(path: &Path) -> Result<WorkQueue> {
    if !path.exists() {
        return Ok(WorkQueue::new());
    }
    let bytes = tokio::fs::read(path).await?;
    let items: Vec<WorkItem> = serde_json::from_slice(&bytes)?;
    Ok(WorkQueue::from_items(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn re_enqueue_replaces_op_and_keeps_position() {
        let mut queue = WorkQueue::new();
        assert_eq!(queue.enqueue("a.rs", PendingOp::Upsert), true);
        assert_eq!(queue.enqueue("b.rs", PendingOp::Upsert), true);
        assert_eq!(queue.enqueue("a.rs", PendingOp::Delete), false);

        assert_eq!(queue.len(), 2);
        assert_eq!(
            queue.pop_front(),
            Some(WorkItem {
                path: "a.rs".to_string(),
                op: PendingOp::Delete,
            })
        );
        assert_eq!(
            queue.pop_front(),
            Some(WorkItem {
                path: "b.rs".to_string(),
                op: PendingOp::Upsert,
            })
        );
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn requeue_front_goes_to_the_head() {
        let mut queue = WorkQueue::new();
        queue.enqueue("a.rs", PendingOp::Upsert);
        queue.enqueue("b.rs", PendingOp::Upsert);
        let first = queue.pop_front().unwrap();
        queue.requeue_front(first.clone());

        assert_eq!(queue.pop_front(), Some(first));
    }

    #[test]
    fn requeue_front_yields_to_a_newer_pending_op() {
        let mut queue = WorkQueue::new();
        queue.enqueue("a.rs", PendingOp::Upsert);
        let in_flight = queue.pop_front().unwrap();

        // The file was deleted while its upsert was in flight; putting the
        // stale upsert back must not clobber the pending delete.
        queue.enqueue("a.rs", PendingOp::Delete);
        queue.requeue_front(in_flight);

        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue.pop_front(),
            Some(WorkItem {
                path: "a.rs".to_string(),
                op: PendingOp::Delete,
            })
        );
    }

    #[tokio::test]
    async fn persisted_snapshot_reconstructs_pending_work() {
        let dir = TempDir::new().unwrap();
        let path = queue_path_for_root(dir.path());

        let mut queue = WorkQueue::new();
        queue.enqueue("src/a.rs", PendingOp::Upsert);
        queue.enqueue("src/b.rs", PendingOp::Delete);
        save_queue(&path, &queue).await.unwrap();

        let mut restored = load_queue(&path).await.unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.pop_front().unwrap().path, "src/a.rs");
        assert_eq!(restored.pop_front().unwrap().op, PendingOp::Delete);
    }

    #[tokio::test]
    async fn missing_snapshot_is_an_empty_queue() {
        let dir = TempDir::new().unwrap();
        let queue = load_queue(&queue_path_for_root(dir.path())).await.unwrap();
        assert!(queue.is_empty());
    }
}
