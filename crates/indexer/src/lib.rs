//! # Codeindex Indexer
//!
//! Incremental index orchestration for a code workspace.
//!
//! ## Pipeline
//!
//! ```text
//! Raw FS events
//!     │
//!     ├──> FileChangeMonitor (classify + debounce)
//!     │      └─> Normalized change events
//!     │
//!     ├──> IndexingOrchestrator (work queue, pause/resume)
//!     │      └─> chunk → embed → upsert per file
//!     │
//!     └──> Vector store
//! ```
//!
//! Configuration edits flow through [`ConfigurationChangeDetector`]; when a
//! change invalidates the stored vectors the caller asks the orchestrator for
//! a full re-index.

mod classifier;
mod config;
mod debounce;
mod error;
mod monitor;
mod orchestrator;
mod queue;
mod scanner;
mod state;
mod stats;

pub use classifier::ChangeClassifier;
pub use config::{ConfigurationChangeDetector, ConfigurationChangeEvent, IndexerConfig};
pub use debounce::DebounceScheduler;
pub use error::{IndexerError, Result};
pub use monitor::{ChangeKind, FileChangeEvent, FileChangeMonitor, FileMonitorConfig};
pub use orchestrator::{IndexerNotice, IndexingOrchestrator};
pub use queue::{load_queue, queue_path_for_root, save_queue, PendingOp, WorkItem, WorkQueue};
pub use scanner::FileScanner;
pub use state::{ConcurrencyGuard, IndexState, IndexingLease, IndexingProgress};
pub use stats::{FileMonitorStats, IndexBatchStats, MonitorCounters};
