use crate::error::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Snapshot of the user-facing indexer configuration. The detector does not
/// own configuration storage; it only compares two snapshots handed to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexerConfig {
    pub embedding_provider: String,
    pub embedding_model: String,
    pub store_endpoint: String,
    pub store_collection: String,
    pub max_results: usize,
    pub log_level: String,
    pub show_progress: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            embedding_provider: "openai".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            store_endpoint: "http://localhost:6333".to_string(),
            store_collection: "workspace".to_string(),
            max_results: 20,
            log_level: "info".to_string(),
            show_progress: true,
        }
    }
}

/// One changed configuration section. Transient: produced per detection,
/// consumed immediately, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationChangeEvent {
    pub section: &'static str,
    pub requires_reindex: bool,
    pub timestamp: SystemTime,
}

/// Maps changed configuration sections to "does the existing index survive".
///
/// Identity-level sections (provider, model, store endpoint/collection)
/// invalidate every stored vector; presentation-level sections do not.
pub struct ConfigurationChangeDetector;

impl ConfigurationChangeDetector {
    /// Compare two snapshots field by field, one event per changed field.
    ///
    /// Malformed snapshots fail fast: an indeterminate configuration must
    /// never be treated as "no change".
    pub fn detect(
        previous: &IndexerConfig,
        new: &IndexerConfig,
    ) -> Result<Vec<ConfigurationChangeEvent>> {
        validate(previous)?;
        validate(new)?;

        let now = SystemTime::now();
        let mut events = Vec::new();
        let mut push = |section: &'static str, requires_reindex: bool| {
            events.push(ConfigurationChangeEvent {
                section,
                requires_reindex,
                timestamp: now,
            });
        };

        if previous.embedding_provider != new.embedding_provider {
            push("embedding_provider", true);
        }
        if previous.embedding_model != new.embedding_model {
            push("embedding_model", true);
        }
        if previous.store_endpoint != new.store_endpoint {
            push("store_endpoint", true);
        }
        if previous.store_collection != new.store_collection {
            push("store_collection", true);
        }
        if previous.max_results != new.max_results {
            push("max_results", false);
        }
        if previous.log_level != new.log_level {
            push("log_level", false);
        }
        if previous.show_progress != new.show_progress {
            push("show_progress", false);
        }

        Ok(events)
    }

    /// The caller's fold: any reindex-triggering change mandates a full
    /// re-index.
    #[must_use]
    pub fn requires_reindex(events: &[ConfigurationChangeEvent]) -> bool {
        events.iter().any(|event| event.requires_reindex)
    }
}

fn validate(config: &IndexerConfig) -> Result<()> {
    let required = [
        ("embedding_provider", &config.embedding_provider),
        ("embedding_model", &config.embedding_model),
        ("store_endpoint", &config.store_endpoint),
        ("store_collection", &config.store_collection),
    ];
    for (section, value) in required {
        if value.trim().is_empty() {
            return Err(IndexerError::MalformedConfig(format!(
                "{section} must not be empty"
            )));
        }
    }
    Ok(())
}
