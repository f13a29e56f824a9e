use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One indexable unit of a source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeChunk {
    /// Workspace-relative path, `/`-separated on every platform.
    pub path: String,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl CodeChunk {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            start_line: 1,
            end_line: 1,
            language: None,
        }
    }
}

/// Splits file content into indexable units.
#[async_trait]
pub trait Chunker: Send + Sync {
    /// Failures propagate per-file; the caller decides whether to continue.
    async fn chunk(&self, relative_path: &str, content: &str) -> Result<Vec<CodeChunk>>;
}

/// Turns text into a vector. May fail or time out; any failure is a per-file
/// failure at the call site.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
