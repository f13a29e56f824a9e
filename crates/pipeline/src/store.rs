use crate::chunk::CodeChunk;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionInfo {
    pub vectors: usize,
    pub files: usize,
}

/// Persists and queries vectors plus chunk metadata. The similarity search
/// itself lives behind this trait and is out of scope for the indexing core.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert-or-update every vector for `path`, replacing what was there.
    async fn upsert(&self, path: &str, vectors: Vec<(CodeChunk, Vec<f32>)>) -> Result<()>;

    /// Drop all vectors for `path`. Deleting an unknown path is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    async fn delete_collection(&self) -> Result<()>;

    async fn collection_info(&self) -> Result<CollectionInfo>;
}
