//! # Codeindex Pipeline
//!
//! Collaborator boundary for the indexing core: the chunk → embed → store
//! pipeline is consumed through the traits defined here, never implemented
//! here.
//!
//! ```text
//! File content
//!     │
//!     ├──> Chunker
//!     │      └─> Code chunks
//!     │
//!     ├──> EmbeddingProvider
//!     │      └─> Vectors
//!     │
//!     └──> VectorStore (upsert / delete)
//! ```

mod chunk;
mod error;
mod store;

pub use chunk::{Chunker, CodeChunk, EmbeddingProvider};
pub use error::{PipelineError, Result};
pub use store::{CollectionInfo, VectorStore};
