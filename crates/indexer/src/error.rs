use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Pipeline error: {0}")]
    PipelineError(#[from] codeindex_pipeline::PipelineError),

    #[error("cannot {action} while {state}")]
    InvalidState {
        state: &'static str,
        action: &'static str,
    },

    #[error("Malformed configuration: {0}")]
    MalformedConfig(String),

    #[error("Invalid workspace path: {0}")]
    InvalidPath(String),
}
