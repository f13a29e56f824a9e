use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Chunker error: {0}")]
    Chunk(String),

    #[error("Embedding error: {0}")]
    Embed(String),

    #[error("Vector store error: {0}")]
    Store(String),

    /// The store itself cannot be reached. Distinct from [`PipelineError::Store`]
    /// because the orchestrator treats connectivity loss as systemic rather
    /// than a single-file failure.
    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Whether this failure invalidates continuing the current job.
    #[must_use]
    pub fn is_systemic(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn only_connectivity_loss_is_systemic() {
        assert!(PipelineError::StoreUnavailable("refused".into()).is_systemic());
        assert!(!PipelineError::Store("bad payload".into()).is_systemic());
        assert!(!PipelineError::Embed("model error".into()).is_systemic());
        assert!(!PipelineError::Chunk("parse".into()).is_systemic());
    }

    #[test]
    fn display_names_the_failing_stage() {
        let err = PipelineError::Embed("dimension mismatch".into());
        assert_eq!(err.to_string(), "Embedding error: dimension mismatch");
        let err = PipelineError::StoreUnavailable("connection refused".into());
        assert_eq!(
            err.to_string(),
            "Vector store unavailable: connection refused"
        );
    }
}
