//! Pipeline-level error aggregation
//!
//! Wraps the per-layer errors and centralizes the retry classification the
//! coordinator acts on.

use glyph_chain::ChainError;
use glyph_render::RenderError;
use glyph_storage::StorageError;

/// Any failure the materialization pipeline can surface
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Chain read layer failure
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Render layer failure
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Storage layer failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Malformed trigger input; the only failure a trigger can produce
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The generation queue is full
    #[error("generation queue is saturated")]
    Saturated,

    /// The coordinator has shut down
    #[error("coordinator is shut down")]
    ShutDown,
}

impl PipelineError {
    /// Whether the whole job may be re-run (fresh session, backoff).
    ///
    /// Transient chain reads and session-level render failures qualify.
    /// Upload failures do not: the publisher already retried each artifact
    /// independently, and re-running the job would repeat the expensive
    /// render just to retry an upload. Assembly and extraction-validation
    /// failures are generation bugs and never auto-retried.
    #[inline]
    #[must_use]
    pub fn is_job_retryable(&self) -> bool {
        match self {
            Self::Chain(e) => e.is_retryable(),
            Self::Render(e) => e.is_session_retryable() || e.is_trace_retryable(),
            Self::Storage(_) => false,
            Self::InvalidInput(_) | Self::Saturated | Self::ShutDown => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn retry_classification() {
        assert!(PipelineError::from(ChainError::transient("x", "io")).is_job_retryable());
        assert!(PipelineError::from(RenderError::Timeout {
            deadline: Duration::from_secs(1)
        })
        .is_job_retryable());
        // Upload retries happen inside the publisher; a failed publish must
        // not repeat the render.
        assert!(!PipelineError::from(StorageError::upload("k", "503")).is_job_retryable());

        assert!(!PipelineError::from(ChainError::Assembly("bad marker".into())).is_job_retryable());
        assert!(
            !PipelineError::from(RenderError::ExtractionValidation("empty".into()))
                .is_job_retryable()
        );
        assert!(!PipelineError::InvalidInput("bad event".into()).is_job_retryable());
    }
}
