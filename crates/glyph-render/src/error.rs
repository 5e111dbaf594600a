//! Render-side error taxonomy
//!
//! The distinction that matters to the job scheduler: timeouts and sandbox
//! crashes kill the session but the job may be re-enqueued with a fresh one
//! (bounded); extraction validation failures are generation bugs and are
//! never auto-retried; trace failures are cheap to retry independently of
//! the expensive render step.

use std::time::Duration;

/// Errors produced while rendering a token
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The session exceeded its hard deadline and was torn down
    #[error("render session exceeded deadline of {deadline:?}")]
    Timeout {
        /// Configured hard deadline
        deadline: Duration,
    },

    /// The sandbox process failed to start, crashed, or produced
    /// unreadable output
    #[error("sandbox failure: {0}")]
    Sandbox(String),

    /// Illegal session state transition
    #[error("invalid session transition: {0}")]
    Session(String),

    /// Harness document could not be composed
    #[error("harness build failed: {0}")]
    Harness(String),

    /// Raw extraction failed structural validation
    #[error("extraction validation failed: {0}")]
    ExtractionValidation(String),

    /// Vector tracing failed
    #[error("vector trace failed: {0}")]
    Trace(String),

    /// The render pool is shut down
    #[error("render pool closed")]
    PoolClosed,
}

impl RenderError {
    /// Whether the job may be re-enqueued with a fresh session
    #[inline]
    #[must_use]
    pub fn is_session_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Sandbox(_))
    }

    /// Whether this failure can be retried without re-rendering
    #[inline]
    #[must_use]
    pub fn is_trace_retryable(&self) -> bool {
        matches!(self, Self::Trace(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_session_retryable() {
        let err = RenderError::Timeout {
            deadline: Duration::from_secs(120),
        };
        assert!(err.is_session_retryable());
    }

    #[test]
    fn extraction_validation_is_terminal() {
        let err = RenderError::ExtractionValidation("empty frame history".to_string());
        assert!(!err.is_session_retryable());
        assert!(!err.is_trace_retryable());
    }

    #[test]
    fn trace_retries_without_render() {
        assert!(RenderError::Trace("bad png".to_string()).is_trace_retryable());
        assert!(!RenderError::Sandbox("crash".to_string()).is_trace_retryable());
    }
}
