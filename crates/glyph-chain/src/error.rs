//! Error types for chain reads
//!
//! Two classes matter downstream: transient fetch failures (retryable at the
//! job boundary) and assembly/decoding failures (fatal, indicate a
//! data-integrity problem upstream and are never auto-retried).

/// Errors produced by the chain read layer
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// A network-level read failed; safe to retry with backoff
    #[error("transient fetch failure ({what}): {reason}")]
    TransientFetch {
        /// What was being fetched
        what: String,
        /// Underlying failure description
        reason: String,
    },

    /// Shard ordering, marker, or decoding failure
    #[error("shard assembly failed: {0}")]
    Assembly(String),

    /// The chain returned a structurally invalid payload
    #[error("malformed chain response: {0}")]
    InvalidResponse(String),

    /// A supplied seed hash could not be interpreted
    #[error("invalid seed hash: {0}")]
    InvalidSeedHash(String),
}

impl ChainError {
    /// Transient fetch error for a named read
    #[inline]
    pub fn transient(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::TransientFetch {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error is safe to retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFetch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable() {
        let err = ChainError::transient("shard 0x01", "connection reset");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("shard 0x01"));
    }

    #[test]
    fn assembly_is_not_retryable() {
        let err = ChainError::Assembly("duplicate index 2".to_string());
        assert!(!err.is_retryable());
    }
}
