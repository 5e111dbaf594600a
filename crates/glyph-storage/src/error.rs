//! Storage error types

/// Errors produced by storage backends and the publisher
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An upload failed; retried per artifact, independently of siblings
    #[error("upload of {key} failed: {reason}")]
    Upload {
        /// Object key that failed
        key: String,
        /// Underlying failure description
        reason: String,
    },

    /// A download failed (distinct from the object being absent)
    #[error("download of {key} failed: {reason}")]
    Download {
        /// Object key that failed
        key: String,
        /// Underlying failure description
        reason: String,
    },

    /// Backend construction or configuration problem
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Stored payload could not be decoded
    #[error("stored payload decode failed: {0}")]
    Decode(String),
}

impl StorageError {
    /// Upload error for a key
    #[inline]
    pub fn upload(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Upload {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Download error for a key
    #[inline]
    pub fn download(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Download {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same operation may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upload { .. } | Self::Download { .. })
    }
}
