//! Artifact publication
//!
//! Uploads the three representations of a generated artifact concurrently,
//! each with an independent bounded retry: a raster failure never re-sends
//! an already-successful vector, and publishing never re-renders. The
//! per-token record object is written last, after all three uploads
//! succeed, and acts as the commit marker the status protocol reads.

use crate::backend::StorageBackend;
use crate::compress::{gunzip_bytes, gzip_bytes};
use crate::error::StorageError;
use crate::keys::{ArtifactKeys, ArtifactKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Structured multi-frame pixel history, the blob viewers reconstruct
/// animation from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelHistory {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Ordered per-frame RGBA buffers
    pub frames: Vec<Vec<u8>>,
}

/// Per-token publication record; the freshness source of truth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedRecord {
    /// Token the record belongs to
    pub token_id: u64,
    /// URL of the compressed pixel-history blob
    pub pixel_history_url: String,
    /// URL of the raster snapshot
    pub raster_url: String,
    /// URL of the vector document
    pub vector_url: String,
    /// Number of mutation events applied at generation time; a record is
    /// stale whenever the live on-chain count exceeds this
    pub generated_at_mutation_count: u64,
    /// Publication timestamp (informational; never used for freshness)
    pub generated_at: DateTime<Utc>,
}

/// Upload retry tuning
#[derive(Debug, Clone, Copy)]
pub struct PublisherConfig {
    /// Attempts per artifact upload before the publish fails
    pub upload_attempts: u32,
    /// Delay between attempts
    pub upload_backoff: Duration,
}

impl PublisherConfig {
    /// Default tuning
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a specific attempt budget
    #[inline]
    #[must_use]
    pub fn with_upload_attempts(mut self, attempts: u32) -> Self {
        self.upload_attempts = attempts.max(1);
        self
    }

    /// With a specific backoff between attempts
    #[inline]
    #[must_use]
    pub fn with_upload_backoff(mut self, backoff: Duration) -> Self {
        self.upload_backoff = backoff;
        self
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            upload_attempts: 3,
            upload_backoff: Duration::from_millis(200),
        }
    }
}

/// Publishes generated artifacts to a [`StorageBackend`]
#[derive(Clone)]
pub struct StoragePublisher {
    backend: Arc<dyn StorageBackend>,
    keys: ArtifactKeys,
    config: PublisherConfig,
}

impl std::fmt::Debug for StoragePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoragePublisher")
            .field("keys", &self.keys)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StoragePublisher {
    /// Publisher over the given backend with the default key layout
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            keys: ArtifactKeys::default(),
            config: PublisherConfig::default(),
        }
    }

    /// Override the key layout
    #[inline]
    #[must_use]
    pub fn with_keys(mut self, keys: ArtifactKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Override retry tuning
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: PublisherConfig) -> Self {
        self.config = config;
        self
    }

    /// Upload all three representations and commit the record.
    ///
    /// The three artifact uploads run concurrently and retry independently.
    /// The record is uploaded only once all three have succeeded; the same
    /// keys are overwritten on every regeneration.
    ///
    /// # Errors
    ///
    /// [`StorageError::Upload`] naming the artifact that exhausted its
    /// attempts; the record is not written in that case.
    pub async fn publish(
        &self,
        token_id: u64,
        history: &PixelHistory,
        raster: &[u8],
        vector_svg: &str,
        mutation_count: u64,
    ) -> Result<PublishedRecord, StorageError> {
        let history_json = serde_json::to_vec(history)
            .map_err(|e| StorageError::Decode(format!("pixel history encode: {e}")))?;
        let history_gz = gzip_bytes(&history_json)?;

        // join (not try_join): a failing sibling must not cancel an upload
        // that is still in flight.
        let (pixels, raster_res, vector) = tokio::join!(
            self.upload_with_retry(token_id, ArtifactKind::Pixels, history_gz),
            self.upload_with_retry(token_id, ArtifactKind::Raster, raster.to_vec()),
            self.upload_with_retry(token_id, ArtifactKind::Vector, vector_svg.as_bytes().to_vec()),
        );
        let (pixel_history_url, raster_url, vector_url) = (pixels?, raster_res?, vector?);

        let record = PublishedRecord {
            token_id,
            pixel_history_url,
            raster_url,
            vector_url,
            generated_at_mutation_count: mutation_count,
            generated_at: Utc::now(),
        };

        let record_json = serde_json::to_vec(&record)
            .map_err(|e| StorageError::Decode(format!("record encode: {e}")))?;
        let record_key = self.keys.record(token_id);
        self.retry_upload(&record_key, record_json, "application/json")
            .await?;

        tracing::info!(
            token_id,
            mutation_count,
            "published artifact record"
        );
        Ok(record)
    }

    /// Read a token's committed record, if any.
    ///
    /// # Errors
    ///
    /// [`StorageError::Download`] on backend failure;
    /// [`StorageError::Decode`] if the stored record is unreadable.
    pub async fn read_record(&self, token_id: u64) -> Result<Option<PublishedRecord>, StorageError> {
        let key = self.keys.record(token_id);
        match self.backend.download(&key).await? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Decode(format!("record {key}: {e}"))),
        }
    }

    /// Fetch one stored artifact's bytes along with its content type.
    ///
    /// # Errors
    ///
    /// Propagates backend download failures.
    pub async fn read_artifact(
        &self,
        token_id: u64,
        kind: ArtifactKind,
    ) -> Result<Option<(Vec<u8>, &'static str)>, StorageError> {
        let key = self.keys.artifact(token_id, kind);
        Ok(self
            .backend
            .download(&key)
            .await?
            .map(|bytes| (bytes, kind.content_type())))
    }

    /// Decode a stored pixel-history blob.
    ///
    /// # Errors
    ///
    /// [`StorageError::Decode`] on corrupt gzip or JSON.
    pub fn decode_history(bytes: &[u8]) -> Result<PixelHistory, StorageError> {
        let json = gunzip_bytes(bytes)?;
        serde_json::from_slice(&json)
            .map_err(|e| StorageError::Decode(format!("pixel history decode: {e}")))
    }

    async fn upload_with_retry(
        &self,
        token_id: u64,
        kind: ArtifactKind,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let key = self.keys.artifact(token_id, kind);
        self.retry_upload(&key, bytes, kind.content_type()).await
    }

    async fn retry_upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let mut last_err = None;
        for attempt in 1..=self.config.upload_attempts {
            match self.backend.upload(key, bytes.clone(), content_type).await {
                Ok(url) => return Ok(url),
                Err(err) => {
                    tracing::warn!(key, attempt, %err, "upload attempt failed");
                    last_err = Some(err);
                    if attempt < self.config.upload_attempts {
                        tokio::time::sleep(self.config.upload_backoff).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| StorageError::upload(key, "no attempts made")))
    }
}
