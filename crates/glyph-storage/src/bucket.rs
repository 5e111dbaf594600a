//! S3-compatible bucket gateway backend
//!
//! Path-style object REST against a token-authenticated gateway:
//! `{endpoint}/object/{bucket}/{key}`. Public URLs are served from a
//! separate base (typically a CDN in front of the bucket).

use crate::backend::StorageBackend;
use crate::error::StorageError;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Bucket gateway connection settings
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Gateway API endpoint, no trailing slash
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Base URL objects are publicly served from, no trailing slash
    pub public_base_url: String,
    /// Access token sent as a bearer credential
    pub token: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl BucketConfig {
    /// Settings for one bucket
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the per-request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// S3-compatible object store over a REST gateway
#[derive(Debug, Clone)]
pub struct BucketHttpBackend {
    http: reqwest::Client,
    config: BucketConfig,
}

impl BucketHttpBackend {
    /// Connect with the given settings
    ///
    /// # Errors
    ///
    /// [`StorageError::Backend`] if the HTTP client cannot be built.
    pub fn new(config: BucketConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/object/{}/{key}",
            self.config.endpoint, self.config.bucket
        )
    }
}

#[async_trait]
impl StorageBackend for BucketHttpBackend {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let response = self
            .http
            .put(self.object_url(key))
            .bearer_auth(&self.config.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::upload(key, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::upload(key, format!("http {status}")));
        }
        Ok(self.public_url(key))
    }

    async fn download(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let response = self
            .http
            .get(self.object_url(key))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| StorageError::download(key, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| StorageError::download(key, e))?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(StorageError::download(key, format!("http {status}"))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let response = self
            .http
            .head(self.object_url(key))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| StorageError::download(key, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(StorageError::download(key, format!("http {status}"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = self
            .http
            .delete(self.object_url(key))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| StorageError::download(key, e))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(StorageError::download(key, format!("http {status}")))
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{key}",
            self.config.public_base_url, self.config.bucket
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_deterministic_functions_of_key() {
        let backend = BucketHttpBackend::new(BucketConfig::new(
            "https://gateway.example",
            "artifacts",
            "https://cdn.example",
            "secret",
        ))
        .unwrap();

        assert_eq!(
            backend.public_url("tokens/42/artifact.png"),
            "https://cdn.example/artifacts/tokens/42/artifact.png"
        );
        assert_eq!(
            backend.object_url("tokens/42/artifact.png"),
            "https://gateway.example/object/artifacts/tokens/42/artifact.png"
        );
    }
}
