//! Managed blob store backend
//!
//! The hosted alternative to the bucket gateway. Uploads go to the
//! provider's API with a bearer token and an overwrite flag (keys must be
//! stable across regenerations); the provider echoes the public URL in its
//! JSON response.

use crate::backend::StorageBackend;
use crate::error::StorageError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Managed blob store connection settings
#[derive(Debug, Clone)]
pub struct ManagedBlobConfig {
    /// Provider API base, no trailing slash
    pub api_base: String,
    /// Base URL blobs are publicly served from, no trailing slash
    pub public_base_url: String,
    /// Provider access token
    pub token: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ManagedBlobConfig {
    /// Settings for one store
    #[must_use]
    pub fn new(
        api_base: impl Into<String>,
        public_base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
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

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

/// Managed blob store client
#[derive(Debug, Clone)]
pub struct ManagedBlobBackend {
    http: reqwest::Client,
    config: ManagedBlobConfig,
}

impl ManagedBlobBackend {
    /// Connect with the given settings
    ///
    /// # Errors
    ///
    /// [`StorageError::Backend`] if the HTTP client cannot be built.
    pub fn new(config: ManagedBlobConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn api_url(&self, key: &str) -> String {
        format!("{}/{key}", self.config.api_base)
    }
}

#[async_trait]
impl StorageBackend for ManagedBlobBackend {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let response = self
            .http
            .put(self.api_url(key))
            .query(&[("overwrite", "1")])
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

        // The provider mints the served URL; fall back to the deterministic
        // public URL if the response body is not the expected shape.
        match response.json::<UploadResponse>().await {
            Ok(body) => Ok(body.url),
            Err(_) => Ok(self.public_url(key)),
        }
    }

    async fn download(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let response = self
            .http
            .get(self.api_url(key))
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
            .head(self.api_url(key))
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
            .delete(self.api_url(key))
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
        format!("{}/{key}", self.config.public_base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_shape() {
        let backend = ManagedBlobBackend::new(ManagedBlobConfig::new(
            "https://blob.example/api/store",
            "https://blob.example/public",
            "secret",
        ))
        .unwrap();

        assert_eq!(
            backend.public_url("tokens/7/artifact.svg"),
            "https://blob.example/public/tokens/7/artifact.svg"
        );
    }
}
