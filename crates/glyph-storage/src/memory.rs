//! In-memory storage backend
//!
//! Backs tests and local development. Semantics match the production
//! backends: upsert on upload, `None` for absent downloads.

use crate::backend::StorageBackend;
use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Concurrent in-memory object store
#[derive(Debug)]
pub struct MemoryBackend {
    objects: DashMap<String, Vec<u8>>,
    base_url: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Empty store with a `memory://` URL scheme
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            base_url: "memory://glyph".to_string(),
        }
    }

    /// Number of stored objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Sorted list of stored keys
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.objects.insert(key.to_string(), bytes);
        Ok(self.public_url(key))
    }

    async fn download(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.objects.get(key).map(|e| e.value().clone()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.base_url)
    }
}
