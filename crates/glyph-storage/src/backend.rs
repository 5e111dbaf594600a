//! Storage backend capability
//!
//! The publisher is written against this trait only; concrete backends can
//! be swapped without touching pipeline logic. Implementations are shared
//! and stateless, reusable across jobs without external locking.

use crate::error::StorageError;
use async_trait::async_trait;

/// Abstract object storage
///
/// Keys are forward-slash-separated paths. `upload` overwrites an existing
/// object under the same key (upsert); public URLs are deterministic
/// functions of the key and the backend's base URL.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store bytes under a key, overwriting any existing object.
    /// Returns the public URL of the stored object.
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Fetch an object's bytes; `None` if the key is absent
    async fn download(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Whether an object exists under the key
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove an object; absent keys are not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Public URL the object is (or would be) served from
    fn public_url(&self, key: &str) -> String;
}
