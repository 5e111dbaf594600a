//! Glyph Storage - durable publication of generated artifacts
//!
//! Three representations per token (compressed pixel history, raster
//! snapshot, vector document) are uploaded under token-scoped keys to an
//! abstract [`StorageBackend`]. Two production variants (an S3-compatible
//! bucket gateway and a managed blob store) satisfy identical semantics; an
//! in-memory variant backs tests and local development.
//!
//! Publication is transactional in effect: the per-token record object is
//! only written after all three artifact uploads succeed, so a reader can
//! never observe a record pointing at a missing artifact.

#![warn(unreachable_pub)]

pub mod backend;
pub mod blob;
pub mod bucket;
pub mod compress;
pub mod error;
pub mod keys;
pub mod memory;
pub mod publish;

pub use backend::StorageBackend;
pub use blob::{ManagedBlobBackend, ManagedBlobConfig};
pub use bucket::{BucketConfig, BucketHttpBackend};
pub use compress::{gzip_bytes, gunzip_bytes};
pub use error::StorageError;
pub use keys::{ArtifactKeys, ArtifactKind};
pub use memory::MemoryBackend;
pub use publish::{PixelHistory, PublishedRecord, PublisherConfig, StoragePublisher};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
