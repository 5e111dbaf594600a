//! Glyph Chain - on-chain read layer
//!
//! Everything the pipeline needs from the chain:
//! - Reassembling the generative script from immutable storage shards
//! - Fetching per-token generation inputs (seed, mutations, palette)
//! - The authoritative mutation count used as the freshness key
//!
//! All reads go through the [`ChainClient`] trait so tests can substitute a
//! canned client without any network access.

#![warn(unreachable_pub)]

pub mod client;
pub mod error;
pub mod inputs;
pub mod seed;
pub mod shards;

pub use client::{ChainClient, JsonRpcChainClient, RawTokenInputs, ShardLocator};
pub use error::ChainError;
pub use inputs::{MutationEvent, TokenGenerationInput, TokenInputFetcher};
pub use seed::{truncate_seed_hash, SEED_HEX_PREFIX_LEN};
pub use shards::{ScriptShard, ShardReader, SHARD_MARKER_LEN};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
