//! Script shard reassembly
//!
//! The generative script is distributed across several immutable data
//! contracts. Payloads are fetched concurrently, but reassembly is driven by
//! locator index, never by arrival order. Each payload carries a fixed
//! one-byte encoding marker that is stripped before concatenation.

use crate::client::{ChainClient, ShardLocator};
use crate::error::ChainError;
use futures::future::try_join_all;
use std::sync::Arc;

/// Length of the encoding marker prefixed to every shard payload
pub const SHARD_MARKER_LEN: usize = 1;

/// One fetched shard, marker still attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptShard {
    /// Position in the assembled script
    pub index: u32,
    /// Data contract address the payload was read from
    pub address: String,
    /// Raw payload, including the marker prefix
    pub encoded: Vec<u8>,
}

impl ScriptShard {
    /// Payload with the marker stripped
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Assembly`] if the payload is shorter than the
    /// marker.
    pub fn decoded(&self) -> Result<&[u8], ChainError> {
        if self.encoded.len() < SHARD_MARKER_LEN {
            return Err(ChainError::Assembly(format!(
                "shard {} at {} is shorter than its marker",
                self.index, self.address
            )));
        }
        Ok(&self.encoded[SHARD_MARKER_LEN..])
    }
}

/// Fetches and reassembles script shards
#[derive(Clone)]
pub struct ShardReader {
    client: Arc<dyn ChainClient>,
}

impl std::fmt::Debug for ShardReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardReader").finish_non_exhaustive()
    }
}

impl ShardReader {
    /// Create a reader over the given chain client
    #[inline]
    #[must_use]
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Fetch every shard concurrently and reassemble the original script.
    ///
    /// The output is byte-identical regardless of fetch timing: payload I/O
    /// is order-independent, reassembly is strictly by ascending locator
    /// index. There is no partial-script mode; any single fetch failure
    /// aborts the whole assembly.
    ///
    /// # Errors
    ///
    /// [`ChainError::TransientFetch`] if any shard read fails (retryable);
    /// [`ChainError::Assembly`] on duplicate indices, truncated payloads, or
    /// non-UTF-8 script text.
    pub async fn assemble(&self, locators: &[ShardLocator]) -> Result<String, ChainError> {
        if locators.is_empty() {
            return Err(ChainError::Assembly("empty shard locator list".to_string()));
        }

        let fetches = locators.iter().map(|locator| {
            let client = Arc::clone(&self.client);
            let locator = locator.clone();
            async move {
                let encoded = client.shard_bytes(&locator.address).await?;
                Ok::<_, ChainError>(ScriptShard {
                    index: locator.index,
                    address: locator.address,
                    encoded,
                })
            }
        });

        let mut shards = try_join_all(fetches).await?;
        shards.sort_by_key(|s| s.index);

        for pair in shards.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(ChainError::Assembly(format!(
                    "duplicate shard index {}",
                    pair[0].index
                )));
            }
        }

        let mut script = Vec::new();
        for shard in &shards {
            script.extend_from_slice(shard.decoded()?);
        }

        tracing::debug!(
            shards = shards.len(),
            bytes = script.len(),
            "assembled script"
        );

        String::from_utf8(script)
            .map_err(|e| ChainError::Assembly(format!("script is not UTF-8: {e}")))
    }
}
