//! Per-token generation inputs
//!
//! Fetched fresh on every generation request. The mutation count can change
//! between requests, so nothing here is ever cached.

use crate::client::{ChainClient, ShardLocator};
use crate::error::ChainError;
use crate::seed::truncate_seed_hash;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of colors a palette override must carry when present
pub const PALETTE_LEN: usize = 6;

/// One applied mutation event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    /// Seed the mutation was rolled with
    pub seed: u64,
    /// Mutation type label, e.g. `paletteChangeOne`
    #[serde(rename = "type")]
    pub type_label: String,
}

/// Everything the harness needs to re-render one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGenerationInput {
    /// Token being generated
    pub token_id: u64,
    /// Integer seed, truncated from the on-chain seed hash
    pub mint_seed: u64,
    /// Applied mutation events in application order
    pub mutations: Vec<MutationEvent>,
    /// Palette override: empty, or exactly six color values
    pub palette: Vec<String>,
    /// Mutation count observed at fetch time; the freshness key for the
    /// eventual published record
    pub mutation_count: u64,
}

/// Fetches token inputs and the shard locator list
#[derive(Clone)]
pub struct TokenInputFetcher {
    client: Arc<dyn ChainClient>,
}

impl std::fmt::Debug for TokenInputFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInputFetcher").finish_non_exhaustive()
    }
}

impl TokenInputFetcher {
    /// Create a fetcher over the given chain client
    #[inline]
    #[must_use]
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Current shard locator list. Safe to cache; shards are write-once.
    ///
    /// # Errors
    ///
    /// Propagates transient fetch failures from the chain client.
    pub async fn shard_locators(&self) -> Result<Vec<ShardLocator>, ChainError> {
        self.client.shard_locators().await
    }

    /// Fetch the full generation input for one token.
    ///
    /// The raw token state and the mutation count are independent reads and
    /// are issued in parallel. The seed hash is truncated into the harness's
    /// integer domain here, on the consuming side, with the same rule the
    /// publishing side applies to custom seeds.
    ///
    /// # Errors
    ///
    /// [`ChainError::TransientFetch`] on read failure;
    /// [`ChainError::InvalidResponse`] if mutation seed/type vectors differ
    /// in length or the palette is neither empty nor six entries.
    pub async fn fetch(&self, token_id: u64) -> Result<TokenGenerationInput, ChainError> {
        let (raw, mutation_count) = tokio::try_join!(
            self.client.token_inputs(token_id),
            self.client.mutation_count(token_id),
        )?;

        if raw.mutation_seeds.len() != raw.mutation_types.len() {
            return Err(ChainError::InvalidResponse(format!(
                "token {token_id}: {} mutation seeds but {} types",
                raw.mutation_seeds.len(),
                raw.mutation_types.len()
            )));
        }
        if !raw.custom_palette.is_empty() && raw.custom_palette.len() != PALETTE_LEN {
            return Err(ChainError::InvalidResponse(format!(
                "token {token_id}: palette must be empty or {PALETTE_LEN} colors, got {}",
                raw.custom_palette.len()
            )));
        }

        let mint_seed = truncate_seed_hash(&raw.seed_hash)?;
        let mutations = raw
            .mutation_seeds
            .into_iter()
            .zip(raw.mutation_types)
            .map(|(seed, type_label)| MutationEvent { seed, type_label })
            .collect();

        Ok(TokenGenerationInput {
            token_id,
            mint_seed,
            mutations,
            palette: raw.custom_palette,
            mutation_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RawTokenInputs;
    use async_trait::async_trait;

    struct StaticChain {
        inputs: RawTokenInputs,
        count: u64,
    }

    #[async_trait]
    impl ChainClient for StaticChain {
        async fn shard_locators(&self) -> Result<Vec<ShardLocator>, ChainError> {
            Ok(vec![ShardLocator::new(0, "0xaa")])
        }

        async fn shard_bytes(&self, _address: &str) -> Result<Vec<u8>, ChainError> {
            unimplemented!("not used in input tests")
        }

        async fn token_inputs(&self, _token_id: u64) -> Result<RawTokenInputs, ChainError> {
            Ok(self.inputs.clone())
        }

        async fn mutation_count(&self, _token_id: u64) -> Result<u64, ChainError> {
            Ok(self.count)
        }
    }

    fn raw(seeds: Vec<u64>, types: Vec<&str>, palette: Vec<&str>) -> RawTokenInputs {
        RawTokenInputs {
            seed_hash: format!("0x0000019a81cbbbfe{}", "0".repeat(48)),
            mutation_seeds: seeds,
            mutation_types: types.into_iter().map(String::from).collect(),
            custom_palette: palette.into_iter().map(String::from).collect(),
        }
    }

    #[tokio::test]
    async fn fetch_truncates_seed_and_pairs_mutations() {
        let chain = StaticChain {
            inputs: raw(vec![9], vec!["paletteChangeOne"], vec![]),
            count: 1,
        };
        let fetcher = TokenInputFetcher::new(Arc::new(chain));

        let input = fetcher.fetch(42).await.unwrap();
        assert_eq!(input.token_id, 42);
        assert_eq!(input.mint_seed, 1_763_114_204_158);
        assert_eq!(input.mutations.len(), 1);
        assert_eq!(input.mutations[0].seed, 9);
        assert_eq!(input.mutations[0].type_label, "paletteChangeOne");
        assert_eq!(input.mutation_count, 1);
        assert!(input.palette.is_empty());
    }

    #[tokio::test]
    async fn mismatched_mutation_vectors_rejected() {
        let chain = StaticChain {
            inputs: raw(vec![1, 2], vec!["a"], vec![]),
            count: 2,
        };
        let fetcher = TokenInputFetcher::new(Arc::new(chain));

        let err = fetcher.fetch(1).await.unwrap_err();
        assert!(matches!(err, ChainError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn palette_must_be_empty_or_six() {
        let chain = StaticChain {
            inputs: raw(vec![], vec![], vec!["#fff", "#000"]),
            count: 0,
        };
        let fetcher = TokenInputFetcher::new(Arc::new(chain));
        assert!(fetcher.fetch(1).await.is_err());

        let chain = StaticChain {
            inputs: raw(
                vec![],
                vec![],
                vec!["#111", "#222", "#333", "#444", "#555", "#666"],
            ),
            count: 0,
        };
        let fetcher = TokenInputFetcher::new(Arc::new(chain));
        let input = fetcher.fetch(1).await.unwrap();
        assert_eq!(input.palette.len(), PALETTE_LEN);
    }
}
