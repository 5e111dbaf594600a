//! Chain read client
//!
//! [`ChainClient`] is the seam between the pipeline and the chain. The
//! production implementation speaks JSON-RPC to a read gateway: shard bytes
//! come from `eth_getCode` against the shard's data address, while the
//! locator list and per-token state come from indexer methods in the
//! `glyph_` namespace. Tests substitute an in-memory client.

use crate::error::ChainError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Locator for one immutable script shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardLocator {
    /// Position of this shard in the assembled script
    pub index: u32,
    /// Address of the data contract holding the shard payload
    pub address: String,
}

impl ShardLocator {
    /// Create a new locator
    #[inline]
    #[must_use]
    pub fn new(index: u32, address: impl Into<String>) -> Self {
        Self {
            index,
            address: address.into(),
        }
    }
}

/// Raw per-token state as returned by the chain, before seed truncation
/// and mutation-pairing are applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTokenInputs {
    /// 32-byte seed hash, hex encoded
    #[serde(rename = "seed")]
    pub seed_hash: String,
    /// Seeds of applied mutation events, in application order
    #[serde(rename = "mutationSeeds")]
    pub mutation_seeds: Vec<u64>,
    /// Type labels of applied mutation events, parallel to `mutation_seeds`
    #[serde(rename = "mutationTypes")]
    pub mutation_types: Vec<String>,
    /// Custom palette: empty, or exactly six color values
    #[serde(rename = "customPalette")]
    pub custom_palette: Vec<String>,
}

/// Read-only view of the chain required by the pipeline
///
/// Shared and stateless; a single instance is reused across jobs without
/// locking beyond what the underlying connection pool provides.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current ordered shard locator list (cacheable)
    async fn shard_locators(&self) -> Result<Vec<ShardLocator>, ChainError>;

    /// Raw payload bytes of one shard, marker prefix included
    async fn shard_bytes(&self, address: &str) -> Result<Vec<u8>, ChainError>;

    /// Per-token generation inputs (never cached across mutations)
    async fn token_inputs(&self, token_id: u64) -> Result<RawTokenInputs, ChainError>;

    /// Current number of mutation events applied to a token
    async fn mutation_count(&self, token_id: u64) -> Result<u64, ChainError>;
}

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC chain client against a read gateway
#[derive(Debug)]
pub struct JsonRpcChainClient {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl JsonRpcChainClient {
    /// Create a client for the given RPC endpoint
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidResponse`] if the HTTP client cannot be
    /// constructed.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<T, ChainError>
    where
        P: Serialize + Send,
        T: serde::de::DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::transient(method, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::transient(method, format!("http {status}")));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(err) = body.error {
            return Err(ChainError::InvalidResponse(format!(
                "{method}: rpc error {} ({})",
                err.code, err.message
            )));
        }
        body.result
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method}: empty result")))
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn shard_locators(&self) -> Result<Vec<ShardLocator>, ChainError> {
        self.call("glyph_scriptShards", ()).await
    }

    async fn shard_bytes(&self, address: &str) -> Result<Vec<u8>, ChainError> {
        let code: String = self.call("eth_getCode", (address, "latest")).await?;
        let digits = code.strip_prefix("0x").unwrap_or(&code);
        hex::decode(digits)
            .map_err(|e| ChainError::InvalidResponse(format!("shard {address}: {e}")))
    }

    async fn token_inputs(&self, token_id: u64) -> Result<RawTokenInputs, ChainError> {
        self.call("glyph_tokenState", (token_id,)).await
    }

    async fn mutation_count(&self, token_id: u64) -> Result<u64, ChainError> {
        self.call("glyph_mutationCount", (token_id,)).await
    }
}
