//! Testing utilities for the Glyph workspace
//!
//! Canned chain clients and render engines so pipeline behavior can be
//! exercised without a network or a sandbox process.

#![allow(missing_docs)]

use async_trait::async_trait;
use dashmap::DashMap;
use glyph_chain::{ChainClient, ChainError, RawTokenInputs, ShardLocator};
use glyph_render::{RawExtraction, RenderEngine, RenderError, RenderRequest};
use image::{Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// A 64-hex-digit seed hash whose 16-digit prefix truncates to
/// 1_763_114_204_158.
#[must_use]
pub fn sample_seed_hash() -> String {
    format!("0x0000019a81cbbbfe{}", "0".repeat(48))
}

/// A valid 2x1 PNG with one red and one blue pixel.
#[must_use]
pub fn tiny_png() -> Vec<u8> {
    let mut img = RgbaImage::new(2, 1);
    img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    img.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// A structurally valid extraction: `frames` 2x1 RGBA buffers plus a real
/// PNG raster.
#[must_use]
pub fn sample_extraction(frame_count: usize) -> RawExtraction {
    RawExtraction {
        width: 2,
        height: 1,
        frames: (0..frame_count)
            .map(|i| vec![u8::try_from(i % 256).unwrap_or(0); 8])
            .collect(),
        raster: tiny_png(),
    }
}

/// Programmable in-memory chain
///
/// Shards, token state and mutation counts are all mutable from tests;
/// `set_mutation_count` simulates an on-chain mutation landing between
/// reads.
#[derive(Debug, Default)]
pub struct FakeChainClient {
    locators: std::sync::Mutex<Vec<ShardLocator>>,
    shards: DashMap<String, Vec<u8>>,
    inputs: DashMap<u64, RawTokenInputs>,
    counts: DashMap<u64, u64>,
    locator_reads: AtomicU64,
}

impl FakeChainClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a shard; the payload gets the marker byte prefixed.
    pub fn put_shard(&self, index: u32, address: &str, body: &[u8]) {
        let mut encoded = vec![0u8];
        encoded.extend_from_slice(body);
        self.shards.insert(address.to_string(), encoded);
        self.locators
            .lock()
            .unwrap()
            .push(ShardLocator::new(index, address));
    }

    /// Install per-token state with the sample seed hash.
    pub fn put_token(&self, token_id: u64, mutations: &[(u64, &str)], palette: &[&str]) {
        self.inputs.insert(
            token_id,
            RawTokenInputs {
                seed_hash: sample_seed_hash(),
                mutation_seeds: mutations.iter().map(|(s, _)| *s).collect(),
                mutation_types: mutations.iter().map(|(_, t)| (*t).to_string()).collect(),
                custom_palette: palette.iter().map(|p| (*p).to_string()).collect(),
            },
        );
        self.counts.insert(token_id, mutations.len() as u64);
    }

    /// Overwrite a token's live mutation count without touching its state.
    pub fn set_mutation_count(&self, token_id: u64, count: u64) {
        self.counts.insert(token_id, count);
    }

    /// How many times the locator list was fetched (cache observability).
    #[must_use]
    pub fn locator_reads(&self) -> u64 {
        self.locator_reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn shard_locators(&self) -> Result<Vec<ShardLocator>, ChainError> {
        self.locator_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.locators.lock().unwrap().clone())
    }

    async fn shard_bytes(&self, address: &str) -> Result<Vec<u8>, ChainError> {
        self.shards
            .get(address)
            .map(|e| e.value().clone())
            .ok_or_else(|| ChainError::transient(address, "no such shard"))
    }

    async fn token_inputs(&self, token_id: u64) -> Result<RawTokenInputs, ChainError> {
        self.inputs
            .get(&token_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| ChainError::transient(format!("token {token_id}"), "unknown token"))
    }

    async fn mutation_count(&self, token_id: u64) -> Result<u64, ChainError> {
        self.counts
            .get(&token_id)
            .map(|e| *e.value())
            .ok_or_else(|| ChainError::transient(format!("token {token_id}"), "unknown token"))
    }
}

/// Engine returning a canned extraction, counting renders
#[derive(Debug)]
pub struct StaticRenderEngine {
    extraction: RawExtraction,
    renders: AtomicU64,
}

impl StaticRenderEngine {
    #[must_use]
    pub fn new(extraction: RawExtraction) -> Self {
        Self {
            extraction,
            renders: AtomicU64::new(0),
        }
    }

    /// Shareable engine with a valid three-frame extraction.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new(sample_extraction(3)))
    }

    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RenderEngine for StaticRenderEngine {
    async fn render(&self, _request: RenderRequest) -> Result<RawExtraction, RenderError> {
        self.renders.fetch_add(1, Ordering::Relaxed);
        Ok(self.extraction.clone())
    }
}

/// Engine that never signals completion: it sleeps through the request
/// deadline and reports the timeout a real sandbox would.
#[derive(Debug, Default)]
pub struct HangingRenderEngine {
    renders: AtomicU64,
}

impl HangingRenderEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RenderEngine for HangingRenderEngine {
    async fn render(&self, request: RenderRequest) -> Result<RawExtraction, RenderError> {
        self.renders.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(request.deadline).await;
        Err(RenderError::Timeout {
            deadline: request.deadline,
        })
    }
}

/// Engine that times out a fixed number of times, then succeeds
#[derive(Debug)]
pub struct FlakyRenderEngine {
    failures_remaining: AtomicU32,
    extraction: RawExtraction,
    renders: AtomicU64,
}

impl FlakyRenderEngine {
    #[must_use]
    pub fn new(failures: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(failures),
            extraction: sample_extraction(2),
            renders: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RenderEngine for FlakyRenderEngine {
    async fn render(&self, request: RenderRequest) -> Result<RawExtraction, RenderError> {
        self.renders.fetch_add(1, Ordering::Relaxed);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(RenderError::Timeout {
                deadline: request.deadline,
            });
        }
        Ok(self.extraction.clone())
    }
}
