//! End-to-end materialization
//!
//! One `materialize` call takes a token from chain state to a committed
//! published record. Token inputs and script assembly are independent and
//! fetched in parallel; the render runs inside the bounded session pool;
//! the vector trace retries on its own without touching the render.
//!
//! The assembled-script cache is owned by the pipeline instance (no
//! module-global state) and exposes an explicit invalidation hook for
//! operator-driven refresh after a shard republish.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use glyph_chain::{ChainClient, ShardReader, TokenGenerationInput, TokenInputFetcher};
use glyph_render::{
    ArtifactExtractor, GeneratedArtifact, HarnessBuilder, RenderEngine, RenderPool,
    RenderPoolStats, RenderRequest, VectorTracer,
};
use glyph_storage::{PixelHistory, PublishedRecord, StorageBackend, StoragePublisher};
use moka::future::Cache;
use std::sync::Arc;

/// The full materialization pipeline for one collection
pub struct GenerationPipeline {
    fetcher: TokenInputFetcher,
    shard_reader: ShardReader,
    harness: HarnessBuilder,
    pool: RenderPool,
    extractor: ArtifactExtractor,
    tracer: VectorTracer,
    publisher: StoragePublisher,
    script_cache: Cache<(), String>,
    config: PipelineConfig,
}

impl std::fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GenerationPipeline {
    /// Assemble a pipeline from its collaborators
    #[must_use]
    pub fn new(
        chain: Arc<dyn ChainClient>,
        engine: Arc<dyn RenderEngine>,
        backend: Arc<dyn StorageBackend>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fetcher: TokenInputFetcher::new(Arc::clone(&chain)),
            shard_reader: ShardReader::new(chain),
            harness: HarnessBuilder::new().with_canvas_width(config.canvas_width),
            pool: RenderPool::new(engine, config.render_pool_size),
            extractor: ArtifactExtractor::new(),
            tracer: VectorTracer::new(),
            publisher: StoragePublisher::new(backend),
            script_cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(config.script_cache_ttl)
                .build(),
            config,
        }
    }

    /// Override the publisher (key layout, retry tuning)
    #[inline]
    #[must_use]
    pub fn with_publisher(mut self, publisher: StoragePublisher) -> Self {
        self.publisher = publisher;
        self
    }

    /// The publisher, for status reads and artifact serving
    #[inline]
    #[must_use]
    pub fn publisher(&self) -> &StoragePublisher {
        &self.publisher
    }

    /// Render pool occupancy and outcome counters
    #[inline]
    #[must_use]
    pub fn pool_stats(&self) -> RenderPoolStats {
        self.pool.stats()
    }

    /// Drop the cached assembled script; the next job re-reads the chain
    pub fn invalidate_script_cache(&self) {
        self.script_cache.invalidate_all();
    }

    /// Stop accepting renders; in-flight sessions finish
    pub fn close(&self) {
        self.pool.close();
    }

    /// Materialize one token end to end and commit its published record.
    ///
    /// # Errors
    ///
    /// Every error class in [`PipelineError`]; the caller classifies with
    /// [`PipelineError::is_job_retryable`].
    pub async fn materialize(&self, token_id: u64) -> Result<PublishedRecord, PipelineError> {
        tracing::info!(token_id, "materialization started");

        // Independent reads: per-token inputs and the assembled script.
        let (input, script) =
            tokio::try_join!(self.fetch_input(token_id), self.assembled_script())?;

        let harness = self.harness.build(&input, &script)?;
        let request = RenderRequest {
            token_id,
            harness,
            deadline: self.config.render_deadline,
        };

        let raw = self.pool.render(request).await?;
        let artifact = self.extractor.validate(raw)?;
        let vector_svg = self.trace_with_retry(&artifact)?;

        let history = PixelHistory {
            width: artifact.width,
            height: artifact.height,
            frames: artifact.frames.clone(),
        };
        let record = self
            .publisher
            .publish(
                token_id,
                &history,
                &artifact.raster,
                &vector_svg,
                input.mutation_count,
            )
            .await?;

        tracing::info!(
            token_id,
            mutation_count = record.generated_at_mutation_count,
            frames = history.frames.len(),
            "materialization complete"
        );
        Ok(record)
    }

    async fn fetch_input(&self, token_id: u64) -> Result<TokenGenerationInput, PipelineError> {
        Ok(self.fetcher.fetch(token_id).await?)
    }

    /// Cached script assembly. Shards are write-once, so a cache hit can
    /// never serve a stale script; the TTL only bounds memory.
    async fn assembled_script(&self) -> Result<String, PipelineError> {
        if let Some(script) = self.script_cache.get(&()).await {
            return Ok(script);
        }
        let locators = self.fetcher.shard_locators().await?;
        let script = self.shard_reader.assemble(&locators).await?;
        self.script_cache.insert((), script.clone()).await;
        Ok(script)
    }

    /// The trace has no external dependency, so its failures are retried
    /// here without repeating the expensive render.
    fn trace_with_retry(&self, artifact: &GeneratedArtifact) -> Result<String, PipelineError> {
        let mut last_err = None;
        for _ in 0..self.config.trace_attempts.max(1) {
            match self.tracer.trace(&artifact.raster) {
                Ok(svg) => return Ok(svg),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err
            .map(PipelineError::from)
            .unwrap_or_else(|| PipelineError::InvalidInput("trace attempts exhausted".into())))
    }
}
