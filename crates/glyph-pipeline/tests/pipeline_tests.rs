//! End-to-end pipeline behavior against canned collaborators.

use async_trait::async_trait;
use dashmap::DashMap;
use glyph_chain::{ChainClient, ShardReader};
use glyph_pipeline::{
    CoordinatorConfig, FreshnessPoller, GenerationPipeline, PipelineConfig, PollOutcome,
    RegenerationCoordinator, TriggerDisposition, TriggerEvent,
};
use glyph_storage::{MemoryBackend, StorageBackend, StorageError};
use glyph_test_utils::{FakeChainClient, FlakyRenderEngine, HangingRenderEngine, StaticRenderEngine};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Backend wrapper that fails the first upload of chosen keys and counts
/// attempts per key.
struct FlakyStorage {
    inner: MemoryBackend,
    fail_once: std::sync::Mutex<std::collections::HashSet<String>>,
    attempts: DashMap<String, u32>,
}

impl FlakyStorage {
    fn new(fail_once: &[&str]) -> Self {
        Self {
            inner: MemoryBackend::new(),
            fail_once: std::sync::Mutex::new(fail_once.iter().map(|s| (*s).to_string()).collect()),
            attempts: DashMap::new(),
        }
    }

    fn attempts_for(&self, key: &str) -> u32 {
        self.attempts.get(key).map_or(0, |e| *e.value())
    }
}

#[async_trait]
impl StorageBackend for FlakyStorage {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        *self.attempts.entry(key.to_string()).or_insert(0) += 1;
        if self.fail_once.lock().unwrap().remove(key) {
            return Err(StorageError::upload(key, "injected failure"));
        }
        self.inner.upload(key, bytes, content_type).await
    }

    async fn download(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.download(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(key).await
    }

    fn public_url(&self, key: &str) -> String {
        self.inner.public_url(key)
    }
}

fn scenario_chain() -> Arc<FakeChainClient> {
    let chain = Arc::new(FakeChainClient::new());
    chain.put_shard(0, "0xaa", b"function generate");
    chain.put_shard(1, "0xbb", b"(seed){");
    chain.put_shard(2, "0xcc", b"draw();}");
    chain.put_token(42, &[(9, "paletteChangeOne")], &[]);
    chain
}

fn fast_config() -> PipelineConfig {
    PipelineConfig::new().with_render_deadline(Duration::from_secs(5))
}

fn fast_coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig::new().with_retry_backoff(Duration::from_millis(5))
}

async fn wait_until_idle(coordinator: &RegenerationCoordinator, token_id: u64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while coordinator.is_in_flight(token_id) {
        assert!(Instant::now() < deadline, "job for token {token_id} never finished");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn scenario_token_42_end_to_end() {
    let chain = scenario_chain();

    // Assembled script is the verbatim shard concatenation.
    let reader = ShardReader::new(chain.clone());
    let locators = chain.shard_locators().await.unwrap();
    let script = reader.assemble(&locators).await.unwrap();
    assert_eq!(script, "function generate(seed){draw();}");

    let backend = Arc::new(MemoryBackend::new());
    let pipeline = Arc::new(GenerationPipeline::new(
        chain,
        StaticRenderEngine::shared(),
        backend,
        fast_config(),
    ));
    let coordinator = RegenerationCoordinator::start(pipeline, fast_coordinator_config());

    // Before any job: no record, and a poll expecting count 1 cannot pass.
    let before = coordinator.status(42).await.unwrap();
    assert!(!before.exists || before.generated_at_mutation_count.unwrap() < 1);

    let ticket = coordinator.trigger(42, TriggerEvent::Mutated).unwrap();
    assert_eq!(ticket.disposition, TriggerDisposition::Accepted);

    let outcome = FreshnessPoller::new()
        .with_interval(Duration::from_millis(10))
        .with_max_attempts(200)
        .poll_until_fresh(&coordinator, 42, 1)
        .await
        .unwrap();

    match outcome {
        PollOutcome::Fresh(status) => {
            assert!(status.exists);
            assert_eq!(status.generated_at_mutation_count, Some(1));
            assert!(status.last_modified.is_some());
        }
        PollOutcome::StillProcessing { .. } => panic!("job never became fresh"),
    }

    // Non-empty frame history made it to storage.
    let record = coordinator
        .pipeline()
        .publisher()
        .read_record(42)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.generated_at_mutation_count, 1);
    let (pixels, _) = coordinator
        .pipeline()
        .publisher()
        .read_artifact(42, glyph_storage::ArtifactKind::Pixels)
        .await
        .unwrap()
        .unwrap();
    let history = glyph_storage::StoragePublisher::decode_history(&pixels).unwrap();
    assert!(!history.frames.is_empty());
}

#[tokio::test]
async fn poller_rejects_stale_counts() {
    let chain = scenario_chain();
    let backend = Arc::new(MemoryBackend::new());
    let pipeline = Arc::new(GenerationPipeline::new(
        chain,
        StaticRenderEngine::shared(),
        backend,
        fast_config(),
    ));
    let coordinator = RegenerationCoordinator::start(pipeline, fast_coordinator_config());

    coordinator.trigger(42, TriggerEvent::Mutated).unwrap();
    wait_until_idle(&coordinator, 42).await;

    // Record is at count 1. A consumer expecting count 2 must not accept
    // it, regardless of how fresh its timestamp is.
    let outcome = FreshnessPoller::new()
        .with_interval(Duration::from_millis(5))
        .with_max_attempts(3)
        .poll_until_fresh(&coordinator, 42, 2)
        .await
        .unwrap();
    assert_eq!(outcome, PollOutcome::StillProcessing { attempts: 3 });
}

#[tokio::test]
async fn mutation_count_tracks_chain_state() {
    let chain = scenario_chain();
    let backend = Arc::new(MemoryBackend::new());
    let pipeline = Arc::new(GenerationPipeline::new(
        chain.clone(),
        StaticRenderEngine::shared(),
        backend,
        fast_config(),
    ));
    let coordinator = RegenerationCoordinator::start(pipeline, fast_coordinator_config());

    coordinator.trigger(42, TriggerEvent::Minted).unwrap();
    wait_until_idle(&coordinator, 42).await;
    assert_eq!(
        coordinator.status(42).await.unwrap().generated_at_mutation_count,
        Some(1)
    );

    // A second mutation lands on-chain; regeneration picks up the new count.
    chain.put_token(42, &[(9, "paletteChangeOne"), (11, "paletteChangeAll")], &[]);
    coordinator.trigger(42, TriggerEvent::Mutated).unwrap();
    wait_until_idle(&coordinator, 42).await;
    assert_eq!(
        coordinator.status(42).await.unwrap().generated_at_mutation_count,
        Some(2)
    );
}

#[tokio::test]
async fn render_timeout_fails_within_deadline_and_is_retried() {
    let chain = scenario_chain();
    let engine = Arc::new(HangingRenderEngine::new());
    let pipeline = Arc::new(GenerationPipeline::new(
        chain,
        engine.clone(),
        Arc::new(MemoryBackend::new()),
        fast_config().with_render_deadline(Duration::from_millis(100)),
    ));
    let coordinator = RegenerationCoordinator::start(
        pipeline,
        fast_coordinator_config().with_job_attempts(2),
    );

    let started = Instant::now();
    coordinator.trigger(42, TriggerEvent::Minted).unwrap();
    wait_until_idle(&coordinator, 42).await;

    // Two attempts, each torn down at the 100ms deadline, plus backoff.
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(engine.render_count(), 2);

    let stats = coordinator.stats();
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 0);

    // No record was ever committed.
    assert!(!coordinator.status(42).await.unwrap().exists);
}

#[tokio::test]
async fn timed_out_job_succeeds_on_fresh_session() {
    let chain = scenario_chain();
    let engine = Arc::new(FlakyRenderEngine::new(1));
    let pipeline = Arc::new(GenerationPipeline::new(
        chain,
        engine.clone(),
        Arc::new(MemoryBackend::new()),
        fast_config().with_render_deadline(Duration::from_millis(50)),
    ));
    let coordinator = RegenerationCoordinator::start(
        pipeline,
        fast_coordinator_config().with_job_attempts(3),
    );

    coordinator.trigger(42, TriggerEvent::Minted).unwrap();
    wait_until_idle(&coordinator, 42).await;

    assert_eq!(engine.render_count(), 2);
    assert_eq!(coordinator.stats().completed, 1);
    assert!(coordinator.status(42).await.unwrap().exists);
}

#[tokio::test]
async fn failed_upload_never_repeats_the_render() {
    let chain = scenario_chain();
    let engine = StaticRenderEngine::shared();
    let backend = Arc::new(FlakyStorage::new(&["tokens/42/artifact.png"]));
    let pipeline = Arc::new(GenerationPipeline::new(
        chain,
        engine.clone(),
        backend.clone(),
        fast_config(),
    ));
    let coordinator = RegenerationCoordinator::start(pipeline, fast_coordinator_config());

    coordinator.trigger(42, TriggerEvent::Minted).unwrap();
    wait_until_idle(&coordinator, 42).await;

    // The raster retried inside the publisher; its siblings and the render
    // itself ran exactly once.
    assert_eq!(backend.attempts_for("tokens/42/artifact.png"), 2);
    assert_eq!(backend.attempts_for("tokens/42/pixels.json.gz"), 1);
    assert_eq!(backend.attempts_for("tokens/42/artifact.svg"), 1);
    assert_eq!(engine.render_count(), 1);
    assert!(coordinator.status(42).await.unwrap().exists);
}

#[tokio::test]
async fn regeneration_upserts_the_same_objects() {
    let chain = scenario_chain();
    let backend = Arc::new(MemoryBackend::new());
    let pipeline = Arc::new(GenerationPipeline::new(
        chain,
        StaticRenderEngine::shared(),
        backend.clone(),
        fast_config(),
    ));
    let coordinator = RegenerationCoordinator::start(pipeline, fast_coordinator_config());

    coordinator.trigger(42, TriggerEvent::Minted).unwrap();
    wait_until_idle(&coordinator, 42).await;
    let first_keys = backend.keys();

    coordinator.trigger(42, TriggerEvent::Mutated).unwrap();
    wait_until_idle(&coordinator, 42).await;

    // Same four objects (three artifacts + record), no duplicates.
    assert_eq!(backend.keys(), first_keys);
    assert_eq!(backend.len(), 4);
}

#[tokio::test]
async fn script_cache_serves_repeat_jobs() {
    let chain = scenario_chain();
    chain.put_token(43, &[], &[]);
    let pipeline = Arc::new(GenerationPipeline::new(
        chain.clone(),
        StaticRenderEngine::shared(),
        Arc::new(MemoryBackend::new()),
        fast_config(),
    ));
    let coordinator = RegenerationCoordinator::start(pipeline, fast_coordinator_config());

    coordinator.trigger(42, TriggerEvent::Minted).unwrap();
    wait_until_idle(&coordinator, 42).await;
    coordinator.trigger(43, TriggerEvent::Minted).unwrap();
    wait_until_idle(&coordinator, 43).await;

    // The locator list was read once; the second job hit the script cache.
    assert_eq!(chain.locator_reads(), 1);

    // Invalidation forces a re-read.
    coordinator.pipeline().invalidate_script_cache();
    coordinator.trigger(42, TriggerEvent::Mutated).unwrap();
    wait_until_idle(&coordinator, 42).await;
    assert_eq!(chain.locator_reads(), 2);
}
