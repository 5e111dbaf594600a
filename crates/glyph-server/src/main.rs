//! glyph-server binary
//!
//! Wires the production collaborators from the environment and serves the
//! HTTP surface.
//!
//! Environment:
//! - `GLYPH_BIND` (default `127.0.0.1:8080`)
//! - `GLYPH_RPC_URL` chain read gateway endpoint
//! - `GLYPH_RENDERER_CMD` sandbox renderer invocation, whitespace-split
//! - `GLYPH_POOL_SIZE`, `GLYPH_RENDER_DEADLINE_SECS`
//! - `GLYPH_STORAGE` one of `bucket`, `blob`, `memory`
//! - bucket: `GLYPH_BUCKET_ENDPOINT`, `GLYPH_BUCKET_NAME`,
//!   `GLYPH_BUCKET_PUBLIC_URL`, `GLYPH_STORAGE_TOKEN`
//! - blob: `GLYPH_BLOB_API`, `GLYPH_BLOB_PUBLIC_URL`, `GLYPH_STORAGE_TOKEN`

use anyhow::{bail, Context};
use glyph_chain::JsonRpcChainClient;
use glyph_pipeline::{
    CoordinatorConfig, GenerationPipeline, PipelineConfig, RegenerationCoordinator,
};
use glyph_render::{SandboxConfig, SubprocessSandbox};
use glyph_storage::{
    BucketConfig, BucketHttpBackend, ManagedBlobBackend, ManagedBlobConfig, MemoryBackend,
    StorageBackend,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn env(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("{key} is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn storage_backend() -> anyhow::Result<Arc<dyn StorageBackend>> {
    match env_or("GLYPH_STORAGE", "bucket").as_str() {
        "bucket" => {
            let backend = BucketHttpBackend::new(BucketConfig::new(
                env("GLYPH_BUCKET_ENDPOINT")?,
                env("GLYPH_BUCKET_NAME")?,
                env("GLYPH_BUCKET_PUBLIC_URL")?,
                env("GLYPH_STORAGE_TOKEN")?,
            ))?;
            Ok(Arc::new(backend))
        }
        "blob" => {
            let backend = ManagedBlobBackend::new(ManagedBlobConfig::new(
                env("GLYPH_BLOB_API")?,
                env("GLYPH_BLOB_PUBLIC_URL")?,
                env("GLYPH_STORAGE_TOKEN")?,
            ))?;
            Ok(Arc::new(backend))
        }
        "memory" => Ok(Arc::new(MemoryBackend::new())),
        other => bail!("unknown GLYPH_STORAGE backend: {other}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bind: SocketAddr = env_or("GLYPH_BIND", "127.0.0.1:8080")
        .parse()
        .context("GLYPH_BIND is not a socket address")?;

    let chain = Arc::new(JsonRpcChainClient::new(
        env("GLYPH_RPC_URL")?,
        Duration::from_secs(30),
    )?);

    let renderer_cmd = env("GLYPH_RENDERER_CMD")?;
    let mut parts = renderer_cmd.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("GLYPH_RENDERER_CMD is empty");
    };
    let engine = Arc::new(SubprocessSandbox::new(
        SandboxConfig::new(program).with_args(parts),
    ));

    let pool_size: usize = env_or("GLYPH_POOL_SIZE", "2")
        .parse()
        .context("GLYPH_POOL_SIZE is not a number")?;
    let deadline_secs: u64 = env_or("GLYPH_RENDER_DEADLINE_SECS", "240")
        .parse()
        .context("GLYPH_RENDER_DEADLINE_SECS is not a number")?;

    let pipeline = Arc::new(GenerationPipeline::new(
        chain,
        engine,
        storage_backend()?,
        PipelineConfig::new()
            .with_render_pool_size(pool_size)
            .with_render_deadline(Duration::from_secs(deadline_secs)),
    ));
    let coordinator = Arc::new(RegenerationCoordinator::start(
        pipeline,
        CoordinatorConfig::new(),
    ));

    tracing::info!(%bind, "glyph-server listening");
    warp::serve(glyph_server::routes(coordinator)).run(bind).await;
    Ok(())
}
