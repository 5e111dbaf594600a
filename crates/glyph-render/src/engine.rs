//! Render engine abstraction and session pool
//!
//! [`RenderEngine`] is the seam around the sandboxed execution backend.
//! [`RenderPool`] bounds how many isolated contexts run at once; the pool
//! size is the single global concurrency limiter for the whole pipeline.

use crate::error::RenderError;
use crate::harness::HarnessDocument;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// One render job handed to an engine
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Token being rendered, for log correlation
    pub token_id: u64,
    /// Composed harness document
    pub harness: HarnessDocument,
    /// Hard deadline for the completion wait
    pub deadline: Duration,
}

/// Raw output read from the canvas surface, before structural validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExtraction {
    /// Declared frame width in pixels
    pub width: u32,
    /// Declared frame height in pixels
    pub height: u32,
    /// Ordered per-frame RGBA buffers
    pub frames: Vec<Vec<u8>>,
    /// Raster snapshot (PNG bytes) of the final canvas state
    pub raster: Vec<u8>,
}

/// Isolated sandboxed execution backend
///
/// Implementations run one harness per call in a fresh context, enforce the
/// request deadline, and read only the canvas element's output. Test
/// implementations return canned extractions without launching anything.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Execute the harness and extract its raw output
    async fn render(&self, request: RenderRequest) -> Result<RawExtraction, RenderError>;
}

/// Occupancy and outcome counters for a pool
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderPoolStats {
    /// Configured pool capacity
    pub capacity: usize,
    /// Sessions currently running
    pub in_flight: usize,
    /// Renders that returned an extraction
    pub completed: u64,
    /// Renders that failed or timed out
    pub failed: u64,
}

/// Bounded pool of isolated render contexts
///
/// At most `capacity` sessions run concurrently; further renders wait for a
/// free slot. Sessions never share mutable state; the occupancy counter is
/// the only concurrently-mutated value here.
pub struct RenderPool {
    engine: Arc<dyn RenderEngine>,
    permits: Arc<Semaphore>,
    capacity: usize,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl RenderPool {
    /// Create a pool over the given engine
    ///
    /// `capacity` should be sized to available heavyweight-process capacity.
    #[must_use]
    pub fn new(engine: Arc<dyn RenderEngine>, capacity: usize) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(capacity.max(1))),
            capacity: capacity.max(1),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Render inside a pooled slot, waiting for one if the pool is full.
    ///
    /// # Errors
    ///
    /// [`RenderError::PoolClosed`] if the pool is shut down; otherwise
    /// whatever the engine returns.
    pub async fn render(&self, request: RenderRequest) -> Result<RawExtraction, RenderError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RenderError::PoolClosed)?;

        let token_id = request.token_id;
        tracing::debug!(token_id, in_flight = self.stats().in_flight, "render slot acquired");

        let result = self.engine.render(request).await;
        drop(permit);

        match &result {
            Ok(_) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(token_id, %err, "render failed");
            }
        }
        result
    }

    /// Current pool statistics
    #[must_use]
    pub fn stats(&self) -> RenderPoolStats {
        RenderPoolStats {
            capacity: self.capacity,
            in_flight: self.capacity - self.permits.available_permits(),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Close the pool; waiting and future renders fail with `PoolClosed`
    pub fn close(&self) {
        self.permits.close();
    }
}

impl std::fmt::Debug for RenderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPool")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::HarnessBuilder;
    use glyph_chain::TokenGenerationInput;
    use std::sync::atomic::AtomicUsize;

    fn request(token_id: u64) -> RenderRequest {
        let input = TokenGenerationInput {
            token_id,
            mint_seed: 1,
            mutations: vec![],
            palette: vec![],
            mutation_count: 0,
        };
        RenderRequest {
            token_id,
            harness: HarnessBuilder::new().build(&input, "x();").unwrap(),
            deadline: Duration::from_secs(1),
        }
    }

    fn extraction() -> RawExtraction {
        RawExtraction {
            width: 1,
            height: 1,
            frames: vec![vec![0, 0, 0, 255]],
            raster: vec![1],
        }
    }

    /// Engine that records its peak concurrency
    struct ConcurrencyProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl RenderEngine for ConcurrencyProbe {
        async fn render(&self, _request: RenderRequest) -> Result<RawExtraction, RenderError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(extraction())
        }
    }

    #[tokio::test]
    async fn pool_bounds_concurrency() {
        let probe = Arc::new(ConcurrencyProbe {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pool = Arc::new(RenderPool::new(probe.clone(), 2));

        let mut handles = Vec::new();
        for token_id in 0..6 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(
                async move { pool.render(request(token_id)).await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
        let stats = pool.stats();
        assert_eq!(stats.completed, 6);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn failures_are_counted() {
        struct Failing;

        #[async_trait]
        impl RenderEngine for Failing {
            async fn render(&self, _r: RenderRequest) -> Result<RawExtraction, RenderError> {
                Err(RenderError::Sandbox("boom".to_string()))
            }
        }

        let pool = RenderPool::new(Arc::new(Failing), 1);
        assert!(pool.render(request(1)).await.is_err());
        assert_eq!(pool.stats().failed, 1);
    }

    #[tokio::test]
    async fn closed_pool_rejects_renders() {
        struct Never;

        #[async_trait]
        impl RenderEngine for Never {
            async fn render(&self, _r: RenderRequest) -> Result<RawExtraction, RenderError> {
                Ok(extraction())
            }
        }

        let pool = RenderPool::new(Arc::new(Never), 1);
        pool.close();
        assert!(matches!(
            pool.render(request(1)).await,
            Err(RenderError::PoolClosed)
        ));
    }
}
