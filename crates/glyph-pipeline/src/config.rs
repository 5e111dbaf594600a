//! Pipeline and coordinator configuration

use glyph_render::DEFAULT_CANVAS_WIDTH;
use std::time::Duration;

/// Materialization tuning
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Canvas width the harness declares (square surface)
    pub canvas_width: u32,
    /// Hard deadline for a render session; generation can be slow, so this
    /// is minutes-scale
    pub render_deadline: Duration,
    /// Maximum concurrent sandbox sessions; the single global concurrency
    /// limiter for the pipeline
    pub render_pool_size: usize,
    /// TTL of the assembled-script cache (shards are immutable; the TTL
    /// only bounds memory, not correctness)
    pub script_cache_ttl: Duration,
    /// Attempts for the cheap vector trace, retried without re-rendering
    pub trace_attempts: u32,
}

impl PipelineConfig {
    /// Default tuning
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With an explicit canvas width override
    #[inline]
    #[must_use]
    pub fn with_canvas_width(mut self, width: u32) -> Self {
        self.canvas_width = width;
        self
    }

    /// With a specific render deadline
    #[inline]
    #[must_use]
    pub fn with_render_deadline(mut self, deadline: Duration) -> Self {
        self.render_deadline = deadline;
        self
    }

    /// With a specific render pool size
    #[inline]
    #[must_use]
    pub fn with_render_pool_size(mut self, size: usize) -> Self {
        self.render_pool_size = size.max(1);
        self
    }

    /// With a specific script cache TTL
    #[inline]
    #[must_use]
    pub fn with_script_cache_ttl(mut self, ttl: Duration) -> Self {
        self.script_cache_ttl = ttl;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            render_deadline: Duration::from_secs(240),
            render_pool_size: 2,
            script_cache_ttl: Duration::from_secs(600),
            trace_attempts: 2,
        }
    }
}

/// Coordinator tuning
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Trigger queue depth before `trigger` reports saturation
    pub queue_depth: usize,
    /// Attempts per job before it is abandoned (first run included)
    pub job_attempts: u32,
    /// Delay between job attempts
    pub retry_backoff: Duration,
}

impl CoordinatorConfig {
    /// Default tuning
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a specific queue depth
    #[inline]
    #[must_use]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// With a specific job attempt budget
    #[inline]
    #[must_use]
    pub fn with_job_attempts(mut self, attempts: u32) -> Self {
        self.job_attempts = attempts.max(1);
        self
    }

    /// With a specific retry backoff
    #[inline]
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            queue_depth: 256,
            job_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compose() {
        let config = PipelineConfig::new()
            .with_canvas_width(800)
            .with_render_pool_size(0)
            .with_render_deadline(Duration::from_secs(30));
        assert_eq!(config.canvas_width, 800);
        assert_eq!(config.render_pool_size, 1);
        assert_eq!(config.render_deadline, Duration::from_secs(30));
    }

    #[test]
    fn coordinator_defaults_are_sane() {
        let config = CoordinatorConfig::default();
        assert!(config.queue_depth > 0);
        assert!(config.job_attempts >= 1);
    }
}
