//! Consumer-side freshness polling
//!
//! A consumer that just triggered a mutation computes the expected
//! post-event count (the count it observed before the transaction, plus
//! one) and polls status on a fixed interval with a bounded attempt
//! budget. Success requires `generated_at_mutation_count >= expected`;
//! `exists` alone proves nothing, and timestamps are never compared: a
//! record regenerated for an unrelated reason can look new without
//! reflecting the awaited mutation.

use crate::coordinator::{ArtifactStatus, RegenerationCoordinator};
use crate::error::PipelineError;
use std::time::Duration;

/// Terminal poll result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A record reflecting the expected mutation count was observed
    Fresh(ArtifactStatus),
    /// The attempt budget ran out; not an error, the job may still land
    StillProcessing {
        /// Attempts spent before giving up
        attempts: u32,
    },
}

/// Fixed-interval, bounded-budget status poller
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPoller {
    interval: Duration,
    max_attempts: u32,
}

impl FreshnessPoller {
    /// Poller with the default cadence (2s interval, 45 attempts)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a specific poll interval
    #[inline]
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// With a specific attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Poll until the token's record reflects at least `expected` mutation
    /// events, or the budget runs out.
    ///
    /// # Errors
    ///
    /// Storage failures from the status read; budget exhaustion is the
    /// `StillProcessing` outcome, not an error.
    pub async fn poll_until_fresh(
        &self,
        coordinator: &RegenerationCoordinator,
        token_id: u64,
        expected: u64,
    ) -> Result<PollOutcome, PipelineError> {
        for attempt in 1..=self.max_attempts {
            let status = coordinator.status(token_id).await?;
            if status.is_fresh(expected) {
                tracing::debug!(token_id, expected, attempt, "artifact fresh");
                return Ok(PollOutcome::Fresh(status));
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        tracing::debug!(token_id, expected, "poll budget exhausted");
        Ok(PollOutcome::StillProcessing {
            attempts: self.max_attempts,
        })
    }
}

impl Default for FreshnessPoller {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 45,
        }
    }
}
