//! Regeneration coordination
//!
//! Triggers enqueue a generation job and return immediately; completion is
//! observed through the status query. Jobs are serialized per token: a
//! trigger for a token with a job already in flight coalesces into it, so
//! two overlapping regenerations can never race to publish.
//!
//! There is no persisted failure state. A job that exhausts its attempts is
//! logged and dropped; to a status consumer it is indistinguishable from a
//! slow job, and recovery is a manual re-trigger.

use crate::config::CoordinatorConfig;
use crate::error::PipelineError;
use crate::pipeline::GenerationPipeline;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use ulid::Ulid;

/// What prompted a regeneration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerEvent {
    /// Token was just minted
    Minted,
    /// A mutation was applied on-chain
    Mutated,
}

/// How a trigger was absorbed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerDisposition {
    /// A new job was enqueued
    Accepted,
    /// An in-flight job for the token absorbs this trigger
    Coalesced,
}

/// Acknowledgement returned by a trigger; job acceptance, not completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTicket {
    /// Id of the job that will (or already does) cover this trigger
    pub job_id: Ulid,
    /// Token the job regenerates
    pub token_id: u64,
    /// Whether the trigger started a job or joined one
    pub disposition: TriggerDisposition,
}

/// Status answer consumers poll for freshness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStatus {
    /// Whether a committed record exists at all
    pub exists: bool,
    /// Mutation count the record was generated at; the freshness key
    pub generated_at_mutation_count: Option<u64>,
    /// Publication timestamp; informational only, never a freshness signal
    pub last_modified: Option<DateTime<Utc>>,
}

impl ArtifactStatus {
    /// Status for a token with no committed record
    #[inline]
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            exists: false,
            generated_at_mutation_count: None,
            last_modified: None,
        }
    }

    /// Whether this record reflects at least `expected` mutation events.
    /// `exists` alone is never enough, and timestamps are never consulted.
    #[inline]
    #[must_use]
    pub fn is_fresh(&self, expected: u64) -> bool {
        self.generated_at_mutation_count
            .is_some_and(|count| count >= expected)
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    coalesced: AtomicU64,
    completed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of coordinator activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Triggers that enqueued a new job
    pub accepted: u64,
    /// Triggers absorbed by an in-flight job
    pub coalesced: u64,
    /// Jobs that committed a record
    pub completed: u64,
    /// Job attempts that were retried
    pub retried: u64,
    /// Jobs abandoned after exhausting attempts
    pub failed: u64,
}

#[derive(Debug, Clone, Copy)]
struct Job {
    job_id: Ulid,
    token_id: u64,
    event: TriggerEvent,
}

/// Accepts triggers, runs generation jobs, answers status queries
pub struct RegenerationCoordinator {
    pipeline: Arc<GenerationPipeline>,
    queue: std::sync::Mutex<Option<mpsc::Sender<Job>>>,
    in_flight: Arc<DashMap<u64, Ulid>>,
    counters: Arc<Counters>,
    dispatcher: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RegenerationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegenerationCoordinator")
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl RegenerationCoordinator {
    /// Start the coordinator's dispatch loop
    #[must_use]
    pub fn start(pipeline: Arc<GenerationPipeline>, config: CoordinatorConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_depth);
        let in_flight: Arc<DashMap<u64, Ulid>> = Arc::new(DashMap::new());
        let counters = Arc::new(Counters::default());

        let dispatcher = tokio::spawn(dispatch_loop(
            rx,
            Arc::clone(&pipeline),
            Arc::clone(&in_flight),
            Arc::clone(&counters),
            config,
        ));

        Self {
            pipeline,
            queue: std::sync::Mutex::new(Some(tx)),
            in_flight,
            counters,
            dispatcher: std::sync::Mutex::new(Some(dispatcher)),
        }
    }

    /// Enqueue a generation job for a token.
    ///
    /// Returns as soon as the job is accepted (or coalesced into an
    /// in-flight one); rendering and publishing happen asynchronously, so
    /// downstream failures can never surface here.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Saturated`] when the queue is full;
    /// [`PipelineError::ShutDown`] after shutdown.
    pub fn trigger(&self, token_id: u64, event: TriggerEvent) -> Result<JobTicket, PipelineError> {
        use dashmap::mapref::entry::Entry;

        let job_id = Ulid::new();
        match self.in_flight.entry(token_id) {
            Entry::Occupied(existing) => {
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(token_id, job = %existing.get(), "trigger coalesced");
                Ok(JobTicket {
                    job_id: *existing.get(),
                    token_id,
                    disposition: TriggerDisposition::Coalesced,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(job_id);
                let send_result = {
                    let queue = self.queue.lock().expect("queue lock poisoned");
                    match queue.as_ref() {
                        None => Err(PipelineError::ShutDown),
                        Some(tx) => match tx.try_send(Job {
                            job_id,
                            token_id,
                            event,
                        }) {
                            Ok(()) => Ok(()),
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                Err(PipelineError::Saturated)
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                Err(PipelineError::ShutDown)
                            }
                        },
                    }
                };

                match send_result {
                    Ok(()) => {
                        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(token_id, job = %job_id, ?event, "trigger accepted");
                        Ok(JobTicket {
                            job_id,
                            token_id,
                            disposition: TriggerDisposition::Accepted,
                        })
                    }
                    Err(err) => {
                        self.in_flight.remove(&token_id);
                        Err(err)
                    }
                }
            }
        }
    }

    /// Current publication status of a token, read from the committed
    /// record.
    ///
    /// # Errors
    ///
    /// Storage backend failures; an absent record is not an error.
    pub async fn status(&self, token_id: u64) -> Result<ArtifactStatus, PipelineError> {
        let record = self.pipeline.publisher().read_record(token_id).await?;
        Ok(record.map_or(ArtifactStatus::absent(), |r| ArtifactStatus {
            exists: true,
            generated_at_mutation_count: Some(r.generated_at_mutation_count),
            last_modified: Some(r.generated_at),
        }))
    }

    /// Whether a job for the token is queued or running
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self, token_id: u64) -> bool {
        self.in_flight.contains_key(&token_id)
    }

    /// Activity snapshot
    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// The pipeline behind this coordinator
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &Arc<GenerationPipeline> {
        &self.pipeline
    }

    /// Stop accepting triggers, drain queued jobs, wait for the dispatcher
    pub async fn shutdown(&self) {
        let sender = self.queue.lock().expect("queue lock poisoned").take();
        drop(sender);

        let handle = self.dispatcher.lock().expect("dispatcher lock poisoned").take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::error!(%err, "dispatcher task panicked");
            }
        }
        self.pipeline.close();
        tracing::info!("coordinator shut down");
    }
}

async fn dispatch_loop(
    mut rx: mpsc::Receiver<Job>,
    pipeline: Arc<GenerationPipeline>,
    in_flight: Arc<DashMap<u64, Ulid>>,
    counters: Arc<Counters>,
    config: CoordinatorConfig,
) {
    let mut jobs = JoinSet::new();

    while let Some(job) = rx.recv().await {
        // Reap whatever already finished so the set stays small.
        while jobs.try_join_next().is_some() {}

        jobs.spawn(run_job(
            Arc::clone(&pipeline),
            job,
            Arc::clone(&in_flight),
            Arc::clone(&counters),
            config,
        ));
    }

    // Queue closed: drain remaining jobs.
    while jobs.join_next().await.is_some() {}
}

async fn run_job(
    pipeline: Arc<GenerationPipeline>,
    job: Job,
    in_flight: Arc<DashMap<u64, Ulid>>,
    counters: Arc<Counters>,
    config: CoordinatorConfig,
) {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match pipeline.materialize(job.token_id).await {
            Ok(record) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    token_id = job.token_id,
                    job = %job.job_id,
                    mutation_count = record.generated_at_mutation_count,
                    "job complete"
                );
                break;
            }
            Err(err) if attempt < config.job_attempts && err.is_job_retryable() => {
                counters.retried.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    token_id = job.token_id,
                    job = %job.job_id,
                    attempt,
                    %err,
                    "job attempt failed, re-enqueueing with a fresh session"
                );
                tokio::time::sleep(config.retry_backoff).await;
            }
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    token_id = job.token_id,
                    job = %job.job_id,
                    event = ?job.event,
                    attempt,
                    %err,
                    "job abandoned"
                );
                break;
            }
        }
    }
    in_flight.remove(&job.token_id);
}
