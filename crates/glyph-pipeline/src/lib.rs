//! Glyph Pipeline - artifact materialization orchestration
//!
//! Ties the layers together: token inputs and the reassembled script are
//! fetched in parallel, bound into a harness, rendered in a pooled sandbox
//! session, validated, vector-traced and published. The
//! [`RegenerationCoordinator`] accepts asynchronous triggers, serializes
//! jobs per token, and exposes the mutation-count-based status contract
//! consumers poll for freshness.
//!
//! # Example
//!
//! ```rust,ignore
//! use glyph_pipeline::{GenerationPipeline, PipelineConfig, RegenerationCoordinator, CoordinatorConfig, TriggerEvent};
//!
//! # async fn example(pipeline: GenerationPipeline) -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = RegenerationCoordinator::start(pipeline.into(), CoordinatorConfig::new());
//! let ticket = coordinator.trigger(42, TriggerEvent::Mutated)?;
//! println!("job {} accepted", ticket.job_id);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod pipeline;
pub mod poll;

pub use config::{CoordinatorConfig, PipelineConfig};
pub use coordinator::{
    ArtifactStatus, CoordinatorStats, JobTicket, RegenerationCoordinator, TriggerDisposition,
    TriggerEvent,
};
pub use error::PipelineError;
pub use pipeline::GenerationPipeline;
pub use poll::{FreshnessPoller, PollOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
