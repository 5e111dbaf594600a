//! Glyph Render - deterministic re-execution of the generative script
//!
//! Composes the executable harness for a token's inputs, runs it inside an
//! isolated sandbox with a hard deadline, validates the extracted
//! multi-frame pixel history and raster snapshot, and derives the vector
//! trace.
//!
//! The sandbox itself sits behind the [`RenderEngine`] trait so any
//! isolated execution backend can be substituted; tests inject engines
//! returning canned frame histories without launching anything.

#![warn(unreachable_pub)]

pub mod engine;
pub mod error;
pub mod extract;
pub mod harness;
pub mod sandbox;
pub mod session;
pub mod trace;

pub use engine::{RawExtraction, RenderEngine, RenderPool, RenderPoolStats, RenderRequest};
pub use error::RenderError;
pub use extract::{ArtifactExtractor, GeneratedArtifact};
pub use harness::{HarnessBuilder, HarnessDocument, DEFAULT_CANVAS_WIDTH};
pub use sandbox::{SandboxConfig, SubprocessSandbox};
pub use session::{RenderSession, SessionState};
pub use trace::VectorTracer;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
