//! Render session lifecycle
//!
//! One session per generation job. A session walks
//! Initializing → Loading → AwaitingCompletion → Extracting → Done, or
//! drops to Failed from any live state. Sessions are destroyed after
//! extraction or failure regardless of outcome and are never reused across
//! tokens.

use crate::error::RenderError;
use std::time::{Duration, Instant};
use ulid::Ulid;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Allocating the isolated sandbox context
    Initializing,
    /// Harness loading until the environment reports idle
    Loading,
    /// Cooperative wait for the script's completion signal
    AwaitingCompletion,
    /// Reading the canvas output
    Extracting,
    /// Extraction handed off successfully
    Done,
    /// Torn down without a usable extraction
    Failed,
}

impl SessionState {
    fn can_advance_to(self, next: Self) -> bool {
        use SessionState::{AwaitingCompletion, Done, Extracting, Failed, Initializing, Loading};
        matches!(
            (self, next),
            (Initializing, Loading)
                | (Loading, AwaitingCompletion)
                | (AwaitingCompletion, Extracting)
                | (Extracting, Done)
                | (Initializing | Loading | AwaitingCompletion | Extracting, Failed)
        )
    }
}

/// Ephemeral bookkeeping for one render job
#[derive(Debug)]
pub struct RenderSession {
    /// Session id, for log correlation
    pub id: Ulid,
    /// Token being rendered
    pub token_id: u64,
    state: SessionState,
    started_at: Instant,
    deadline: Duration,
}

impl RenderSession {
    /// Open a session for one token with a hard deadline
    #[must_use]
    pub fn new(token_id: u64, deadline: Duration) -> Self {
        let session = Self {
            id: Ulid::new(),
            token_id,
            state: SessionState::Initializing,
            started_at: Instant::now(),
            deadline,
        };
        tracing::debug!(session = %session.id, token_id, "render session opened");
        session
    }

    /// Current state
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Hard deadline governing the completion wait
    #[inline]
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Whether the wall clock has passed the deadline
    #[inline]
    #[must_use]
    pub fn deadline_exceeded(&self) -> bool {
        self.started_at.elapsed() >= self.deadline
    }

    /// Advance to the next lifecycle state.
    ///
    /// # Errors
    ///
    /// [`RenderError::Session`] on an illegal transition (terminal states
    /// cannot be left; live states only advance forward or to Failed).
    pub fn advance(&mut self, next: SessionState) -> Result<(), RenderError> {
        if !self.state.can_advance_to(next) {
            return Err(RenderError::Session(format!(
                "{:?} -> {next:?} (session {})",
                self.state, self.id
            )));
        }
        tracing::trace!(session = %self.id, from = ?self.state, to = ?next, "session transition");
        self.state = next;
        Ok(())
    }

    /// Mark the session failed; legal from any live state
    pub fn fail(&mut self) {
        if self.state.can_advance_to(SessionState::Failed) {
            tracing::debug!(session = %self.id, from = ?self.state, "session failed");
            self.state = SessionState::Failed;
        }
    }
}
