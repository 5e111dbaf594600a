//! Subprocess sandbox
//!
//! Production [`RenderEngine`] backed by an external renderer process, one
//! per session. The harness document goes in on stdin; the child loads it,
//! waits for the script's completion signal (or a non-empty frame history
//! as the fallback heuristic), serializes the canvas element's output as
//! JSON on stdout and exits. The parent enforces the hard deadline and
//! kills the child when it expires; a timed-out session never yields a
//! partial extraction.

use crate::engine::{RawExtraction, RenderEngine, RenderRequest};
use crate::error::RenderError;
use crate::session::{RenderSession, SessionState};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// External renderer invocation
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    program: String,
    args: Vec<String>,
}

impl SandboxConfig {
    /// Sandbox driven by the given program
    #[inline]
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[inline]
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Runs each render in a fresh isolated subprocess
#[derive(Debug, Clone)]
pub struct SubprocessSandbox {
    config: SandboxConfig,
}

impl SubprocessSandbox {
    /// Create a sandbox with the given renderer invocation
    #[inline]
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RenderEngine for SubprocessSandbox {
    async fn render(&self, request: RenderRequest) -> Result<RawExtraction, RenderError> {
        let mut session = RenderSession::new(request.token_id, request.deadline);

        let mut child = match Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                session.fail();
                return Err(RenderError::Sandbox(format!(
                    "failed to spawn {}: {e}",
                    self.config.program
                )));
            }
        };

        session.advance(SessionState::Loading)?;

        let Some(mut stdin) = child.stdin.take() else {
            session.fail();
            return Err(RenderError::Sandbox("child stdin unavailable".to_string()));
        };
        if let Err(e) = stdin.write_all(request.harness.as_html().as_bytes()).await {
            session.fail();
            return Err(RenderError::Sandbox(format!("harness write failed: {e}")));
        }
        drop(stdin);

        session.advance(SessionState::AwaitingCompletion)?;

        // wait_with_output owns the child; if the deadline elapses the
        // future is dropped and kill_on_drop tears the process down.
        let output = match tokio::time::timeout(request.deadline, child.wait_with_output()).await {
            Err(_elapsed) => {
                session.fail();
                tracing::warn!(
                    token_id = request.token_id,
                    deadline = ?request.deadline,
                    "render deadline exceeded, sandbox killed"
                );
                return Err(RenderError::Timeout {
                    deadline: request.deadline,
                });
            }
            Ok(Err(e)) => {
                session.fail();
                return Err(RenderError::Sandbox(format!("child wait failed: {e}")));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            session.fail();
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Sandbox(format!(
                "renderer exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        session.advance(SessionState::Extracting)?;

        let raw: RawExtraction = match serde_json::from_slice(&output.stdout) {
            Ok(raw) => raw,
            Err(e) => {
                session.fail();
                return Err(RenderError::Sandbox(format!(
                    "unreadable extraction payload: {e}"
                )));
            }
        };

        session.advance(SessionState::Done)?;
        Ok(raw)
    }
}
