//! Child-process transcoder
//!
//! Runs the configured executable with `tokio::process`. Standard error is
//! captured so a failure carries the transcoder's complete diagnostic text.
//! Children are killed when their future is dropped (timeout or
//! cancellation); this is best effort and does not wait for the child to
//! exit.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Invocation, Transcoder};
use crate::error::TranscodeError;

/// Production [`Transcoder`] backed by an external executable
#[derive(Debug, Clone, Default)]
pub struct ProcessTranscoder {
    timeout: Option<Duration>,
}

impl ProcessTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Transcoder for ProcessTranscoder {
    async fn run(&self, invocation: &Invocation) -> Result<(), TranscodeError> {
        tracing::debug!("Running '{}'...", invocation.command_line());

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| TranscodeError::Timeout(limit))?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| TranscodeError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(TranscodeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            })
        }
    }
}
