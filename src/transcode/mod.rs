//! External transcoder
//!
//! This module wraps the media transcoder behind a narrow interface:
//! - `template`: argument templates with `%placeholder%` substitution
//! - `process`: the production implementation running a child process
//! - [`Transcoder`]: the seam the scheduler and compilation driver use

pub mod process;
pub mod template;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TranscodeError;

pub use process::ProcessTranscoder;
pub use template::CommandTemplate;

/// One fully rendered transcoder call
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// File the call is expected to produce
    pub output: PathBuf,
}

impl Invocation {
    /// Printable command line for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) {
                    format!("\"{}\"", a)
                } else {
                    a.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Opaque media transcoding operation: inputs in, output file out, pass or fail
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<(), TranscodeError>;
}

/// Retry policy around a transcoder call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Run `invocation`, retrying failures that may be transient
///
/// "Output already exists" and spawn failures are returned immediately.
pub async fn run_with_retry(
    transcoder: &dyn Transcoder,
    invocation: &Invocation,
    policy: RetryPolicy,
) -> Result<(), TranscodeError> {
    let mut attempt = 0;
    loop {
        match transcoder.run(invocation).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_output_exists() || matches!(e, TranscodeError::Spawn { .. }) => {
                return Err(e)
            }
            Err(e) if attempt < policy.retries => {
                attempt += 1;
                let reason = e.to_string();
                tracing::warn!(
                    "Attempt {} for '{}' failed, retrying: {}",
                    attempt,
                    invocation.output.display(),
                    reason.lines().next().unwrap_or_default()
                );
                discard_partial_output(&invocation.output);
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Remove whatever a failed or interrupted call left at `path`
pub fn discard_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::warn!("Removed incomplete output '{}'", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            "Failed to remove incomplete output '{}': {}",
            path.display(),
            e
        ),
    }
}
