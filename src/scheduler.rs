//! Conversion scheduler
//!
//! Converts every resolved chapter into its own file in the temp directory.
//! Launches are gated by a semaphore so at most `max_concurrent` transcoder
//! processes run at once. A chapter's failure is recorded on that chapter;
//! the batch always runs to completion and the coordinator waits for every
//! worker before returning.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::chapters::{ChapterStatus, ResolvedChapter};
use crate::config::BuilderConfig;
use crate::error::{ChapterError, TranscodeError};
use crate::progress::{report_progress, Progress};
use crate::transcode::{
    discard_partial_output, run_with_retry, CommandTemplate, Invocation, RetryPolicy, Transcoder,
};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// How a single conversion ended
#[derive(Debug)]
enum Outcome {
    Converted,
    Skipped,
    Failed(ChapterError),
}

/// Counts for one conversion batch
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConversionReport {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub input_bytes: u64,
    pub elapsed: Duration,
}

/// Runs per-chapter conversions on a bounded worker pool
pub struct ConversionScheduler {
    transcoder: Arc<dyn Transcoder>,
    program: String,
    template: CommandTemplate,
    temp_directory: PathBuf,
    max_concurrent: usize,
    retry: RetryPolicy,
}

impl ConversionScheduler {
    pub fn new(
        config: &BuilderConfig,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self, TranscodeError> {
        Ok(Self {
            transcoder,
            program: config.transcoder.program.clone(),
            template: CommandTemplate::parse(&config.transcoder.conversion)?,
            temp_directory: config.temp_directory.clone(),
            max_concurrent: config.transcoder.max_concurrent.max(1),
            retry: RetryPolicy {
                retries: config.transcoder.retries,
                backoff: Duration::from_millis(config.transcoder.retry_backoff_ms),
            },
        })
    }

    /// Where a chapter's converted file goes
    pub fn output_path(&self, chapter: &ResolvedChapter) -> PathBuf {
        self.temp_directory.join(&chapter.output_filename)
    }

    /// Render the conversion call for one chapter
    ///
    /// Fails when the chapter has no source file or no valid timing.
    pub fn invocation_for(&self, chapter: &ResolvedChapter) -> Result<Invocation, ChapterError> {
        let span = chapter.timing.clone()?;
        let source = chapter
            .source
            .as_ref()
            .ok_or_else(|| ChapterError::MissingSource(chapter.entry.source_filename.clone()))?;

        let output = self.output_path(chapter);
        let input = source.full_path.to_string_lossy();
        let output_str = output.to_string_lossy();
        let start = span.start.to_string();
        let stop = span.stop.to_string();
        let args = self.template.render(&[
            ("%inputfile%", &input),
            ("%outputfile%", &output_str),
            ("%starttime%", &start),
            ("%stoptime%", &stop),
        ]);

        Ok(Invocation {
            program: self.program.clone(),
            args,
            output,
        })
    }

    /// Convert every chapter; returns once all workers have finished
    pub async fn convert_all(&self, chapters: &mut [ResolvedChapter]) -> ConversionReport {
        let progress = Arc::new(Progress::new(chapters.len()));
        let reporter = tokio::spawn(report_progress(Arc::clone(&progress), REPORT_INTERVAL));
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut workers: JoinSet<(usize, Outcome)> = JoinSet::new();
        let mut pending: HashSet<usize> = HashSet::new();

        tracing::info!(
            "Converting {} chapters with up to {} concurrent transcoder processes",
            chapters.len(),
            self.max_concurrent
        );

        for (position, chapter) in chapters.iter_mut().enumerate() {
            let invocation = match self.invocation_for(chapter) {
                Ok(invocation) => invocation,
                Err(e) => {
                    record_outcome(chapter, Outcome::Failed(e));
                    progress.record(0);
                    continue;
                }
            };

            if output_exists(&invocation.output) {
                record_outcome(chapter, Outcome::Skipped);
                progress.record(0);
                continue;
            }

            let source_filename = chapter.entry.source_filename.clone();
            let input_bytes = chapter.source.as_ref().map(|s| s.size_bytes).unwrap_or(0);
            let transcoder = Arc::clone(&self.transcoder);
            let permits = Arc::clone(&permits);
            let progress = Arc::clone(&progress);
            let retry = self.retry;

            pending.insert(position);
            workers.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => {
                        tracing::info!("Converting '{}', please wait.", source_filename);
                        let mut partial = PartialOutput::new(&invocation.output);
                        match run_with_retry(transcoder.as_ref(), &invocation, retry).await {
                            Ok(()) => {
                                partial.keep();
                                Outcome::Converted
                            }
                            Err(e) if e.is_output_exists() => {
                                partial.keep();
                                Outcome::Skipped
                            }
                            Err(e) => Outcome::Failed(ChapterError::Conversion(e.to_string())),
                        }
                    }
                    Err(e) => Outcome::Failed(ChapterError::Aborted(e.to_string())),
                };
                let consumed = if matches!(outcome, Outcome::Converted) {
                    input_bytes
                } else {
                    0
                };
                progress.record(consumed);
                (position, outcome)
            });
        }

        // Barrier: every scheduled conversion must finish before assembly
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((position, outcome)) => {
                    pending.remove(&position);
                    record_outcome(&mut chapters[position], outcome);
                }
                Err(e) => tracing::error!("Conversion worker terminated abnormally: {}", e),
            }
        }
        for position in pending {
            progress.record(0);
            record_outcome(
                &mut chapters[position],
                Outcome::Failed(ChapterError::Aborted("worker did not report".to_string())),
            );
        }
        reporter.abort();

        let snap = progress.snapshot();
        let report = ConversionReport {
            converted: count(chapters, ChapterStatus::Converted),
            skipped: count(chapters, ChapterStatus::Skipped),
            failed: count(chapters, ChapterStatus::Failed),
            input_bytes: snap.bytes_in,
            elapsed: snap.elapsed,
        };
        tracing::info!(
            "Conversion finished in {:.1}s: {} converted, {} skipped, {} failed ({:.1} MB/s input)",
            report.elapsed.as_secs_f64(),
            report.converted,
            report.skipped,
            report.failed,
            snap.throughput() / (1024.0 * 1024.0)
        );
        report
    }
}

/// Removes a chapter's output unless the conversion is known to be complete
///
/// Dropped on failure and when the worker is aborted, so the next run never
/// mistakes a truncated file for a finished one.
struct PartialOutput<'a> {
    path: &'a Path,
    complete: bool,
}

impl<'a> PartialOutput<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            complete: false,
        }
    }

    fn keep(&mut self) {
        self.complete = true;
    }
}

impl Drop for PartialOutput<'_> {
    fn drop(&mut self) {
        if !self.complete {
            discard_partial_output(self.path);
        }
    }
}

fn output_exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}

fn count(chapters: &[ResolvedChapter], status: ChapterStatus) -> usize {
    chapters.iter().filter(|c| c.status == status).count()
}

fn record_outcome(chapter: &mut ResolvedChapter, outcome: Outcome) {
    match outcome {
        Outcome::Converted => {
            chapter.status = ChapterStatus::Converted;
            chapter.last_error = None;
        }
        Outcome::Skipped => {
            tracing::warn!(
                "File '{}' already exists, skipping.",
                chapter.output_filename
            );
            chapter.status = ChapterStatus::Skipped;
            chapter.last_error = None;
        }
        Outcome::Failed(error) => {
            tracing::error!(
                "Chapter {} '{}' ({}) failed: {}",
                chapter.entry.index,
                chapter.entry.title,
                chapter.entry,
                error
            );
            chapter.fail(error);
        }
    }
}
