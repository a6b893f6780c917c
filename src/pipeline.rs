//! Chapter compilation pipeline
//!
//! Drives one run end to end:
//! - validates the data directory and prepares the temp directory
//! - takes the single-instance lock
//! - loads the chapter table and scans the recordings
//! - resolves chapters and converts them on the bounded pool
//! - writes the concatenation list and metadata descriptor
//! - compiles the book and writes `summary.json`

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::assembly::{assemble, write_artifacts};
use crate::chapters::{load_chapter_table, resolve_chapters, ResolvedChapter};
use crate::compile::{CompileJob, Compiler};
use crate::config::BuilderConfig;
use crate::error::{BuilderError, ConfigError, Result};
use crate::index::scan_directory;
use crate::lock::InstanceLock;
use crate::scheduler::ConversionScheduler;
use crate::summary::RunSummary;
use crate::transcode::Transcoder;

pub struct Pipeline {
    config: BuilderConfig,
    transcoder: Arc<dyn Transcoder>,
    dry_run: bool,
}

impl Pipeline {
    pub fn new(config: BuilderConfig, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            config,
            transcoder,
            dry_run: false,
        }
    }

    /// Stop after writing the artifacts; no transcoder process is started
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the whole pipeline, producing `output_file`
    pub async fn run(&self, output_file: &Path) -> Result<RunSummary> {
        let started = Instant::now();
        let config = &self.config;

        if !config.data_directory.is_dir() {
            return Err(BuilderError::MissingDataDirectory(
                config.data_directory.clone(),
            ));
        }
        std::fs::create_dir_all(&config.temp_directory).map_err(|source| {
            BuilderError::TempDirectory {
                path: config.temp_directory.clone(),
                source,
            }
        })?;
        let _lock = InstanceLock::acquire(&config.lock_path())?;

        let entries = load_chapter_table(&config.timecodes_path())?;
        tracing::info!(
            "Loaded {} rows from '{}'",
            entries.len(),
            config.timecodes_path().display()
        );

        let root = config.data_directory.clone();
        let extensions = config.audio_file_extensions.clone();
        let sources = tokio::task::spawn_blocking(move || scan_directory(&root, &extensions))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        if sources.is_empty() {
            tracing::warn!(
                "No audio files were found in '{}'",
                config.data_directory.display()
            );
        }

        let mut chapters = resolve_chapters(
            entries,
            &sources,
            config.naming,
            &config.segment_extension,
        );
        tracing::info!("{} chapters selected for the audiobook", chapters.len());

        let scheduler = ConversionScheduler::new(config, Arc::clone(&self.transcoder))
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.dry_run {
            plan_only(&scheduler, &mut chapters);
        } else {
            scheduler.convert_all(&mut chapters).await;
        }

        let assembled = assemble(&chapters);
        write_artifacts(
            &config.concat_list_path(),
            &config.metadata_path(),
            &config.metadata,
            &assembled,
        )?;

        let mut summary = RunSummary::new(output_file, self.dry_run, &chapters);
        if self.dry_run {
            tracing::info!("Dry run, skipping compilation of '{}'", output_file.display());
            summary.finish(false, started.elapsed());
            summary.write(&config.summary_path())?;
            return Ok(summary);
        }

        if assembled.is_empty() {
            tracing::warn!("No chapter was converted successfully; the audiobook will be empty");
        }
        let compiler = Compiler::new(config, Arc::clone(&self.transcoder))
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let compiled = compiler
            .compile(&CompileJob::from_config(config, output_file))
            .await;

        summary.finish(compiled.is_ok(), started.elapsed());
        let written = summary.write(&config.summary_path());
        if let (Err(_), Err(e)) = (&compiled, &written) {
            tracing::error!("Failed to write the run summary: {}", e);
        }
        compiled?;
        written?;

        tracing::info!(
            "Finished in {:.1}s: {} converted, {} skipped, {} failed",
            summary.elapsed_secs,
            summary.counts.converted,
            summary.counts.skipped,
            summary.counts.failed
        );
        Ok(summary)
    }
}

/// Record the failures a real run would hit before spawning anything
fn plan_only(scheduler: &ConversionScheduler, chapters: &mut [ResolvedChapter]) {
    for chapter in chapters.iter_mut() {
        match scheduler.invocation_for(chapter) {
            Ok(invocation) => tracing::info!("Would run '{}'", invocation.command_line()),
            Err(e) => {
                tracing::warn!(
                    "Chapter {} '{}' cannot be converted: {}",
                    chapter.entry.index,
                    chapter.entry.title,
                    e
                );
                chapter.fail(e);
            }
        }
    }
}
