//! Machine-readable run summary written next to the assembly artifacts

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::chapters::{ChapterStatus, ResolvedChapter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ChapterCounts {
    pub resolved: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of one chapter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterRecord {
    pub index: f64,
    pub title: String,
    pub source_file: String,
    pub output_file: String,
    pub status: ChapterStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub output_file: PathBuf,
    pub dry_run: bool,
    pub compiled: bool,
    pub elapsed_secs: f64,
    pub counts: ChapterCounts,
    pub chapters: Vec<ChapterRecord>,
}

impl RunSummary {
    pub fn new(output_file: &Path, dry_run: bool, chapters: &[ResolvedChapter]) -> Self {
        let mut counts = ChapterCounts {
            resolved: chapters.len(),
            ..Default::default()
        };
        for chapter in chapters {
            match chapter.status {
                ChapterStatus::Converted => counts.converted += 1,
                ChapterStatus::Skipped => counts.skipped += 1,
                ChapterStatus::Failed => counts.failed += 1,
                ChapterStatus::Pending => {}
            }
        }

        Self {
            output_file: output_file.to_path_buf(),
            dry_run,
            compiled: false,
            elapsed_secs: 0.0,
            counts,
            chapters: chapters
                .iter()
                .map(|c| ChapterRecord {
                    index: c.entry.index,
                    title: c.entry.title.clone(),
                    source_file: c.entry.source_filename.clone(),
                    output_file: c.output_filename.clone(),
                    status: c.status,
                    error: c.last_error.as_ref().map(|e| e.to_string()),
                })
                .collect(),
        }
    }

    pub fn finish(&mut self, compiled: bool, elapsed: Duration) {
        self.compiled = compiled;
        self.elapsed_secs = elapsed.as_secs_f64();
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        tracing::debug!("Wrote run summary to '{}'", path.display());
        Ok(())
    }
}
