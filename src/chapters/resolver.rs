//! Chapter resolution
//!
//! Joins chapter rows to scanned recordings:
//! - drops excluded rows and rows without start/stop text
//! - stable-sorts by index (equal indices keep table order)
//! - looks up the source file by exact filename
//! - parses the timing once, keeping a per-chapter result
//! - derives the per-chapter output file name

use serde::Serialize;

use crate::chapters::table::ChapterEntry;
use crate::config::OutputNaming;
use crate::error::{ChapterError, TimecodeError};
use crate::index::{SourceFile, SourceIndex};
use crate::timecode::ChapterSpan;

/// Conversion state of a resolved chapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Pending,
    Converted,
    /// Output was already present; kept as-is
    Skipped,
    Failed,
}

/// A chapter after filtering, ordering and source matching
#[derive(Debug, Clone)]
pub struct ResolvedChapter {
    pub entry: ChapterEntry,
    /// `None` when no scanned file carries the requested name
    pub source: Option<SourceFile>,
    pub output_filename: String,
    pub timing: Result<ChapterSpan, TimecodeError>,
    pub status: ChapterStatus,
    pub last_error: Option<ChapterError>,
}

impl ResolvedChapter {
    pub fn fail(&mut self, error: ChapterError) {
        self.status = ChapterStatus::Failed;
        self.last_error = Some(error);
    }
}

/// Filter, order and match chapter rows against the source index
pub fn resolve_chapters(
    entries: Vec<ChapterEntry>,
    sources: &SourceIndex,
    naming: OutputNaming,
    extension: &str,
) -> Vec<ResolvedChapter> {
    let mut selected: Vec<ChapterEntry> = entries
        .into_iter()
        .filter(|e| e.included && !e.start_time.trim().is_empty() && !e.stop_time.trim().is_empty())
        .collect();
    selected.sort_by(|a, b| a.index.total_cmp(&b.index));

    selected
        .into_iter()
        .map(|entry| {
            let timing = ChapterSpan::parse(&entry.start_time, &entry.stop_time);
            if let Err(e) = &timing {
                tracing::warn!("Chapter {} '{}': {}", entry.index, entry.title, e);
            }

            let source = sources.get(&entry.source_filename).cloned();
            match &source {
                Some(file) => tracing::debug!(
                    "Chapter {} '{}' uses '{}' in {} (modified {})",
                    entry.index,
                    entry.title,
                    file.name,
                    file.directory.display(),
                    file.modified_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                ),
                None => tracing::warn!(
                    "Chapter {} '{}': source file '{}' was not found",
                    entry.index,
                    entry.title,
                    entry.source_filename
                ),
            }

            ResolvedChapter {
                source,
                output_filename: output_filename(entry.index, &entry.title, naming, extension),
                timing,
                status: ChapterStatus::Pending,
                last_error: None,
                entry,
            }
        })
        .collect()
}

/// Zero-padded rendering of a chapter index, unique per distinct value
///
/// Integers render as at least four digits (`7` → `0007`); a fractional part
/// is appended after a dash (`1.5` → `0001-5`).
pub fn index_stem(index: f64) -> String {
    let sign = if index < 0.0 { "-" } else { "" };
    // Display for f64 never uses exponent notation, so very large indices
    // keep every digit instead of saturating
    let rendered = index.abs().to_string();
    match rendered.split_once('.') {
        Some((whole, fraction)) => format!("{sign}{whole:0>4}-{fraction}"),
        None => format!("{sign}{rendered:0>4}"),
    }
}

/// Per-chapter output file name
pub fn output_filename(index: f64, title: &str, naming: OutputNaming, extension: &str) -> String {
    let stem = index_stem(index);
    let title = sanitize_title(title);
    match naming {
        OutputNaming::IndexAndTitle if !title.is_empty() => {
            format!("{stem} - {title}.{extension}")
        }
        _ => format!("{stem}.{extension}"),
    }
}

fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .trim_end_matches('.')
        .to_string()
}
