//! Assembly descriptors
//!
//! Renders the two control files the compilation step consumes:
//! - the concatenation list, one `file '<name>'` line per chapter
//! - the ffmetadata descriptor with book tags and one `[CHAPTER]` block per chapter
//!
//! Both are produced from the resolved order alone, never from completion
//! order, and are rewritten in full on every run.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use crate::chapters::{ChapterStatus, ResolvedChapter};
use crate::config::MetadataConfig;
use crate::timecode::{truncate_millis, ChapterSpan};

pub const CONCAT_LIST_HEADER: &str = "# generated list of audio files to compile";
pub const METADATA_HEADER: &str = ";FFMETADATA1";

/// One chapter as it appears in the final book
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledChapter {
    pub output_filename: String,
    pub title: String,
    /// Offset of the chapter in the compiled book
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Pick the chapters that go into the book and lay out their positions
///
/// Failed chapters have no usable output and are dropped with a warning.
/// Positions accumulate table durations, not converted-file durations.
pub fn assemble(chapters: &[ResolvedChapter]) -> Vec<AssembledChapter> {
    let mut position = Duration::ZERO;
    let mut assembled = Vec::with_capacity(chapters.len());

    for chapter in chapters {
        let span: ChapterSpan = match (&chapter.status, &chapter.timing) {
            (ChapterStatus::Failed, _) | (_, Err(_)) => {
                let reason = chapter
                    .last_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "conversion did not succeed".to_string());
                tracing::warn!(
                    "Chapter {} '{}' is dropped from the audiobook: {}",
                    chapter.entry.index,
                    chapter.entry.title,
                    reason
                );
                continue;
            }
            (_, Ok(span)) => *span,
        };

        let end = position + span.duration();
        assembled.push(AssembledChapter {
            output_filename: chapter.output_filename.clone(),
            title: chapter.entry.title.clone(),
            start_ms: truncate_millis(position),
            end_ms: truncate_millis(end),
        });
        position = end;
    }
    assembled
}

/// Concatenation list contents
pub fn render_concat_list(chapters: &[AssembledChapter]) -> String {
    let mut out = String::new();
    out.push_str(CONCAT_LIST_HEADER);
    out.push('\n');
    for chapter in chapters {
        let _ = writeln!(out, "file '{}'", escape_concat_path(&chapter.output_filename));
    }
    out
}

/// ffmetadata descriptor contents
pub fn render_metadata(metadata: &MetadataConfig, chapters: &[AssembledChapter]) -> String {
    let mut out = String::new();
    out.push_str(METADATA_HEADER);
    out.push('\n');

    let tags: [(&str, &str); 11] = [
        ("author", &metadata.artist),
        ("artist", &metadata.artist),
        ("album_artist", &metadata.artist),
        ("title", &metadata.title),
        ("album", &metadata.album),
        ("year", &metadata.year),
        ("date", &metadata.year),
        ("genre", &metadata.genre),
        ("description", &metadata.description),
        ("comment", &metadata.description),
        ("language", &metadata.language),
    ];
    for (key, value) in tags {
        let _ = writeln!(out, "{}={}", key, escape_metadata_value(value));
    }

    for chapter in chapters {
        out.push('\n');
        out.push_str("[CHAPTER]\n");
        out.push_str("TIMEBASE=1/1000\n");
        let _ = writeln!(out, "START={}", chapter.start_ms);
        let _ = writeln!(out, "END={}", chapter.end_ms);
        let _ = writeln!(out, "title={}", escape_metadata_value(&chapter.title));
    }
    out
}

/// Write both artifacts, replacing whatever was there
pub fn write_artifacts(
    concat_list: &Path,
    metadata_file: &Path,
    metadata: &MetadataConfig,
    chapters: &[AssembledChapter],
) -> std::io::Result<()> {
    std::fs::write(concat_list, render_concat_list(chapters))?;
    std::fs::write(metadata_file, render_metadata(metadata, chapters))?;
    tracing::info!(
        "Wrote {} chapters to '{}' and '{}'",
        chapters.len(),
        concat_list.display(),
        metadata_file.display()
    );
    Ok(())
}

fn escape_metadata_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn escape_concat_path(name: &str) -> String {
    name.replace('\'', "'\\''")
}
