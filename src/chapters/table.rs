//! Chapter table loader
//!
//! Reads the semicolon-separated timecode table. Columns are mapped by
//! position: index, included flag, source filename, start time, stop time,
//! chapter title. The first row is a header and is skipped.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::LoadError;

/// One row of the chapter table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChapterEntry {
    /// Ordering key; fractional values insert chapters between others
    pub index: f64,
    #[serde(deserialize_with = "deserialize_flag")]
    pub included: bool,
    /// Join key against the source index (file name, not path)
    pub source_filename: String,
    /// Raw start time text, parsed during resolution
    pub start_time: String,
    /// Raw stop time text, parsed during resolution
    pub stop_time: String,
    pub title: String,
}

impl fmt::Display for ChapterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}-{})",
            self.source_filename, self.start_time, self.stop_time
        )
    }
}

/// Accepts true/false, yes/no, 1/0 and x/empty in any case
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "x" => Ok(true),
        "false" | "no" | "n" | "0" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid included flag '{}'",
            other
        ))),
    }
}

/// Load every row of the chapter table in file order
pub fn load_chapter_table(path: &Path) -> Result<Vec<ChapterEntry>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_chapter_table(file, path)
}

/// Parse chapter rows from any reader; `path` is only used in errors
pub fn read_chapter_table<R: std::io::Read>(
    reader: R,
    path: &Path,
) -> Result<Vec<ChapterEntry>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();
    for record in csv_reader.records() {
        let row_error = |source: csv::Error| LoadError::Row {
            path: path.to_path_buf(),
            row: source
                .position()
                .map(|p| p.line())
                .unwrap_or(entries.len() as u64 + 2),
            source,
        };

        let record = record.map_err(row_error)?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(entries.len() as u64 + 2);
        let entry: ChapterEntry = record.deserialize(None).map_err(row_error)?;

        if !entry.index.is_finite() {
            return Err(LoadError::InvalidIndex {
                path: path.to_path_buf(),
                row: line,
            });
        }
        entries.push(entry);
    }

    tracing::debug!("Loaded {} chapter rows from {}", entries.len(), path.display());
    Ok(entries)
}
