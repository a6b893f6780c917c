//! Directory scanner - enumerates recordings and indexes them by filename

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use walkdir::{DirEntry, WalkDir};

/// One recording found under the data directory
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// File name without extension
    pub name: String,
    /// File name with extension; the index key
    pub filename: String,
    pub full_path: PathBuf,
    pub directory: PathBuf,
    pub size_bytes: u64,
    pub modified_at: Option<DateTime<Local>>,
}

impl SourceFile {
    /// Snapshot a directory entry, `None` if it cannot be described
    fn from_entry(entry: &DirEntry) -> Option<Self> {
        let metadata = entry.metadata().ok()?;
        let path = entry.path();
        let filename = path.file_name()?.to_str()?.to_string();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&filename)
            .to_string();
        let full_path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let directory = full_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Some(Self {
            name,
            filename,
            directory,
            full_path,
            size_bytes: metadata.len(),
            modified_at: metadata.modified().ok().map(DateTime::<Local>::from),
        })
    }
}

/// Filename-keyed lookup of scanned recordings
///
/// Lookups compare the exact bytes of the filename; whether two names that
/// differ only in case can both exist is up to the filesystem.
#[derive(Debug, Default)]
pub struct SourceIndex {
    files: HashMap<String, SourceFile>,
}

impl SourceIndex {
    /// Build from files in scan order; a later file with the same name replaces
    /// the earlier one
    pub fn from_files(files: impl IntoIterator<Item = SourceFile>) -> Self {
        let mut index = Self::default();
        for file in files {
            index.insert(file);
        }
        index
    }

    pub fn insert(&mut self, file: SourceFile) {
        if let Some(previous) = self.files.insert(file.filename.clone(), file) {
            let current = &self.files[&previous.filename];
            tracing::warn!(
                "Duplicate file name '{}': using {} instead of {}",
                previous.filename,
                current.full_path.display(),
                previous.full_path.display()
            );
        }
    }

    pub fn get(&self, filename: &str) -> Option<&SourceFile> {
        self.files.get(filename)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|f| f.size_bytes).sum()
    }
}

/// Walk `root` depth-first and return the matching files in visit order
///
/// Within a directory, files come first and then subdirectories, each in
/// lexicographic order. Entries that cannot be read or stat'ed are skipped.
pub fn walk_audio_files(root: &Path, extensions: &[String]) -> Vec<SourceFile> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && has_allowed_extension(entry.path(), extensions))
        .filter_map(|entry| SourceFile::from_entry(&entry))
        .collect()
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|allowed| allowed.strip_prefix('.') == Some(ext))
}

/// Scan the data directory and index every allowed recording by filename
pub fn scan_directory(root: &Path, extensions: &[String]) -> SourceIndex {
    let started = Instant::now();
    tracing::info!("Scanning data directory for audio files...");

    let index = SourceIndex::from_files(walk_audio_files(root, extensions));

    tracing::info!(
        "{} files ({:.1} MB) were found in the data directory in {} ms.",
        index.len(),
        index.total_bytes() as f64 / (1024.0 * 1024.0),
        started.elapsed().as_millis()
    );
    index
}
