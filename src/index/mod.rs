//! Source file indexing
//!
//! This module builds the filename-keyed index of recordings:
//! - Recursive, ordered directory walk (files first, then subdirectories)
//! - Extension allow-list filtering
//! - Best-effort metadata capture (files that cannot be stat'ed are skipped)

pub mod scanner;

pub use scanner::{scan_directory, SourceFile, SourceIndex};
