//! Chapter table handling
//!
//! - `table`: loads the semicolon-separated timecode table
//! - `resolver`: filters, orders and matches rows against scanned recordings

pub mod resolver;
pub mod table;

pub use resolver::{resolve_chapters, ChapterStatus, ResolvedChapter};
pub use table::{load_chapter_table, ChapterEntry};
