//! Test fixtures for integration tests
//!
//! Provides a fake transcoder and on-disk book layouts so the pipeline can be
//! exercised without a real media transcoder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::chapters::table::ChapterEntry;
use crate::chapters::{ChapterStatus, ResolvedChapter};
use crate::config::BuilderConfig;
use crate::error::TranscodeError;
use crate::index::SourceFile;
use crate::timecode::ChapterSpan;
use crate::transcode::{Invocation, Transcoder};

/// In-process [`Transcoder`] that writes its output file and records calls
///
/// Behaviour is keyed on the output file name.
#[derive(Debug, Default)]
pub struct FakeTranscoder {
    invocations: Mutex<Vec<Invocation>>,
    failures: Vec<String>,
    refusals: Vec<String>,
    timeouts: Vec<String>,
    write_before_delay: bool,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    require_absent_output: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with a two-line diagnostic when producing `name`
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failures.push(name.to_string());
        self
    }

    /// Answer like a transcoder that refuses to overwrite `name`
    pub fn refusing_overwrite_on(mut self, name: &str) -> Self {
        self.refusals.push(name.to_string());
        self
    }

    /// Leave a truncated `name` behind and report a timeout
    pub fn timing_out_on(mut self, name: &str) -> Self {
        self.timeouts.push(name.to_string());
        self
    }

    /// Start writing the output before the delay, like a real encoder would
    pub fn writing_before_delay(mut self) -> Self {
        self.write_before_delay = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn delaying(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    /// Fail any call whose output path already exists
    pub fn requiring_absent_output(mut self) -> Self {
        self.require_absent_output = true;
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    /// Output file names in the order the calls completed
    pub fn produced(&self) -> Vec<String> {
        self.invocations
            .lock()
            .iter()
            .map(|i| file_name(&i.output))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn produce(&self, invocation: &Invocation) -> Result<(), TranscodeError> {
        let name = file_name(&invocation.output);

        if self.require_absent_output && invocation.output.exists() {
            return Err(TranscodeError::OutputExists(invocation.output.clone()));
        }

        if self.write_before_delay {
            write_partial(invocation)?;
        }
        let delay = self.delays.get(&name).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.refusals.contains(&name) {
            return Err(TranscodeError::Failed {
                status: "exit status: 1".to_string(),
                stderr: format!("File '{}' already exists. Exiting.", invocation.output.display()),
            });
        }
        if self.failures.contains(&name) {
            return Err(TranscodeError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "line one\nline two".to_string(),
            });
        }
        if self.timeouts.contains(&name) {
            write_partial(invocation)?;
            return Err(TranscodeError::Timeout(Duration::from_secs(1)));
        }

        std::fs::write(&invocation.output, invocation.args.join("\n")).map_err(|source| {
            TranscodeError::Spawn {
                program: invocation.program.clone(),
                source,
            }
        })
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn run(&self, invocation: &Invocation) -> Result<(), TranscodeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.produce(invocation).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.invocations.lock().push(invocation.clone());
        result
    }
}

fn write_partial(invocation: &Invocation) -> Result<(), TranscodeError> {
    std::fs::write(&invocation.output, b"partial").map_err(|source| TranscodeError::Spawn {
        program: invocation.program.clone(),
        source,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// A pending chapter as the resolver would produce it
///
/// The source, when present, lives at `/data/<file>` with 1000 bytes.
pub fn resolved_chapter(
    index: f64,
    file: &str,
    start: &str,
    stop: &str,
    has_source: bool,
) -> ResolvedChapter {
    let entry = ChapterEntry {
        index,
        included: true,
        source_filename: file.to_string(),
        start_time: start.to_string(),
        stop_time: stop.to_string(),
        title: format!("Chapter {}", index),
    };
    let source = has_source.then(|| SourceFile {
        name: file.rsplit_once('.').map(|(n, _)| n).unwrap_or(file).to_string(),
        filename: file.to_string(),
        full_path: PathBuf::from("/data").join(file),
        directory: PathBuf::from("/data"),
        size_bytes: 1_000,
        modified_at: None,
    });

    ResolvedChapter {
        output_filename: crate::chapters::resolver::output_filename(
            index,
            &entry.title,
            crate::config::OutputNaming::Index,
            "m4a",
        ),
        timing: ChapterSpan::parse(start, stop),
        source,
        status: ChapterStatus::Pending,
        last_error: None,
        entry,
    }
}

/// A book layout on disk: data directory, chapter table and temp directory
pub struct BookFixture {
    pub root: TempDir,
    pub config: BuilderConfig,
}

impl BookFixture {
    /// Create `files` (paths relative to the data directory) and a chapter table
    pub fn new(files: &[&str], table_rows: &[&str]) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let data = root.path().join("data");
        std::fs::create_dir_all(&data).expect("data dir");
        for file in files {
            let path = data.join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("source dir");
            }
            std::fs::write(&path, vec![0u8; 1_000]).expect("source file");
        }

        let mut table = String::from("Index;Included;Filename;Start;Stop;Title\n");
        for row in table_rows {
            table.push_str(row);
            table.push('\n');
        }
        std::fs::write(data.join("timecodes.csv"), table).expect("chapter table");

        let mut config = BuilderConfig {
            data_directory: data,
            temp_directory: root.path().join("temp"),
            audio_file_extensions: vec![".mp3".to_string()],
            base_directory: root.path().to_path_buf(),
            ..Default::default()
        };
        config.metadata.title = "Test Book".to_string();
        config.metadata.artist = "Test Author".to_string();
        config.metadata.cover = "cover.jpg".to_string();
        config.transcoder.max_concurrent = 2;

        Self { root, config }
    }

    pub fn output_file(&self) -> PathBuf {
        self.root.path().join("book.m4b")
    }

    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.config.temp_directory.join(name)
    }

    pub fn read_temp(&self, name: &str) -> String {
        std::fs::read_to_string(self.temp_file(name)).expect("temp artifact")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_chapter_fixture() {
        let chapter = resolved_chapter(2.0, "a.mp3", "00:00:00", "00:00:10", true);
        assert_eq!(chapter.output_filename, "0002.m4a");
        assert_eq!(chapter.source.as_ref().unwrap().name, "a");
        assert!(chapter.timing.is_ok());

        let missing = resolved_chapter(3.0, "missing.mp3", "00:00:00", "00:00:10", false);
        assert!(missing.source.is_none());
    }

    #[test]
    fn test_book_fixture_layout() {
        let book = BookFixture::new(&["a.mp3", "part2/b.mp3"], &["1;1;a.mp3;00:00:00;00:00:10;One"]);
        assert!(book.config.data_directory.join("part2/b.mp3").exists());
        assert!(book.config.timecodes_path().exists());
        assert!(!book.config.temp_directory.exists());
    }

    #[tokio::test]
    async fn test_fake_transcoder_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeTranscoder::new();
        let invocation = Invocation {
            program: "ffmpeg".to_string(),
            args: vec!["-i".to_string(), "in.mp3".to_string()],
            output: dir.path().join("0001.m4a"),
        };
        fake.run(&invocation).await.unwrap();
        assert!(invocation.output.exists());
        assert_eq!(fake.produced(), vec!["0001.m4a"]);
        assert_eq!(fake.max_in_flight(), 1);
    }
}
