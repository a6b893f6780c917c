//! End-to-end integration tests

use std::sync::Arc;

use crate::error::Result;
use crate::integration::fixtures::{BookFixture, FakeTranscoder};
use crate::pipeline::Pipeline;
use crate::summary::RunSummary;

/// Run the whole pipeline over `book` with `transcoder`
pub async fn run_book(
    book: &BookFixture,
    transcoder: Arc<FakeTranscoder>,
    dry_run: bool,
) -> Result<RunSummary> {
    Pipeline::new(book.config.clone(), transcoder)
        .dry_run(dry_run)
        .run(&book.output_file())
        .await
}

/// Rows of the reference book: one excluded row and one missing recording
pub const SCENARIO_ROWS: &[&str] = &[
    "1;true;a.mp3;00:00:00;00:01:30;Intro",
    "2;false;a.mp3;00:01:30;00:02:00;Skipped",
    "3;true;missing.mp3;00:00:00;00:00:10;X",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::ChapterStatus;
    use crate::config::{CONCAT_LIST_FILE, LOCK_FILE, METADATA_FILE, SUMMARY_FILE};
    use crate::error::BuilderError;
    use crate::lock::InstanceLock;
    use std::time::Duration;

    #[tokio::test]
    async fn test_scenario_missing_source_is_isolated() {
        let book = BookFixture::new(&["a.mp3"], SCENARIO_ROWS);
        let fake = Arc::new(FakeTranscoder::new());

        let summary = run_book(&book, fake.clone(), false).await.unwrap();

        assert_eq!(summary.counts.resolved, 2);
        assert_eq!(summary.counts.converted, 1);
        assert_eq!(summary.counts.failed, 1);
        assert!(summary.compiled);
        assert_eq!(summary.chapters[0].index, 1.0);
        assert_eq!(summary.chapters[1].index, 3.0);
        assert_eq!(summary.chapters[1].status, ChapterStatus::Failed);

        assert_eq!(
            book.read_temp(CONCAT_LIST_FILE),
            "# generated list of audio files to compile\nfile '0001.m4a'\n"
        );
        let metadata = book.read_temp(METADATA_FILE);
        assert!(metadata.contains("START=0\nEND=90000\ntitle=Intro\n"));
        assert!(!metadata.contains("title=X"));

        // one conversion plus the final merge
        assert_eq!(fake.produced(), vec!["0001.m4a", "book.m4b"]);
        assert!(book.output_file().exists());
        assert!(book.temp_file(SUMMARY_FILE).exists());
        assert!(!book.temp_file(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_artifacts_follow_resolved_order_not_completion_order() {
        let book = BookFixture::new(
            &["a.mp3"],
            &[
                "2;true;a.mp3;00:01:00;00:03:00;Second",
                "1;true;a.mp3;00:00:00;00:01:00;First",
            ],
        );
        let fake = Arc::new(
            FakeTranscoder::new().delaying("0001.m4a", Duration::from_millis(150)),
        );

        run_book(&book, fake.clone(), false).await.unwrap();

        assert_eq!(fake.produced()[..2], ["0002.m4a", "0001.m4a"]);
        assert_eq!(
            book.read_temp(CONCAT_LIST_FILE),
            "# generated list of audio files to compile\nfile '0001.m4a'\nfile '0002.m4a'\n"
        );
        let metadata = book.read_temp(METADATA_FILE);
        let first = metadata.find("title=First").unwrap();
        let second = metadata.find("title=Second").unwrap();
        assert!(first < second);
        assert!(metadata.contains("START=60000\nEND=180000\ntitle=Second"));
    }

    #[tokio::test]
    async fn test_rerun_produces_identical_artifacts() {
        let book = BookFixture::new(
            &["a.mp3", "disc2/b.mp3"],
            &[
                "1;true;a.mp3;00:00:00;00:10:00.123;One",
                "2;true;b.mp3;00:00:05;00:07:00;Two",
                "2.5;true;b.mp3;00:07:00;00:09:59.9999;Two and a half",
            ],
        );

        let first_run = Arc::new(FakeTranscoder::new().requiring_absent_output());
        let first = run_book(&book, first_run, false).await.unwrap();
        let list = book.read_temp(CONCAT_LIST_FILE);
        let metadata = book.read_temp(METADATA_FILE);
        assert_eq!(first.counts.converted, 3);

        // The previous book is still on disk; the merge must see it removed
        let second_run = Arc::new(FakeTranscoder::new().requiring_absent_output());
        let second = run_book(&book, second_run.clone(), false).await.unwrap();

        assert_eq!(second.counts.skipped, 3);
        assert!(second.compiled);
        assert_eq!(second_run.produced(), vec!["book.m4b"]);
        assert_eq!(book.read_temp(CONCAT_LIST_FILE), list);
        assert_eq!(book.read_temp(METADATA_FILE), metadata);
    }

    #[tokio::test]
    async fn test_recordings_in_subdirectories_are_found() {
        let book = BookFixture::new(
            &["a.mp3", "b.mp3", "extra/c.mp3", "extra/notes.txt"],
            &[
                "1;1;a.mp3;00:00:00;00:00:10;A",
                "2;1;b.mp3;00:00:00;00:00:10;B",
                "3;1;c.mp3;00:00:00;00:00:10;C",
                "4;1;notes.txt;00:00:00;00:00:10;Not audio",
            ],
        );
        let fake = Arc::new(FakeTranscoder::new());

        let summary = run_book(&book, fake.clone(), false).await.unwrap();

        assert_eq!(summary.counts.converted, 3);
        assert_eq!(summary.counts.failed, 1);
        assert!(fake
            .invocations()
            .iter()
            .any(|i| i.args.iter().any(|a| a.ends_with("extra/c.mp3"))));
    }

    #[tokio::test]
    async fn test_invalid_timing_is_excluded_from_the_book() {
        let book = BookFixture::new(
            &["a.mp3"],
            &[
                "1;true;a.mp3;00:00:00;00:00:30;Good",
                "2;true;a.mp3;soon;00:01:00;Bad start",
                "3;true;a.mp3;00:02:00;00:01:00;Backwards",
                "4;true;a.mp3;00:01:00;00:01:30;Also good",
            ],
        );
        let fake = Arc::new(FakeTranscoder::new());

        let summary = run_book(&book, fake.clone(), false).await.unwrap();

        assert_eq!(summary.counts.converted, 2);
        assert_eq!(summary.counts.failed, 2);
        assert_eq!(
            book.read_temp(CONCAT_LIST_FILE),
            "# generated list of audio files to compile\nfile '0001.m4a'\nfile '0004.m4a'\n"
        );
        assert!(book
            .read_temp(METADATA_FILE)
            .contains("START=30000\nEND=60000\ntitle=Also good"));
    }

    #[tokio::test]
    async fn test_conversion_failure_drops_chapter_but_book_is_built() {
        let book = BookFixture::new(
            &["a.mp3"],
            &[
                "1;true;a.mp3;00:00:00;00:00:30;One",
                "2;true;a.mp3;00:00:30;00:01:00;Two",
                "3;true;a.mp3;00:01:00;00:01:30;Three",
            ],
        );
        let fake = Arc::new(FakeTranscoder::new().failing_on("0002.m4a"));

        let summary = run_book(&book, fake, false).await.unwrap();

        assert!(summary.compiled);
        assert_eq!(summary.counts.failed, 1);
        let error = summary.chapters[1].error.as_deref().unwrap();
        assert!(error.contains("line one") && error.contains("line two"));
        assert!(!book.read_temp(CONCAT_LIST_FILE).contains("0002.m4a"));
        assert!(book
            .read_temp(METADATA_FILE)
            .contains("START=30000\nEND=60000\ntitle=Three"));
    }

    #[tokio::test]
    async fn test_compile_failure_is_fatal() {
        let book = BookFixture::new(&["a.mp3"], &["1;true;a.mp3;00:00:00;00:00:30;One"]);
        std::fs::write(book.output_file(), b"old book").unwrap();
        let fake = Arc::new(FakeTranscoder::new().failing_on("book.m4b"));

        let err = run_book(&book, fake, false).await.unwrap_err();

        assert!(matches!(err, BuilderError::Compile(_)));
        assert_eq!(err.exit_code(), 6);
        assert!(!book.output_file().exists());
        let summary: serde_json::Value =
            serde_json::from_str(&book.read_temp(SUMMARY_FILE)).unwrap();
        assert_eq!(summary["compiled"], false);
        assert!(!book.temp_file(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_compile_failure_wins_over_summary_write_failure() {
        let book = BookFixture::new(&["a.mp3"], &["1;true;a.mp3;00:00:00;00:00:30;One"]);
        // A directory where summary.json should go makes the write fail
        std::fs::create_dir_all(book.temp_file(SUMMARY_FILE)).unwrap();
        let fake = Arc::new(FakeTranscoder::new().failing_on("book.m4b"));

        let err = run_book(&book, fake, false).await.unwrap_err();

        assert!(matches!(err, BuilderError::Compile(_)));
        assert_eq!(err.exit_code(), 6);
    }

    #[tokio::test]
    async fn test_timed_out_chapter_is_converted_on_rerun() {
        let book = BookFixture::new(
            &["a.mp3"],
            &[
                "1;true;a.mp3;00:00:00;00:00:30;One",
                "2;true;a.mp3;00:00:30;00:01:00;Two",
            ],
        );

        let first_run = Arc::new(FakeTranscoder::new().timing_out_on("0001.m4a"));
        let first = run_book(&book, first_run, false).await.unwrap();
        assert_eq!(first.chapters[0].status, ChapterStatus::Failed);
        assert!(!book.temp_file("0001.m4a").exists());

        let second_run = Arc::new(FakeTranscoder::new());
        let second = run_book(&book, second_run.clone(), false).await.unwrap();

        assert_eq!(second.chapters[0].status, ChapterStatus::Converted);
        assert_eq!(second.chapters[1].status, ChapterStatus::Skipped);
        assert_eq!(second_run.produced(), vec!["0001.m4a", "book.m4b"]);
        assert_eq!(
            book.read_temp(CONCAT_LIST_FILE),
            "# generated list of audio files to compile\nfile '0001.m4a'\nfile '0002.m4a'\n"
        );
    }

    #[tokio::test]
    async fn test_dry_run_starts_no_transcoder() {
        let book = BookFixture::new(&["a.mp3"], SCENARIO_ROWS);
        let fake = Arc::new(FakeTranscoder::new());

        let summary = run_book(&book, fake.clone(), true).await.unwrap();

        assert!(fake.invocations().is_empty());
        assert!(summary.dry_run);
        assert!(!summary.compiled);
        assert_eq!(summary.chapters[0].status, ChapterStatus::Pending);
        assert_eq!(summary.chapters[1].status, ChapterStatus::Failed);
        assert_eq!(
            book.read_temp(CONCAT_LIST_FILE),
            "# generated list of audio files to compile\nfile '0001.m4a'\n"
        );
        assert!(!book.output_file().exists());
    }

    #[tokio::test]
    async fn test_missing_data_directory() {
        let mut book = BookFixture::new(&[], &[]);
        book.config.data_directory = book.root.path().join("nowhere");

        let err = run_book(&book, Arc::new(FakeTranscoder::new()), false)
            .await
            .unwrap_err();

        assert!(matches!(err, BuilderError::MissingDataDirectory(_)));
        assert_eq!(err.exit_code(), 3);
        assert!(!book.config.temp_directory.exists());
    }

    #[tokio::test]
    async fn test_missing_chapter_table() {
        let mut book = BookFixture::new(&["a.mp3"], &[]);
        book.config.timecodes_file = "absent.csv".into();

        let err = run_book(&book, Arc::new(FakeTranscoder::new()), false)
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 4);
        assert!(!book.temp_file(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_second_instance_is_refused() {
        let book = BookFixture::new(&["a.mp3"], SCENARIO_ROWS);
        std::fs::create_dir_all(&book.config.temp_directory).unwrap();
        let _running = InstanceLock::acquire(&book.temp_file(LOCK_FILE)).unwrap();
        let fake = Arc::new(FakeTranscoder::new());

        let err = run_book(&book, fake.clone(), false).await.unwrap_err();

        assert!(matches!(err, BuilderError::AlreadyRunning(_)));
        assert_eq!(err.exit_code(), 5);
        assert!(fake.invocations().is_empty());
        // The other instance's lock is left alone
        assert!(book.temp_file(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_lock_file_left_by_killed_run_does_not_block() {
        let book = BookFixture::new(&["a.mp3"], SCENARIO_ROWS);
        std::fs::create_dir_all(&book.config.temp_directory).unwrap();
        std::fs::write(book.temp_file(LOCK_FILE), "999999999\n").unwrap();

        let summary = run_book(&book, Arc::new(FakeTranscoder::new()), false)
            .await
            .unwrap();

        assert!(summary.compiled);
        assert!(!book.temp_file(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_dropped_run_releases_lock() {
        let book = BookFixture::new(&["a.mp3"], &["1;true;a.mp3;00:00:00;00:00:30;One"]);
        let fake = Arc::new(FakeTranscoder::new().with_delay(Duration::from_secs(30)));
        let pipeline = Pipeline::new(book.config.clone(), fake);
        let output = book.output_file();

        let interrupted = tokio::time::timeout(Duration::from_millis(200), pipeline.run(&output)).await;

        assert!(interrupted.is_err());
        assert!(book.config.temp_directory.exists());
        assert!(!book.temp_file(LOCK_FILE).exists());
    }
}
