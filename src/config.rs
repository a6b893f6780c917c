//! Builder configuration
//!
//! The resolved configuration handed to every pipeline component. Nothing in
//! the crate reads configuration from ambient process state; each component
//! receives the part it needs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How per-chapter output files are named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputNaming {
    /// `0001.m4a`
    #[default]
    Index,
    /// `0001 - Chapter title.m4a`
    IndexAndTitle,
}

impl std::str::FromStr for OutputNaming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "index" => Ok(OutputNaming::Index),
            "index_and_title" | "indexandtitle" => Ok(OutputNaming::IndexAndTitle),
            other => Err(format!("unknown naming mode '{}'", other)),
        }
    }
}

/// Book-level tags and cover art
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct MetadataConfig {
    /// Cover image, relative to the configuration file's directory
    pub cover: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub genre: String,
    pub description: String,
    pub language: String,
}

/// External transcoder invocation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscoderConfig {
    /// Transcoder executable
    pub program: String,

    /// Per-chapter conversion arguments.
    /// Placeholders: `%inputfile%`, `%outputfile%`, `%starttime%`, `%stoptime%`
    pub conversion: String,

    /// Final compilation arguments.
    /// Placeholders: `%inputfiles%`, `%metadatafile%`, `%coverfile%`, `%outputfile%`
    pub compilation: String,

    /// Maximum number of conversions running at once
    pub max_concurrent: usize,

    /// Per-operation timeout in seconds (0 = none)
    pub timeout_secs: u64,

    /// Extra attempts after a failed conversion
    pub retries: u32,

    /// Delay before the first retry, grows linearly per attempt
    pub retry_backoff_ms: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            conversion: "-hide_banner -n -i \"%inputfile%\" -ss %starttime% -to %stoptime% \
                         -vn -c:a aac -b:a 64k -ac 1 \"%outputfile%\""
                .to_string(),
            compilation: "-hide_banner -y -f concat -safe 0 -i \"%inputfiles%\" \
                          -i \"%metadatafile%\" -i \"%coverfile%\" \
                          -map 0:a -map 2:v -map_metadata 1 -c copy \
                          -disposition:v:0 attached_pic \"%outputfile%\""
                .to_string(),
            max_concurrent: default_concurrency(),
            timeout_secs: 0,
            retries: 0,
            retry_backoff_ms: 1_000,
        }
    }
}

/// Number of worker slots when none is configured
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Audiobook builder configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuilderConfig {
    /// Root of the recordings tree
    pub data_directory: PathBuf,

    /// Working directory for converted chapters and generated control files
    pub temp_directory: PathBuf,

    /// Allowed source extensions, leading dot included
    pub audio_file_extensions: Vec<String>,

    /// Chapter table, relative to the data directory unless absolute
    pub timecodes_file: PathBuf,

    /// Per-chapter output naming mode
    pub naming: OutputNaming,

    /// Extension of converted chapter files (without the dot)
    pub segment_extension: String,

    /// Transcoder settings
    pub transcoder: TranscoderConfig,

    /// Book metadata
    pub metadata: MetadataConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Directory relative cover paths are resolved against
    #[serde(skip)]
    pub base_directory: PathBuf,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("data"),
            temp_directory: PathBuf::from("temp"),
            audio_file_extensions: vec![".mp3".to_string(), ".wav".to_string()],
            timecodes_file: PathBuf::from("timecodes.csv"),
            naming: OutputNaming::Index,
            segment_extension: "m4a".to_string(),
            transcoder: TranscoderConfig::default(),
            metadata: MetadataConfig::default(),
            logging: LoggingConfig::default(),
            base_directory: PathBuf::from("."),
        }
    }
}

/// Well-known file names inside the temp directory
pub const CONCAT_LIST_FILE: &str = "chapterfilelist.txt";
pub const METADATA_FILE: &str = "FFMETADATA.txt";
pub const SUMMARY_FILE: &str = "summary.json";
pub const LOCK_FILE: &str = "audiobook-creator.lock";

impl BuilderConfig {
    /// Chapter table location
    pub fn timecodes_path(&self) -> PathBuf {
        resolve_against(&self.data_directory, &self.timecodes_file)
    }

    /// Cover art location
    pub fn cover_path(&self) -> PathBuf {
        resolve_against(&self.base_directory, Path::new(&self.metadata.cover))
    }

    pub fn concat_list_path(&self) -> PathBuf {
        self.temp_directory.join(CONCAT_LIST_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.temp_directory.join(METADATA_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.temp_directory.join(SUMMARY_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.temp_directory.join(LOCK_FILE)
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio_file_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "audio_file_extensions must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .audio_file_extensions
            .iter()
            .find(|ext| !ext.starts_with('.') || ext.len() < 2)
        {
            return Err(ConfigError::Invalid(format!(
                "audio file extension '{}' must start with '.'",
                bad
            )));
        }
        if self.transcoder.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "transcoder.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.segment_extension.trim().is_empty() || self.segment_extension.starts_with('.') {
            return Err(ConfigError::Invalid(
                "segment_extension must be a bare extension such as 'm4a'".to_string(),
            ));
        }
        for (name, template, placeholders) in [
            (
                "conversion",
                &self.transcoder.conversion,
                &["%inputfile%", "%outputfile%"][..],
            ),
            (
                "compilation",
                &self.transcoder.compilation,
                &["%inputfiles%", "%outputfile%"][..],
            ),
        ] {
            if let Some(missing) = placeholders.iter().find(|p| !template.contains(*p)) {
                return Err(ConfigError::Invalid(format!(
                    "transcoder.{} template lacks {}",
                    name, missing
                )));
            }
        }
        Ok(())
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
