use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the audiobook creator
///
/// Every variant is fatal to the run. Per-chapter problems never surface
/// here; they are recorded on the chapter as a [`ChapterError`].
#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data folder '{0}' does not exist.")]
    MissingDataDirectory(PathBuf),

    #[error("Couldn't create temp folder '{path}': {source}")]
    TempDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chapter table error: {0}")]
    Load(#[from] LoadError),

    #[error("An instance of this app is already running on this machine (lock file '{0}').")]
    AlreadyRunning(PathBuf),

    #[error("Compilation failed: {0}")]
    Compile(#[source] TranscodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted")]
    Interrupted,
}

impl BuilderError {
    /// Process exit code for this failure category
    pub fn exit_code(&self) -> u8 {
        match self {
            BuilderError::Config(_) => 2,
            BuilderError::MissingDataDirectory(_)
            | BuilderError::TempDirectory { .. }
            | BuilderError::Io(_) => 3,
            BuilderError::Load(_) => 4,
            BuilderError::AlreadyRunning(_) => 5,
            BuilderError::Compile(_) => 6,
            BuilderError::Interrupted => 130,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value '{value}' for --{flag}: {reason}")]
    InvalidOverride {
        flag: String,
        value: String,
        reason: String,
    },

    #[error("Missing value for --{0}")]
    MissingOverrideValue(String),

    #[error("You must define an output file name.")]
    MissingOutputFile,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Chapter table loading errors
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open chapter table {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chapter table {path}, row {row}: {source}")]
    Row {
        path: PathBuf,
        row: u64,
        #[source]
        source: csv::Error,
    },

    #[error("Chapter table {path}, row {row}: index is not a finite number")]
    InvalidIndex { path: PathBuf, row: u64 },
}

/// Time field errors, evaluated per chapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimecodeError {
    #[error("Invalid timecode '{0}'")]
    Malformed(String),

    #[error("Timecode '{0}' is out of range")]
    OutOfRange(String),

    #[error("Stop time {stop} is not after start time {start}")]
    NonPositiveDuration { start: String, stop: String },
}

/// External transcoder errors
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to start transcoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcoder exited with {status}:\n{stderr}")]
    Failed { status: String, stderr: String },

    #[error("Output file '{0}' already exists")]
    OutputExists(PathBuf),

    #[error("Transcoder did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Invalid command template: {0}")]
    Template(String),
}

impl TranscodeError {
    /// Whether this failure only means the target was already produced
    pub fn is_output_exists(&self) -> bool {
        match self {
            TranscodeError::OutputExists(_) => true,
            TranscodeError::Failed { stderr, .. } => stderr.contains(" already exists. Exiting."),
            _ => false,
        }
    }
}

/// Per-chapter outcome errors, recorded on the chapter instead of aborting the batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChapterError {
    #[error("Source file '{0}' was not found in the data directory")]
    MissingSource(String),

    #[error(transparent)]
    Timing(#[from] TimecodeError),

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Worker aborted: {0}")]
    Aborted(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BuilderError>;
