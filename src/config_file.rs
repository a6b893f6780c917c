//! Configuration file support
//!
//! Loads builder configuration from TOML files. Every section except
//! `[paths]` may be omitted; missing values fall back to the defaults of
//! [`BuilderConfig`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{
    BuilderConfig, LoggingConfig, MetadataConfig, OutputNaming, TranscoderConfig,
};
use crate::error::ConfigError;

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Input and working locations
    pub paths: PathSettings,
    /// Per-chapter output settings
    pub output: Option<OutputSettings>,
    /// Transcoder settings
    pub transcoder: Option<TranscoderSettings>,
    /// Book metadata
    pub metadata: Option<MetadataConfig>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root of the recordings tree
    pub data_directory: PathBuf,
    /// Working directory
    pub temp_directory: PathBuf,
    /// Chapter table
    pub timecodes_file: PathBuf,
    /// Allowed source extensions, e.g. [".mp3", ".wav"]
    pub audio_file_extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// index | index_and_title
    pub naming: Option<OutputNaming>,
    /// Extension of converted chapter files
    pub segment_extension: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderSettings {
    pub program: Option<String>,
    pub conversion: Option<String>,
    pub compilation: Option<String>,
    pub max_concurrent: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path.as_ref(), content).map_err(|source| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = BuilderConfig::default();
        Self {
            paths: PathSettings {
                data_directory: defaults.data_directory,
                temp_directory: defaults.temp_directory,
                timecodes_file: defaults.timecodes_file,
                audio_file_extensions: Some(defaults.audio_file_extensions),
            },
            output: Some(OutputSettings {
                naming: Some(defaults.naming),
                segment_extension: Some(defaults.segment_extension),
            }),
            transcoder: Some(TranscoderSettings {
                program: Some(defaults.transcoder.program),
                conversion: Some(defaults.transcoder.conversion),
                compilation: Some(defaults.transcoder.compilation),
                max_concurrent: None,
                timeout_secs: Some(defaults.transcoder.timeout_secs),
                retries: Some(defaults.transcoder.retries),
                retry_backoff_ms: Some(defaults.transcoder.retry_backoff_ms),
            }),
            metadata: Some(MetadataConfig {
                cover: "cover.jpg".to_string(),
                ..Default::default()
            }),
            logging: Some(LoggingSettings {
                level: defaults.logging.level,
                format: Some(defaults.logging.format),
            }),
        }
    }

    /// Convert to BuilderConfig; `base_directory` anchors relative cover paths
    pub fn into_builder_config(self, base_directory: &Path) -> BuilderConfig {
        let defaults = BuilderConfig::default();
        let output = self.output;
        let transcoder = self.transcoder;
        let default_transcoder = TranscoderConfig::default();

        BuilderConfig {
            data_directory: self.paths.data_directory,
            temp_directory: self.paths.temp_directory,
            timecodes_file: self.paths.timecodes_file,
            audio_file_extensions: self
                .paths
                .audio_file_extensions
                .unwrap_or(defaults.audio_file_extensions),
            naming: output
                .as_ref()
                .and_then(|o| o.naming)
                .unwrap_or(defaults.naming),
            segment_extension: output
                .and_then(|o| o.segment_extension)
                .unwrap_or(defaults.segment_extension),
            transcoder: match transcoder {
                Some(t) => TranscoderConfig {
                    program: t.program.unwrap_or(default_transcoder.program),
                    conversion: t.conversion.unwrap_or(default_transcoder.conversion),
                    compilation: t.compilation.unwrap_or(default_transcoder.compilation),
                    max_concurrent: t
                        .max_concurrent
                        .unwrap_or(default_transcoder.max_concurrent),
                    timeout_secs: t.timeout_secs.unwrap_or(default_transcoder.timeout_secs),
                    retries: t.retries.unwrap_or(default_transcoder.retries),
                    retry_backoff_ms: t
                        .retry_backoff_ms
                        .unwrap_or(default_transcoder.retry_backoff_ms),
                },
                None => default_transcoder,
            },
            metadata: self.metadata.unwrap_or_default(),
            logging: self
                .logging
                .map(|l| LoggingConfig {
                    level: l.level,
                    format: l.format.unwrap_or_else(|| "pretty".to_string()),
                })
                .unwrap_or_default(),
            base_directory: base_directory.to_path_buf(),
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
    ConfigFile::default_config().to_file(path)
}

/// Load the configuration named on the command line
///
/// An explicitly requested file must exist. When the default location is
/// used and nothing is there, built-in defaults apply.
pub fn load_config(path: &Path, explicit: bool) -> Result<BuilderConfig, ConfigError> {
    if !path.exists() && !explicit {
        return Ok(BuilderConfig::default());
    }

    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(ConfigFile::from_file(path)?.into_builder_config(base))
}
