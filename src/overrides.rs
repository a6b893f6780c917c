//! Command-line property overlay
//!
//! Trailing command-line tokens have the form
//! `--<PropertyName> <value> ... <output file>`. Property names map onto
//! configuration fields through a fixed table of setters; a name missing
//! from the table is ignored.

use std::path::PathBuf;

use crate::config::{BuilderConfig, OutputNaming};
use crate::error::ConfigError;

type Setter = fn(&mut BuilderConfig, &str) -> Result<(), String>;

/// Flag name (lowercase, without `--`) to setter
const OVERRIDES: &[(&str, Setter)] = &[
    ("datadirectory", |c, v| {
        c.data_directory = PathBuf::from(v);
        Ok(())
    }),
    ("data", |c, v| {
        c.data_directory = PathBuf::from(v);
        Ok(())
    }),
    ("tempdirectory", |c, v| {
        c.temp_directory = PathBuf::from(v);
        Ok(())
    }),
    ("temp", |c, v| {
        c.temp_directory = PathBuf::from(v);
        Ok(())
    }),
    ("timecodesfile", |c, v| {
        c.timecodes_file = PathBuf::from(v);
        Ok(())
    }),
    ("audiofileextensions", |c, v| {
        c.audio_file_extensions = v
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();
        Ok(())
    }),
    ("naming", |c, v| {
        c.naming = v.parse::<OutputNaming>()?;
        Ok(())
    }),
    ("segmentextension", |c, v| {
        c.segment_extension = v.trim_start_matches('.').to_string();
        Ok(())
    }),
    ("maxconcurrent", |c, v| {
        c.transcoder.max_concurrent = parse_number(v)?;
        Ok(())
    }),
    ("timeoutsecs", |c, v| {
        c.transcoder.timeout_secs = parse_number(v)?;
        Ok(())
    }),
    ("retries", |c, v| {
        c.transcoder.retries = parse_number(v)?;
        Ok(())
    }),
    ("metadata.cover", |c, v| {
        c.metadata.cover = v.to_string();
        Ok(())
    }),
    ("metadata.title", |c, v| {
        c.metadata.title = v.to_string();
        Ok(())
    }),
    ("metadata.artist", |c, v| {
        c.metadata.artist = v.to_string();
        Ok(())
    }),
    ("metadata.album", |c, v| {
        c.metadata.album = v.to_string();
        Ok(())
    }),
    ("metadata.year", |c, v| {
        c.metadata.year = v.to_string();
        Ok(())
    }),
    ("metadata.genre", |c, v| {
        c.metadata.genre = v.to_string();
        Ok(())
    }),
    ("metadata.description", |c, v| {
        c.metadata.description = v.to_string();
        Ok(())
    }),
    ("metadata.language", |c, v| {
        c.metadata.language = v.to_string();
        Ok(())
    }),
];

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, String> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| "expected a non-negative integer".to_string())
}

fn find_setter(flag: &str) -> Option<Setter> {
    let key = flag.to_ascii_lowercase();
    OVERRIDES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, setter)| *setter)
}

/// Result of applying the overlay
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    /// Requested audiobook path (the last token)
    pub output_file: PathBuf,
    /// Flags that matched a configuration field
    pub applied: Vec<String>,
}

/// Apply `--Name value` pairs to `config` and extract the output file
pub fn apply_overrides(
    config: &mut BuilderConfig,
    tokens: &[String],
) -> Result<Overlay, ConfigError> {
    let (output, pairs) = tokens.split_last().ok_or(ConfigError::MissingOutputFile)?;
    if output.starts_with("--") {
        return Err(ConfigError::MissingOutputFile);
    }

    let mut applied = Vec::new();
    let mut iter = pairs.iter();
    while let Some(token) = iter.next() {
        let Some(flag) = token.strip_prefix("--") else {
            tracing::debug!("Ignoring stray argument '{}'", token);
            continue;
        };
        let value = iter
            .next()
            .ok_or_else(|| ConfigError::MissingOverrideValue(flag.to_string()))?;

        match find_setter(flag) {
            Some(setter) => {
                setter(config, value).map_err(|reason| ConfigError::InvalidOverride {
                    flag: flag.to_string(),
                    value: value.clone(),
                    reason,
                })?;
                applied.push(flag.to_string());
            }
            None => tracing::debug!("Ignoring unknown option --{}", flag),
        }
    }

    Ok(Overlay {
        output_file: PathBuf::from(output),
        applied,
    })
}
