//! Audiobook Creator
//!
//! Builds a single chaptered audiobook from a tree of recordings and a
//! semicolon-delimited chapter table. Each chapter is cut and re-encoded by an
//! external transcoder, then the pieces are concatenated with chapter markers,
//! tags and cover art into the final file.

mod assembly;
mod chapters;
mod cli;
mod compile;
mod config;
mod config_file;
mod error;
mod index;
#[cfg(test)]
mod integration;
mod lock;
mod overrides;
mod pipeline;
mod progress;
mod scheduler;
mod summary;
mod timecode;
mod transcode;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::{BuilderConfig, LoggingConfig};
use crate::config_file::{generate_default_config, load_config, ConfigFile};
use crate::error::{BuilderError, Result};
use crate::overrides::apply_overrides;
use crate::pipeline::Pipeline;
use crate::transcode::ProcessTranscoder;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "audiobook-creator";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.print_default_config {
        return match ConfigFile::default_config().to_toml() {
            Ok(toml) => {
                print!("{}", toml);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::from(BuilderError::from(e).exit_code())
            }
        };
    }

    if let Some(path) = &cli.init_config {
        return match generate_default_config(path) {
            Ok(()) => {
                println!("Wrote default configuration to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::from(BuilderError::from(e).exit_code())
            }
        };
    }

    let (config_path, explicit) = cli.config_path();
    let loaded = load_config(&config_path, explicit);
    init_logging(
        &loaded
            .as_ref()
            .map(|c| c.logging.clone())
            .unwrap_or_default(),
    );

    tracing::info!(
        "{} v{} starting at {}",
        APP_NAME,
        VERSION,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    if !explicit && !config_path.exists() {
        tracing::warn!(
            "Config file {} not found. Using defaults.",
            config_path.display()
        );
    }

    match run(&cli, loaded).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            for line in e.to_string().lines() {
                tracing::error!("{}", line);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(
    cli: &Cli,
    loaded: std::result::Result<BuilderConfig, crate::error::ConfigError>,
) -> Result<()> {
    let mut config = loaded?;
    let overlay = apply_overrides(&mut config, &cli.args)?;
    for flag in &overlay.applied {
        tracing::debug!("Applied command line option --{}", flag);
    }
    if let Some(jobs) = cli.jobs {
        config.transcoder.max_concurrent = jobs;
    }
    config.validate()?;
    tracing::debug!("Configuration loaded: {:?}", config);

    let timeout = match config.transcoder.timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let transcoder = Arc::new(ProcessTranscoder::new().with_timeout(timeout));
    let pipeline = Pipeline::new(config, transcoder).dry_run(cli.dry_run);
    let output_file: PathBuf = overlay.output_file;

    tokio::select! {
        result = pipeline.run(&output_file) => result.map(|_| ()),
        _ = tokio::signal::ctrl_c() => {
            // Dropping the pipeline future releases the instance lock and
            // kills running transcoder children
            tracing::warn!("Interrupted, cleaning up");
            Err(BuilderError::Interrupted)
        }
    }
}

/// Initialize logging with tracing
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("audiobook_creator={}", logging.level))
    });
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
