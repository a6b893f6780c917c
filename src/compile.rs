//! Compilation driver
//!
//! Merges the converted chapters into the final audiobook with a single
//! transcoder call. Any file already at the output path is removed first so
//! the transcoder always writes to a clean target.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::BuilderConfig;
use crate::error::{BuilderError, Result, TranscodeError};
use crate::transcode::{CommandTemplate, Invocation, Transcoder};

/// Inputs of the final merge
#[derive(Debug, Clone)]
pub struct CompileJob {
    pub concat_list: PathBuf,
    pub metadata_file: PathBuf,
    pub cover_file: PathBuf,
    pub output_file: PathBuf,
}

impl CompileJob {
    pub fn from_config(config: &BuilderConfig, output_file: &Path) -> Self {
        Self {
            concat_list: config.concat_list_path(),
            metadata_file: config.metadata_path(),
            cover_file: config.cover_path(),
            output_file: output_file.to_path_buf(),
        }
    }
}

pub struct Compiler {
    transcoder: Arc<dyn Transcoder>,
    program: String,
    template: CommandTemplate,
}

impl Compiler {
    pub fn new(
        config: &BuilderConfig,
        transcoder: Arc<dyn Transcoder>,
    ) -> std::result::Result<Self, TranscodeError> {
        Ok(Self {
            transcoder,
            program: config.transcoder.program.clone(),
            template: CommandTemplate::parse(&config.transcoder.compilation)?,
        })
    }

    pub fn invocation_for(&self, job: &CompileJob) -> Invocation {
        let inputs = job.concat_list.to_string_lossy();
        let metadata = job.metadata_file.to_string_lossy();
        let cover = job.cover_file.to_string_lossy();
        let output = job.output_file.to_string_lossy();
        Invocation {
            program: self.program.clone(),
            args: self.template.render(&[
                ("%inputfiles%", &inputs),
                ("%metadatafile%", &metadata),
                ("%coverfile%", &cover),
                ("%outputfile%", &output),
            ]),
            output: job.output_file.clone(),
        }
    }

    /// Produce the audiobook; any failure leaves no output file behind
    pub async fn compile(&self, job: &CompileJob) -> Result<()> {
        remove_existing(&job.output_file)?;

        tracing::info!("Compiling audiobook '{}', please wait.", job.output_file.display());
        let invocation = self.invocation_for(job);
        match self.transcoder.run(&invocation).await {
            Ok(()) => {
                tracing::info!("Audiobook '{}' created.", job.output_file.display());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Compilation of '{}' failed:", job.output_file.display());
                for line in e.to_string().lines() {
                    tracing::error!("  {}", line);
                }
                // A partial file is not a deliverable
                let _ = std::fs::remove_file(&job.output_file);
                Err(BuilderError::Compile(e))
            }
        }
    }
}

fn remove_existing(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("Removed existing output file '{}'", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
