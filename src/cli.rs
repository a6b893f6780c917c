use std::path::PathBuf;

use clap::Parser;

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "audiobook.toml";

#[derive(Parser, Debug, Clone)]
#[command(name = "audiobook-creator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum number of concurrent conversions.
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Load, scan and resolve chapters and write the assembly files
    /// without running the transcoder.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the default configuration file and exit.
    #[arg(long)]
    pub print_default_config: bool,

    /// Write the default configuration to FILE and exit.
    #[arg(long, value_name = "FILE")]
    pub init_config: Option<PathBuf>,

    /// `--<Property> <value>` pairs followed by the output file.
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,
}

impl Cli {
    /// Configuration path and whether the user named it
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        }
    }
}
