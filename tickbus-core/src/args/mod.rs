//! Defines the standard command-line arguments shared across all services.
//!
//! Every tickbus process takes the same flags: a path to its JSON config file
//! and nothing else, so any service can be scripted and supervised the same
//! way.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Command line of a tickbus process.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ProcessArgs {
    /// Path to the JSON configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: PathBuf,
}

impl ProcessArgs {
    /// Parses the command line, handling `--help` and `--version` via `clap`.
    pub fn parse_args() -> Self {
        ProcessArgs::parse()
    }

    /// Returns the path of the configuration file to load.
    pub fn config_path(&self) -> &Path {
        &self.config
    }
}
