//! CLI argument parsing.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

/// Global CLI arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    /// Path to the depwatch.toml configuration.
    pub config: PathBuf,

    #[arg(long, default_value_t = false, global = true)]
    /// Enable debug logging.
    pub debug: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Watch subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Watch all configured projects until interrupted.
    Watch {
        #[arg(long, default_value_t = false)]
        /// Run a single tick and exit.
        once: bool,
    },

    /// Check the dependencies of one configured project.
    Check {
        /// Name of the project in the configuration.
        name: String,

        #[arg(long, default_value_t = false)]
        /// Only verify the project can be handled, keep stored results.
        validity_only: bool,
    },

    /// List the supported ecosystem types.
    Types,
}
