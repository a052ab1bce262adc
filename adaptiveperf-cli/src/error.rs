//! CLI error types.

use thiserror::Error;

/// Errors surfaced to the command line.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration file could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] adaptiveperf::ConfigError),

    /// A command-line argument is inconsistent with the others.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Writing JSON output failed.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}
