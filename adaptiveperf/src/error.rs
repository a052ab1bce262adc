//! Error types.
//!
//! Telemetry problems at runtime are never errors: unavailable readings are
//! reported as sentinels and rejected level requests are rolled back
//! locally. The errors here cover the setup paths only.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("Invalid INI syntax: {0}")]
    Parse(String),

    /// A key holds a value that cannot be used.
    #[error("Invalid value for [{section}] {key} = '{value}': {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Errors raised by the background telemetry worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The OS refused to create the worker thread.
    #[error("Failed to spawn telemetry worker '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            section: "controller".to_string(),
            key: "sample_window".to_string(),
            value: "abc".to_string(),
            reason: "expected a positive integer".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("[controller] sample_window"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_worker_spawn_display() {
        let err = WorkerError::Spawn {
            name: "telemetry".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "no threads"),
        };
        assert!(err.to_string().contains("telemetry"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
