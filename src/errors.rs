//! Engine-level error types.
//!
//! Healing outcomes are values ([`selheal_core_types::HealOutcome`]);
//! only infrastructure faults surface as `Err` at this layer.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// State export/import failures.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Encode(#[from] serde_json::Error),
}
