// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid ignore pattern: {0}")]
    IgnoreError(#[from] ignore::Error),

    #[error("File watcher error: {0}")]
    WatchError(#[from] notify::Error),

    /// A caller-supplied cancellation token fired while an operation was in
    /// progress. Not a failure in itself; callers decide how to report it.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PulseError {
    pub fn config(msg: impl Into<String>) -> Self {
        PulseError::ConfigError(msg.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PulseError>;
