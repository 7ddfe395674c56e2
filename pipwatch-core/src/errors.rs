use std::io;

use thiserror::Error;

/// Result type used across the pipwatch core crate.
pub type Result<T> = std::result::Result<T, PipwatchError>;

/// Canonical error representation shared by every pipwatch crate.
#[derive(Debug, Error)]
pub enum PipwatchError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("logging setup failed: {0}")]
    LoggingError(String),

    #[error("general error: {0}")]
    GeneralError(String),
}

impl From<serde_json::Error> for PipwatchError {
    fn from(err: serde_json::Error) -> Self {
        PipwatchError::SerializationError(err.to_string())
    }
}

impl From<anyhow::Error> for PipwatchError {
    fn from(err: anyhow::Error) -> Self {
        PipwatchError::GeneralError(err.to_string())
    }
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("environment variable {key} is not valid unicode")]
    NotUnicode { key: String },
}

impl From<ConfigError> for PipwatchError {
    fn from(value: ConfigError) -> Self {
        PipwatchError::ConfigError(value.to_string())
    }
}
