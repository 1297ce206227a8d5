//! Errors raised while resolving configuration or persisting store settings.

use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key is absent from every source
    #[error("Configuration key not found: {0}")]
    KeyNotFound(String),

    /// A configuration file could not be read
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// A file or value is not in the expected format
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// A value parsed but is outside what tillkeep accepts
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// The durable settings store could not be read or written
    #[error("Settings store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvError(#[from] std::env::VarError),
}

impl ConfigError {
    pub(crate) fn store_unavailable(err: impl Display) -> Self {
        ConfigError::StoreUnavailable(err.to_string())
    }

    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConfigError::StoreUnavailable(_) | ConfigError::IoError(_))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
