//! Error types for the tillkeep CLI.

use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] tillkeep_config::ConfigError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Webhook error: {0}")]
    Webhook(#[from] tillkeep_webhooks::WebhookError),

    #[error("Shipping error: {0}")]
    Shipping(#[from] tillkeep_shipping::ShippingError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The command ran and its answer is "no", e.g. a signature mismatch
    #[error("{0}")]
    Rejected(String),
}
