//! Error types for webhook operations

use thiserror::Error;

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;

/// Errors that can occur while authenticating or reading a webhook
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Signature missing, malformed, or not matching the body. Also returned
    /// when no secret is configured.
    #[error("INVALID_SIGNATURE")]
    InvalidSignature,

    /// Signing was requested without a secret
    #[error("Webhook secret is not configured")]
    SecretMissing,

    /// The authenticated body is not a valid event
    #[error("Payload error: {0}")]
    Payload(String),
}

impl WebhookError {
    /// Stable machine-readable code for responses.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::SecretMissing => "WEBHOOK_SECRET_MISSING",
            WebhookError::Payload(_) => "INVALID_PAYLOAD",
        }
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::Payload(err.to_string())
    }
}
