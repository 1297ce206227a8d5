//! Error types for shipment operations.

use thiserror::Error;

/// Result type for shipment operations.
pub type ShippingResult<T> = Result<T, ShippingError>;

/// Shipment and reconciliation errors.
///
/// A status report arriving after a shipment already closed is not an error;
/// see [`TransitionOutcome::Stale`](crate::TransitionOutcome::Stale).
#[derive(Debug, Error)]
pub enum ShippingError {
    /// No shipment with this id
    #[error("Shipment not found: {0}")]
    NotFound(String),

    /// The shipment is not in the state the operation requires
    #[error("Invalid shipment state: {0}")]
    InvalidState(String),

    /// A status query to the delivery provider failed
    #[error("Provider query failed for {external_id}: {message}")]
    ProviderQueryFailed {
        external_id: String,
        message: String,
    },

    /// The shipment store could not be reached
    #[error("Shipment store unavailable: {0}")]
    StoreUnavailable(String),

    /// The provider reported a status label we do not know
    #[error("Unknown shipment status: {0}")]
    UnknownStatus(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid provider URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid cron expression
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Scheduler already running
    #[error("Reconciliation scheduler already running")]
    SchedulerAlreadyRunning,

    /// Scheduler not running
    #[error("Reconciliation scheduler not running")]
    SchedulerNotRunning,
}

impl ShippingError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ShippingError::NotFound(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, ShippingError::InvalidState(_))
    }
}
