//! Error types for idempotency operations.

use thiserror::Error;

/// Result type for idempotency store operations.
pub type IdempotencyResult<T> = Result<T, IdempotencyError>;

/// Errors raised by an [`IdempotencyStore`](crate::IdempotencyStore).
///
/// A duplicate key on save is deliberately absent: it is reported as
/// [`SaveOutcome::AlreadyExists`](crate::SaveOutcome::AlreadyExists).
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// The backing store could not be reached
    #[error("Idempotency store unavailable: {0}")]
    StoreUnavailable(String),

    /// A record could not be encoded or decoded
    #[error("Idempotency record serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IdempotencyError {
    fn from(err: serde_json::Error) -> Self {
        IdempotencyError::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for IdempotencyError {
    fn from(err: redis::RedisError) -> Self {
        IdempotencyError::StoreUnavailable(err.to_string())
    }
}

/// Errors returned by the [`MutationGateway`](crate::MutationGateway).
///
/// `E` is the guarded operation's own error type.
#[derive(Debug, Error)]
pub enum GatewayError<E> {
    /// The operation mandates an idempotency key and none was supplied
    #[error("Missing Idempotency-Key")]
    MissingIdempotencyKey,

    /// The store failed, so exactly-once effect cannot be honoured
    #[error(transparent)]
    StoreUnavailable(IdempotencyError),

    /// A stored result no longer decodes into the operation's result type
    #[error("Stored idempotent result is unreadable: {0}")]
    CorruptRecord(String),

    /// The operation succeeded but its result cannot be stored as JSON
    #[error("Operation result could not be encoded: {0}")]
    UnencodableResult(String),

    /// The guarded operation itself failed; nothing was stored
    #[error("{0}")]
    Operation(E),
}

impl<E> GatewayError<E> {
    /// Convert the operation error, keeping gateway failures as they are.
    pub fn map_operation<F>(self, f: impl FnOnce(E) -> F) -> GatewayError<F> {
        match self {
            GatewayError::MissingIdempotencyKey => GatewayError::MissingIdempotencyKey,
            GatewayError::StoreUnavailable(err) => GatewayError::StoreUnavailable(err),
            GatewayError::CorruptRecord(msg) => GatewayError::CorruptRecord(msg),
            GatewayError::UnencodableResult(msg) => GatewayError::UnencodableResult(msg),
            GatewayError::Operation(err) => GatewayError::Operation(f(err)),
        }
    }

    pub fn is_missing_key(&self) -> bool {
        matches!(self, GatewayError::MissingIdempotencyKey)
    }
}
