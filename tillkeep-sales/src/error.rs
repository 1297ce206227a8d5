//! Error types for sales operations

use thiserror::Error;

/// Result type for sales operations.
pub type SalesResult<T> = Result<T, SalesError>;

/// Sales operation errors.
#[derive(Debug, Error)]
pub enum SalesError {
    /// No record with this id
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The record is not in the state the operation requires
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The sales ledger could not be reached
    #[error("Sales ledger unavailable: {0}")]
    StoreUnavailable(String),
}

impl SalesError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SalesError::NotFound { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, SalesError::InvalidState(_))
    }
}

impl From<tillkeep_config::ConfigError> for SalesError {
    fn from(err: tillkeep_config::ConfigError) -> Self {
        SalesError::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = SalesError::not_found("Sale", "S1");
        assert_eq!(err.to_string(), "Sale not found: S1");
        assert!(err.is_not_found());
        assert!(!err.is_invalid_state());
    }
}
