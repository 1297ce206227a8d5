//! API errors and their HTTP mapping

use crate::request::ApiResponse;
use http::StatusCode;
use serde_json::json;
use thiserror::Error;
use tillkeep_idempotency::{GatewayError, IdempotencyError};
use tillkeep_sales::SalesError;
use tillkeep_shipping::ShippingError;
use tillkeep_webhooks::WebhookError;

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Everything a handler can answer with besides success.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing Idempotency-Key")]
    MissingIdempotencyKey,

    #[error("INVALID_SIGNATURE")]
    InvalidSignature,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The record is not in the state the operation requires
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    /// The delivery provider failed
    #[error("{0}")]
    BadGateway(String),

    /// A store the request depends on is unreachable
    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingIdempotencyKey | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidSignature => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `{"error": "<message>"}` with the mapped status.
    pub fn into_response(self) -> ApiResponse {
        ApiResponse::json(self.status_code(), &json!({ "error": self.to_string() }))
    }
}

impl From<SalesError> for ApiError {
    fn from(err: SalesError) -> Self {
        match err {
            SalesError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            SalesError::InvalidState(msg) => ApiError::Conflict(msg),
            SalesError::StoreUnavailable(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}

impl From<ShippingError> for ApiError {
    fn from(err: ShippingError) -> Self {
        match err {
            ShippingError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ShippingError::InvalidState(msg) => ApiError::Conflict(msg),
            ShippingError::UnknownStatus(_) => ApiError::Unprocessable(err.to_string()),
            ShippingError::ProviderQueryFailed { .. } | ShippingError::Http(_) => {
                ApiError::BadGateway(err.to_string())
            }
            ShippingError::StoreUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::InvalidSignature => ApiError::InvalidSignature,
            WebhookError::Payload(msg) => ApiError::Unprocessable(msg),
            WebhookError::SecretMissing => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<IdempotencyError> for ApiError {
    fn from(err: IdempotencyError) -> Self {
        ApiError::ServiceUnavailable(err.to_string())
    }
}

impl<E: Into<ApiError>> From<GatewayError<E>> for ApiError {
    fn from(err: GatewayError<E>) -> Self {
        match err {
            GatewayError::MissingIdempotencyKey => ApiError::MissingIdempotencyKey,
            GatewayError::StoreUnavailable(err) => err.into(),
            GatewayError::CorruptRecord(msg) | GatewayError::UnencodableResult(msg) => {
                ApiError::Internal(msg)
            }
            GatewayError::Operation(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_missing_key_response() {
        let resp = ApiError::from(GatewayError::<SalesError>::MissingIdempotencyKey).into_response();
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.body_json::<Value>().unwrap(),
            json!({ "error": "Missing Idempotency-Key" })
        );
    }

    #[test]
    fn test_invalid_signature_response() {
        let resp = ApiError::from(WebhookError::InvalidSignature).into_response();
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp.body_json::<Value>().unwrap()["error"], "INVALID_SIGNATURE");
    }

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (SalesError::not_found("Sale", "S1").into(), StatusCode::NOT_FOUND),
            (SalesError::InvalidState("x".into()).into(), StatusCode::CONFLICT),
            (
                ShippingError::UnknownStatus("teleported".into()).into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ShippingError::ProviderQueryFailed {
                    external_id: "T1".into(),
                    message: "HTTP 503".into(),
                }
                .into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                GatewayError::<ShippingError>::StoreUnavailable(IdempotencyError::StoreUnavailable(
                    "down".into(),
                ))
                .into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::<SalesError>::UnencodableResult("k: key must be a string".into())
                    .into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
        }
    }
}
