//! Framework-agnostic request and response types.
//!
//! Routing and body reading belong to whichever server hosts these handlers.
//! The server fills an [`ApiRequest`] with headers, path parameters and the
//! raw body bytes, and writes back the [`ApiResponse`].

use http::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tillkeep_idempotency::extract_key;

/// Header set on responses replayed from the idempotency store.
pub const REPLAYED_HEADER: &str = "Idempotent-Replayed";

/// Incoming request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub path_params: HashMap<String, String>,
    /// Raw body bytes, exactly as received
    pub body: Vec<u8>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            path_params: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The `Idempotency-Key` header, if present and not blank.
    pub fn idempotency_key(&self) -> Option<&str> {
        extract_key(&self.headers)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Outgoing response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// JSON response. Serialization failure becomes a bare 500.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status)
                .with_header("Content-Type", "application/json")
                .with_body(body),
            Err(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    pub fn ok<T: Serialize>(value: &T) -> Self {
        Self::json(StatusCode::OK, value)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn is_replayed(&self) -> bool {
        self.headers.get(REPLAYED_HEADER).is_some_and(|v| v == "true")
    }

    /// Parse the body as JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_request_key_and_params() {
        let req = ApiRequest::post("/sales/S1/cancel")
            .with_header("idempotency-key", " abc ")
            .with_param("sale_id", "S1")
            .with_param("empty", "");

        assert_eq!(req.idempotency_key(), Some("abc"));
        assert_eq!(req.param("sale_id"), Some("S1"));
        assert_eq!(req.param("empty"), None);
        assert_eq!(req.method, Method::POST);
    }

    #[test]
    fn test_json_response() {
        let resp = ApiResponse::ok(&json!({"status": "CANCELLED"}));
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.headers["Content-Type"], "application/json");
        assert_eq!(resp.body_json::<Value>().unwrap()["status"], "CANCELLED");
        assert!(!resp.is_replayed());
    }
}
