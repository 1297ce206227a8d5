//! Delivery provider capability and its HTTP client.

use crate::error::{ShippingError, ShippingResult};
use crate::retry::{RetryPolicy, is_retryable_status};
use crate::status::ShipmentStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tillkeep_config::CoreConfig;
use tillkeep_log::{debug, warn};
use url::Url;

/// Current status of one shipment as the provider sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    #[serde(default)]
    pub external_id: String,

    /// Carrier label, e.g. `"out_for_delivery"`
    pub status: String,

    #[serde(default = "Utc::now", alias = "updated_at")]
    pub reported_at: DateTime<Utc>,
}

impl ProviderStatus {
    pub fn new(external_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            status: status.into(),
            reported_at: Utc::now(),
        }
    }

    /// The carrier label mapped onto [`ShipmentStatus`].
    pub fn shipment_status(&self) -> ShippingResult<ShipmentStatus> {
        ShipmentStatus::from_provider_label(&self.status)
    }
}

/// Anything that can tell us a shipment's current status.
///
/// Implementations may retry internally; a returned error means the query
/// for this one shipment failed.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_status(&self, external_id: &str) -> ShippingResult<ProviderStatus>;
}

/// REST client for the delivery provider.
///
/// Queries `GET {base_url}/shipments/{external_id}/status` with bearer auth.
/// Transport errors, `429` and `5xx` responses are retried per the
/// [`RetryPolicy`]; other failures are returned immediately.
pub struct HttpDeliveryProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
    retry: RetryPolicy,
}

enum AttemptError {
    Retryable(String),
    Fatal(String),
}

impl HttpDeliveryProvider {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> ShippingResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            api_key: SecretString::from(api_key.into()),
            retry: RetryPolicy::default(),
        })
    }

    /// Build from the core configuration. `None` when no provider is
    /// configured.
    pub fn from_config(config: &CoreConfig) -> ShippingResult<Option<Self>> {
        let (Some(base_url), Some(api_key)) = (&config.provider_base_url, &config.provider_api_key)
        else {
            return Ok(None);
        };

        let provider = Self::new(base_url, api_key.clone(), config.provider_timeout())?
            .with_retry(RetryPolicy::exponential(config.provider_max_attempts));
        Ok(Some(provider))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn status_url(&self, external_id: &str) -> ShippingResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ShippingError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase)
            })?
            .pop_if_empty()
            .extend(["shipments", external_id, "status"]);
        Ok(url)
    }

    async fn attempt(&self, url: &Url, external_id: &str) -> Result<ProviderStatus, AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(e.to_string()))?;

        let status = response.status();
        if is_retryable_status(status) {
            return Err(AttemptError::Retryable(format!("HTTP {}", status.as_u16())));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(AttemptError::Fatal("unknown to provider (HTTP 404)".to_string()));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(format!("HTTP {}", status.as_u16())));
        }

        let mut body: ProviderStatus = response
            .json()
            .await
            .map_err(|e| AttemptError::Fatal(format!("invalid response: {}", e)))?;
        if body.external_id.is_empty() {
            body.external_id = external_id.to_string();
        }
        Ok(body)
    }
}

#[async_trait]
impl DeliveryProvider for HttpDeliveryProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn get_status(&self, external_id: &str) -> ShippingResult<ProviderStatus> {
        let url = self.status_url(external_id)?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(&url, external_id).await {
                Ok(status) => return Ok(status),
                Err(AttemptError::Retryable(message)) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(
                        fields: { "external_id" => external_id, "attempt" => attempt },
                        "Provider query failed ({}), retrying in {:?}", message, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(AttemptError::Retryable(message)) | Err(AttemptError::Fatal(message)) => {
                    warn!(
                        fields: { "external_id" => external_id, "attempts" => attempt },
                        "Provider query failed: {}", message
                    );
                    return Err(ShippingError::ProviderQueryFailed {
                        external_id: external_id.to_string(),
                        message,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_url() {
        let provider =
            HttpDeliveryProvider::new("https://carrier.example/api/", "key", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            provider.status_url("TRK 1").unwrap().as_str(),
            "https://carrier.example/api/shipments/TRK%201/status"
        );

        let bare =
            HttpDeliveryProvider::new("https://carrier.example", "key", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            bare.status_url("TRK1").unwrap().as_str(),
            "https://carrier.example/shipments/TRK1/status"
        );
    }

    #[test]
    fn test_from_config_without_provider() {
        assert!(HttpDeliveryProvider::from_config(&CoreConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_provider_status_wire_format() {
        let status: ProviderStatus =
            serde_json::from_str(r#"{"status":"delivered","updated_at":"2026-05-01T08:00:00Z"}"#)
                .unwrap();
        assert_eq!(status.shipment_status().unwrap(), ShipmentStatus::Delivered);
        assert!(status.external_id.is_empty());
    }
}
