//! Receiver for inbound delivery webhooks

use crate::{DeliveryEvent, Result, WebhookAuthenticator, WebhookError};
use std::collections::HashMap;
use tillkeep_log::warn;

/// Authenticates and parses delivery-provider callbacks.
///
/// The body is only parsed after the signature over the raw bytes checks
/// out, so an unauthenticated request never reaches any state.
#[derive(Debug, Clone)]
pub struct DeliveryWebhookReceiver {
    authenticator: WebhookAuthenticator,
}

impl DeliveryWebhookReceiver {
    pub fn new(authenticator: WebhookAuthenticator) -> Self {
        Self { authenticator }
    }

    pub fn with_secret(secret: Option<String>) -> Self {
        Self::new(WebhookAuthenticator::new(secret))
    }

    pub fn authenticator(&self) -> &WebhookAuthenticator {
        &self.authenticator
    }

    /// Verify the signature header against `raw_body`, then parse the event.
    pub fn receive(
        &self,
        headers: &HashMap<String, String>,
        raw_body: &[u8],
    ) -> Result<DeliveryEvent> {
        if !self.authenticator.verify_headers(raw_body, headers) {
            warn!(
                fields: {
                    "configured" => self.authenticator.is_configured(),
                    "body_len" => raw_body.len()
                },
                "Rejected delivery webhook with invalid signature"
            );
            return Err(WebhookError::InvalidSignature);
        }

        let event: DeliveryEvent = serde_json::from_slice(raw_body)?;

        if event.event_id.trim().is_empty() {
            return Err(WebhookError::Payload("event_id is empty".to_string()));
        }
        if event.external_id.trim().is_empty() {
            return Err(WebhookError::Payload("external_id is empty".to_string()));
        }

        Ok(event)
    }
}
