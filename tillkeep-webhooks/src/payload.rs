//! Delivery event payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of the idempotency key under which a delivery event is processed.
pub const EVENT_KEY_PREFIX: &str = "webhook:";

/// A status update pushed by the delivery provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    /// Provider's id for this event; repeated on redelivery
    pub event_id: String,

    /// Shipment reference in the provider's system
    pub external_id: String,

    /// Provider status label, e.g. `"out_for_delivery"`
    pub status: String,

    /// When the status change happened at the carrier
    pub occurred_at: DateTime<Utc>,
}

impl DeliveryEvent {
    /// Create an event with a fresh id, occurring now
    pub fn new(external_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            event_id: format!("evt_{}", Uuid::new_v4().simple()),
            external_id: external_id.into(),
            status: status.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Key that makes redeliveries of this event collapse to one effect.
    pub fn idempotency_key(&self) -> String {
        format!("{}{}", EVENT_KEY_PREFIX, self.event_id)
    }

    /// Convert to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key() {
        let event = DeliveryEvent::new("TRK1", "delivered").with_event_id("evt_9");
        assert_eq!(event.idempotency_key(), "webhook:evt_9");
    }

    #[test]
    fn test_parse_wire_format() {
        let event: DeliveryEvent = serde_json::from_str(
            r#"{"event_id":"evt_1","external_id":"TRK1","status":"in_transit","occurred_at":"2026-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(event.external_id, "TRK1");
        assert_eq!(event.occurred_at.to_rfc3339(), "2026-03-01T10:00:00+00:00");
    }
}
