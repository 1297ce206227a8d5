//! Inbound delivery webhooks for tillkeep
//!
//! The delivery provider pushes status changes to us. Each callback carries
//! an HMAC-SHA256 signature over the raw body, keyed with a shared secret
//! configured out of band. This crate verifies that signature in constant
//! time and only then parses the body into a [`DeliveryEvent`].
//!
//! Verification fails closed: with no secret configured, every callback is
//! rejected.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use tillkeep_webhooks::{DeliveryEvent, DeliveryWebhookReceiver, sign};
//!
//! let receiver = DeliveryWebhookReceiver::with_secret(Some("whsec_123".to_string()));
//!
//! let body = DeliveryEvent::new("TRK-1", "delivered").to_bytes().unwrap();
//! let mut headers = HashMap::new();
//! headers.insert("X-Signature".to_string(), sign(&body, "whsec_123").unwrap());
//!
//! let event = receiver.receive(&headers, &body).unwrap();
//! assert_eq!(event.external_id, "TRK-1");
//! ```

pub mod error;
pub mod payload;
pub mod receiver;
pub mod signature;

pub use error::{Result, WebhookError};
pub use payload::{DeliveryEvent, EVENT_KEY_PREFIX};
pub use receiver::DeliveryWebhookReceiver;
pub use signature::{
    SIGNATURE_SCHEME, WebhookAuthenticator, headers, sign, signature_from_headers, verify,
};

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{Result, WebhookError};
    pub use crate::payload::DeliveryEvent;
    pub use crate::receiver::DeliveryWebhookReceiver;
    pub use crate::signature::WebhookAuthenticator;
}
