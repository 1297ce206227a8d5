//! # tillkeep
//!
//! Idempotent point-of-sale mutations and delivery reconciliation.
//!
//! This facade re-exports the workspace crates behind feature flags:
//!
//! | Feature       | Crate                  | Provides                                             |
//! |---------------|------------------------|------------------------------------------------------|
//! | *(always)*    | `tillkeep_log`         | Structured logging macros                            |
//! | `idempotency` | `tillkeep_idempotency` | Canonical fingerprints, idempotency store, gateway   |
//! | `config`      | `tillkeep_config`      | Layered configuration and store settings             |
//! | `webhooks`    | `tillkeep_webhooks`    | Signed delivery webhooks                             |
//! | `shipping`    | `tillkeep_shipping`    | Shipment state machine and reconciliation            |
//! | `sales`       | `tillkeep_sales`       | Cancel, void, expire and layaway operations          |
//! | `api`         | `tillkeep_api`         | Framework-neutral request handlers                   |
//! | `redis`       |                        | Redis-backed idempotency and settings stores         |
//!
//! ```
//! # #[cfg(feature = "idempotency")] {
//! use tillkeep::idempotency::{canonical_json, derive_id, hash};
//! use serde_json::json;
//!
//! let a = canonical_json(&json!({ "b": 1, "a": 2 }));
//! let b = canonical_json(&json!({ "a": 2, "b": 1 }));
//! assert_eq!(a, b);
//! assert!(derive_id("ORD", &hash(&a)).starts_with("ORD-"));
//! # }
//! ```

pub use async_trait::async_trait;

pub use tillkeep_log as log;

#[cfg(feature = "idempotency")]
pub use tillkeep_idempotency as idempotency;

#[cfg(feature = "config")]
pub use tillkeep_config as config;

#[cfg(feature = "webhooks")]
pub use tillkeep_webhooks as webhooks;

#[cfg(feature = "shipping")]
pub use tillkeep_shipping as shipping;

#[cfg(feature = "sales")]
pub use tillkeep_sales as sales;

#[cfg(feature = "api")]
pub use tillkeep_api as api;

// Prelude for common imports
pub mod prelude {
    pub use crate::async_trait;

    #[cfg(feature = "idempotency")]
    pub use tillkeep_idempotency::prelude::*;

    #[cfg(feature = "config")]
    pub use tillkeep_config::{ConfigService, CoreConfig, SettingsService, StoreSettings};

    #[cfg(feature = "webhooks")]
    pub use tillkeep_webhooks::prelude::{DeliveryEvent, DeliveryWebhookReceiver, WebhookError};

    #[cfg(feature = "shipping")]
    pub use tillkeep_shipping::prelude::*;

    #[cfg(feature = "sales")]
    pub use tillkeep_sales::{SalesError, SalesLedger, SalesService};

    #[cfg(feature = "api")]
    pub use tillkeep_api::{ApiError, ApiRequest, ApiResponse, AppState};
}
