//! Request boundary for tillkeep
//!
//! Handlers for the financially-significant mutations, shipment remittance,
//! the inbound delivery webhook and the reconciliation triggers. They take
//! an [`ApiRequest`] and return an [`ApiResponse`], leaving routing and the
//! wire server to the host application.
//!
//! | Handler | Guard |
//! |---|---|
//! | [`handlers::cancel_sale`], [`handlers::void_refund`], [`handlers::expire_store_credit`], [`handlers::recompute_layaway`] | `Idempotency-Key` required |
//! | [`handlers::remit_shipment`] | `Idempotency-Key` required, exclusive per shipment |
//! | [`handlers::delivery_webhook`] | HMAC signature, de-duplicated by event id |
//! | [`handlers::tracking_poll`], [`handlers::daily_reconciliation`] | none |
//!
//! Errors map to statuses in [`ApiError::status_code`]: a missing key is
//! `400 {"error": "Missing Idempotency-Key"}` and a bad signature is
//! `401 {"error": "INVALID_SIGNATURE"}`.

pub mod error;
pub mod handlers;
pub mod request;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use handlers::WebhookAck;
pub use request::{ApiRequest, ApiResponse, REPLAYED_HEADER};
pub use state::AppState;
