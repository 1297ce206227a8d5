//! Shipment lifecycle and delivery reconciliation for tillkeep
//!
//! Local shipment state has to agree with the delivery provider, which is
//! the ground truth. Three paths feed provider status into the same state
//! machine:
//!
//! - the **tracking poll**: every non-terminal shipment, every few minutes
//! - the **daily reconciliation**: the same sweep, plus drift reporting
//! - **inbound webhooks** (see `tillkeep-webhooks`), applied through
//!   [`ShipmentRepository::apply_status`]
//!
//! Once a shipment is `DELIVERED`, `RETURNED` or `CANCELLED`, later reports
//! naming another status are recorded for audit and otherwise ignored.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tillkeep_shipping::*;
//!
//! struct Carrier;
//!
//! #[async_trait]
//! impl DeliveryProvider for Carrier {
//!     fn name(&self) -> &'static str { "carrier" }
//!
//!     async fn get_status(&self, external_id: &str) -> ShippingResult<ProviderStatus> {
//!         Ok(ProviderStatus::new(external_id, "delivered"))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ShippingResult<()> {
//! let repo = Arc::new(InMemoryShipmentRepository::new());
//! repo.insert(Shipment::new("SH-1", "TRK-1")).await?;
//!
//! let reconciler = Reconciler::new(repo.clone(), Arc::new(Carrier));
//! let summary = reconciler.run_tracking_poll().await?;
//!
//! assert_eq!((summary.examined, summary.changed, summary.failed), (1, 1, 0));
//! assert_eq!(repo.get("SH-1").await?.status, ShipmentStatus::Delivered);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod provider;
pub mod reconcile;
pub mod repository;
pub mod retry;
pub mod scheduler;
pub mod shipment;
pub mod status;

pub use error::{ShippingError, ShippingResult};
pub use provider::{DeliveryProvider, HttpDeliveryProvider, ProviderStatus};
pub use reconcile::{
    PassKind, ReconciliationDetail, ReconciliationSummary, Reconciler, ReconcilerConfig,
};
pub use repository::{InMemoryShipmentRepository, ShipmentRepository};
pub use retry::{RetryPolicy, is_retryable_status};
pub use scheduler::{CronExpression, ReconciliationScheduler, SchedulerConfig};
pub use shipment::{
    Disposition, RemittanceReceipt, Shipment, StatusHistoryEntry, TransitionOutcome,
    TransitionSource,
};
pub use status::ShipmentStatus;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::error::{ShippingError, ShippingResult};
    pub use crate::provider::{DeliveryProvider, ProviderStatus};
    pub use crate::reconcile::{Reconciler, ReconciliationSummary};
    pub use crate::repository::{InMemoryShipmentRepository, ShipmentRepository};
    pub use crate::shipment::{Shipment, TransitionOutcome, TransitionSource};
    pub use crate::status::ShipmentStatus;
}
