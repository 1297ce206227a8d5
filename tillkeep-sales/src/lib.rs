//! Point-of-sale operations for tillkeep
//!
//! Cancelling a sale, voiding a refund, expiring store credit and
//! recomputing a layaway's status all change money-bearing records. Clients
//! retry these over flaky networks, so each goes through the
//! [`MutationGateway`](tillkeep_idempotency::MutationGateway): the first
//! request with a given `Idempotency-Key` runs, later ones replay its
//! response.
//!
//! ```
//! use std::sync::Arc;
//! use rust_decimal::Decimal;
//! use tillkeep_config::{InMemorySettingsStore, SettingsService};
//! use tillkeep_idempotency::{InMemoryIdempotencyStore, MutationGateway};
//! use tillkeep_sales::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Arc::new(InMemorySalesLedger::new());
//! ledger.put_sale(Sale::new("S1", Decimal::new(1999, 2))).await?;
//!
//! let settings = SettingsService::load(Arc::new(InMemorySettingsStore::new())).await?;
//! let gateway = MutationGateway::new(Arc::new(InMemoryIdempotencyStore::new()));
//! let sales = SalesService::new(ledger, gateway, Arc::new(settings));
//!
//! let first = sales.cancel_sale(Some("abc"), "S1").await?;
//! let retry = sales.cancel_sale(Some("abc"), "S1").await?;
//! assert_eq!(first.value, retry.value);
//! assert!(retry.replayed);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ledger;
pub mod model;
pub mod operations;

pub use error::{SalesError, SalesResult};
pub use ledger::{InMemorySalesLedger, SalesLedger};
pub use model::{
    CreditExpiry, Layaway, LayawayPayment, LayawayRecompute, LayawayStatus, Refund, RefundStatus,
    RefundVoid, Sale, SaleCancellation, SaleStatus, StoreCredit, StoreCreditStatus,
};
pub use operations::{OperationResult, SalesService};
