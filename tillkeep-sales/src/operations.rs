//! Financially-significant operations, each behind the mutation gateway.
//!
//! Every operation here requires an idempotency key and runs exclusively on
//! its record id, so a retried request replays the first response and two
//! different keys cannot change the same record at once.

use crate::error::{SalesError, SalesResult};
use crate::ledger::SalesLedger;
use crate::model::{CreditExpiry, LayawayRecompute, RefundVoid, SaleCancellation};
use chrono::Utc;
use std::sync::Arc;
use tillkeep_config::SettingsService;
use tillkeep_idempotency::{Execution, GatewayError, KeyPolicy, MutationGateway};
use tillkeep_log::info;

/// What a gateway-wrapped sales operation returns.
pub type OperationResult<T> = Result<Execution<T>, GatewayError<SalesError>>;

pub struct SalesService {
    ledger: Arc<dyn SalesLedger>,
    gateway: MutationGateway,
    settings: Arc<SettingsService>,
}

impl SalesService {
    pub fn new(
        ledger: Arc<dyn SalesLedger>,
        gateway: MutationGateway,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            ledger,
            gateway,
            settings,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn SalesLedger> {
        &self.ledger
    }

    pub async fn cancel_sale(&self, key: Option<&str>, sale_id: &str) -> OperationResult<SaleCancellation> {
        self.gateway
            .execute_exclusive(key, KeyPolicy::Required, &format!("sale:{}", sale_id), move || {
                self.cancel_sale_now(sale_id)
            })
            .await
    }

    pub async fn void_refund(&self, key: Option<&str>, refund_id: &str) -> OperationResult<RefundVoid> {
        self.gateway
            .execute_exclusive(key, KeyPolicy::Required, &format!("refund:{}", refund_id), move || {
                self.void_refund_now(refund_id)
            })
            .await
    }

    /// Expire a store credit whose validity window, taken from the current
    /// store settings, has passed.
    pub async fn expire_store_credit(
        &self,
        key: Option<&str>,
        credit_id: &str,
    ) -> OperationResult<CreditExpiry> {
        self.gateway
            .execute_exclusive(
                key,
                KeyPolicy::Required,
                &format!("store_credit:{}", credit_id),
                move || self.expire_store_credit_now(credit_id),
            )
            .await
    }

    pub async fn recompute_layaway_status(
        &self,
        key: Option<&str>,
        layaway_id: &str,
    ) -> OperationResult<LayawayRecompute> {
        self.gateway
            .execute_exclusive(
                key,
                KeyPolicy::Required,
                &format!("layaway:{}", layaway_id),
                move || self.recompute_layaway_now(layaway_id),
            )
            .await
    }

    async fn cancel_sale_now(&self, sale_id: &str) -> SalesResult<SaleCancellation> {
        let mut sale = self.ledger.get_sale(sale_id).await?;
        let result = sale.cancel(Utc::now())?;
        self.ledger.put_sale(sale).await?;

        info!(fields: { "sale_id" => sale_id }, "Sale cancelled");
        Ok(result)
    }

    async fn void_refund_now(&self, refund_id: &str) -> SalesResult<RefundVoid> {
        let mut refund = self.ledger.get_refund(refund_id).await?;
        let result = refund.void(Utc::now())?;
        self.ledger.put_refund(refund).await?;

        info!(
            fields: { "refund_id" => refund_id, "amount" => result.amount },
            "Refund voided"
        );
        Ok(result)
    }

    async fn expire_store_credit_now(&self, credit_id: &str) -> SalesResult<CreditExpiry> {
        let validity_days = self.settings.current().store_credit_validity_days;

        let mut credit = self.ledger.get_store_credit(credit_id).await?;
        let result = credit.expire(Utc::now(), validity_days)?;
        self.ledger.put_store_credit(credit).await?;

        info!(
            fields: { "credit_id" => credit_id, "forfeited" => result.forfeited },
            "Store credit expired"
        );
        Ok(result)
    }

    async fn recompute_layaway_now(&self, layaway_id: &str) -> SalesResult<LayawayRecompute> {
        let mut layaway = self.ledger.get_layaway(layaway_id).await?;
        let result = layaway.recompute(Utc::now())?;
        self.ledger.put_layaway(layaway).await?;

        if result.previous != result.status {
            info!(
                fields: { "layaway_id" => layaway_id },
                "Layaway status {:?} -> {:?}", result.previous, result.status
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemorySalesLedger;
    use crate::model::{Layaway, LayawayStatus, Refund, Sale, SaleStatus, StoreCredit};
    use chrono::Duration;
    use rust_decimal::Decimal;
    use tillkeep_config::InMemorySettingsStore;
    use tillkeep_idempotency::InMemoryIdempotencyStore;

    async fn service() -> (SalesService, Arc<InMemorySalesLedger>) {
        let ledger = Arc::new(InMemorySalesLedger::new());
        let gateway = MutationGateway::new(Arc::new(InMemoryIdempotencyStore::new()));
        let settings = SettingsService::load(Arc::new(InMemorySettingsStore::new()))
            .await
            .unwrap();
        (
            SalesService::new(ledger.clone(), gateway, Arc::new(settings)),
            ledger,
        )
    }

    #[tokio::test]
    async fn test_cancel_requires_key() {
        let (service, ledger) = service().await;
        ledger.put_sale(Sale::new("S1", Decimal::ONE)).await.unwrap();

        let err = service.cancel_sale(None, "S1").await.unwrap_err();
        assert!(err.is_missing_key());
        assert_eq!(ledger.get_sale("S1").await.unwrap().status, SaleStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_replays_after_sale_removed() {
        let (service, ledger) = service().await;
        ledger.put_sale(Sale::new("S1", Decimal::ONE)).await.unwrap();

        let first = service.cancel_sale(Some("abc"), "S1").await.unwrap();
        assert!(!first.replayed);

        ledger.remove_sale("S1").await;
        let second = service.cancel_sale(Some("abc"), "S1").await.unwrap();
        assert!(second.replayed);
        assert_eq!(first.value, second.value);
    }

    #[tokio::test]
    async fn test_new_key_on_cancelled_sale_fails() {
        let (service, ledger) = service().await;
        ledger.put_sale(Sale::new("S1", Decimal::ONE)).await.unwrap();

        service.cancel_sale(Some("k1"), "S1").await.unwrap();
        let err = service.cancel_sale(Some("k2"), "S1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Operation(ref e) if e.is_invalid_state()));
    }

    #[tokio::test]
    async fn test_failed_attempt_is_retryable() {
        let (service, ledger) = service().await;

        let err = service.void_refund(Some("k1"), "R1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Operation(ref e) if e.is_not_found()));

        ledger
            .put_refund(Refund::new("R1", "S1", Decimal::TEN))
            .await
            .unwrap();
        let voided = service.void_refund(Some("k1"), "R1").await.unwrap();
        assert!(!voided.replayed);
        assert_eq!(voided.value.amount, Decimal::TEN);
    }

    #[tokio::test]
    async fn test_expire_uses_settings_validity() {
        let (service, ledger) = service().await;
        let issued = Utc::now() - Duration::days(40);
        ledger
            .put_store_credit(StoreCredit::new("C1", Decimal::TEN).issued_at(issued))
            .await
            .unwrap();

        // Default validity is a year.
        let err = service.expire_store_credit(Some("k1"), "C1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Operation(ref e) if e.is_invalid_state()));

        service
            .settings
            .update(|s| s.store_credit_validity_days = 30)
            .await
            .unwrap();
        let expired = service.expire_store_credit(Some("k2"), "C1").await.unwrap();
        assert_eq!(expired.value.forfeited, Decimal::TEN);
    }

    #[tokio::test]
    async fn test_recompute_layaway() {
        let (service, ledger) = service().await;
        let now = Utc::now();
        ledger
            .put_layaway(
                Layaway::new("L1", Decimal::TEN, now + Duration::days(3))
                    .with_payment(Decimal::TEN, now),
            )
            .await
            .unwrap();

        let result = service.recompute_layaway_status(Some("k1"), "L1").await.unwrap();
        assert_eq!(result.value.status, LayawayStatus::PaidInFull);
        assert_eq!(ledger.get_layaway("L1").await.unwrap().status, LayawayStatus::PaidInFull);
    }
}
