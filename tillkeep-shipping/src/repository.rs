//! Shipment storage.

use crate::error::{ShippingError, ShippingResult};
use crate::shipment::{RemittanceReceipt, Shipment, TransitionOutcome, TransitionSource};
use crate::status::ShipmentStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Shipment storage.
///
/// Status and remittance changes go through [`apply_status`] and
/// [`mark_remitted`], which must run [`Shipment::apply`] and
/// [`Shipment::mark_remitted`] on the stored record under the store's own
/// write exclusion. Implementations never write `status` directly.
///
/// [`apply_status`]: ShipmentRepository::apply_status
/// [`mark_remitted`]: ShipmentRepository::mark_remitted
#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    async fn get(&self, id: &str) -> ShippingResult<Shipment>;

    async fn find_by_external_id(&self, external_id: &str) -> ShippingResult<Shipment>;

    async fn list_non_terminal(&self) -> ShippingResult<Vec<Shipment>>;

    async fn list_all(&self) -> ShippingResult<Vec<Shipment>>;

    /// Store a newly booked shipment. Fails if the id or external id is taken.
    async fn insert(&self, shipment: Shipment) -> ShippingResult<()>;

    async fn apply_status(
        &self,
        id: &str,
        reported: ShipmentStatus,
        reported_at: DateTime<Utc>,
        source: TransitionSource,
    ) -> ShippingResult<TransitionOutcome>;

    async fn mark_remitted(&self, id: &str, at: DateTime<Utc>) -> ShippingResult<RemittanceReceipt>;
}

#[derive(Default)]
struct Inner {
    shipments: HashMap<String, Shipment>,
    by_external_id: HashMap<String, String>,
}

/// Process-local repository.
#[derive(Default)]
pub struct InMemoryShipmentRepository {
    inner: RwLock<Inner>,
}

impl InMemoryShipmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from existing records, e.g. a JSON export.
    pub fn from_shipments(shipments: impl IntoIterator<Item = Shipment>) -> ShippingResult<Self> {
        let mut inner = Inner::default();
        for shipment in shipments {
            Self::insert_into(&mut inner, shipment)?;
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    fn insert_into(inner: &mut Inner, shipment: Shipment) -> ShippingResult<()> {
        if inner.shipments.contains_key(&shipment.id) {
            return Err(ShippingError::InvalidState(format!(
                "shipment {} already exists",
                shipment.id
            )));
        }
        if inner.by_external_id.contains_key(&shipment.external_id) {
            return Err(ShippingError::InvalidState(format!(
                "external id {} already booked",
                shipment.external_id
            )));
        }
        inner
            .by_external_id
            .insert(shipment.external_id.clone(), shipment.id.clone());
        inner.shipments.insert(shipment.id.clone(), shipment);
        Ok(())
    }

    fn sorted(mut shipments: Vec<Shipment>) -> Vec<Shipment> {
        shipments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        shipments
    }
}

#[async_trait]
impl ShipmentRepository for InMemoryShipmentRepository {
    async fn get(&self, id: &str) -> ShippingResult<Shipment> {
        self.inner
            .read()
            .await
            .shipments
            .get(id)
            .cloned()
            .ok_or_else(|| ShippingError::NotFound(id.to_string()))
    }

    async fn find_by_external_id(&self, external_id: &str) -> ShippingResult<Shipment> {
        let inner = self.inner.read().await;
        inner
            .by_external_id
            .get(external_id)
            .and_then(|id| inner.shipments.get(id))
            .cloned()
            .ok_or_else(|| ShippingError::NotFound(external_id.to_string()))
    }

    async fn list_non_terminal(&self) -> ShippingResult<Vec<Shipment>> {
        let inner = self.inner.read().await;
        Ok(Self::sorted(
            inner
                .shipments
                .values()
                .filter(|s| !s.status.is_terminal())
                .cloned()
                .collect(),
        ))
    }

    async fn list_all(&self) -> ShippingResult<Vec<Shipment>> {
        let inner = self.inner.read().await;
        Ok(Self::sorted(inner.shipments.values().cloned().collect()))
    }

    async fn insert(&self, shipment: Shipment) -> ShippingResult<()> {
        let mut inner = self.inner.write().await;
        Self::insert_into(&mut inner, shipment)
    }

    async fn apply_status(
        &self,
        id: &str,
        reported: ShipmentStatus,
        reported_at: DateTime<Utc>,
        source: TransitionSource,
    ) -> ShippingResult<TransitionOutcome> {
        let mut inner = self.inner.write().await;
        let shipment = inner
            .shipments
            .get_mut(id)
            .ok_or_else(|| ShippingError::NotFound(id.to_string()))?;
        Ok(shipment.apply(reported, reported_at, source))
    }

    async fn mark_remitted(&self, id: &str, at: DateTime<Utc>) -> ShippingResult<RemittanceReceipt> {
        let mut inner = self.inner.write().await;
        let shipment = inner
            .shipments
            .get_mut(id)
            .ok_or_else(|| ShippingError::NotFound(id.to_string()))?;
        shipment.mark_remitted(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let repo = InMemoryShipmentRepository::new();
        repo.insert(Shipment::new("SH1", "TRK1")).await.unwrap();

        assert_eq!(repo.get("SH1").await.unwrap().external_id, "TRK1");
        assert_eq!(repo.find_by_external_id("TRK1").await.unwrap().id, "SH1");
        assert!(repo.get("SH2").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let repo = InMemoryShipmentRepository::new();
        repo.insert(Shipment::new("SH1", "TRK1")).await.unwrap();
        assert!(repo.insert(Shipment::new("SH1", "TRK9")).await.is_err());
        assert!(repo.insert(Shipment::new("SH9", "TRK1")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_non_terminal() {
        let repo = InMemoryShipmentRepository::new();
        repo.insert(Shipment::new("SH1", "TRK1")).await.unwrap();
        repo.insert(Shipment::new("SH2", "TRK2")).await.unwrap();
        repo.apply_status("SH2", ShipmentStatus::Cancelled, Utc::now(), TransitionSource::Manual)
            .await
            .unwrap();

        let open: Vec<_> = repo
            .list_non_terminal()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(open, vec!["SH1".to_string()]);
        assert_eq!(repo.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_unknown_shipment() {
        let repo = InMemoryShipmentRepository::new();
        let err = repo
            .apply_status("nope", ShipmentStatus::Delivered, Utc::now(), TransitionSource::Webhook)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
