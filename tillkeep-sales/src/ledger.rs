//! Storage for sales records.

use crate::error::{SalesError, SalesResult};
use crate::model::{Layaway, Refund, Sale, StoreCredit};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence for sales records. Backed by the document store in
/// production.
#[async_trait]
pub trait SalesLedger: Send + Sync {
    async fn get_sale(&self, id: &str) -> SalesResult<Sale>;
    async fn put_sale(&self, sale: Sale) -> SalesResult<()>;

    async fn get_refund(&self, id: &str) -> SalesResult<Refund>;
    async fn put_refund(&self, refund: Refund) -> SalesResult<()>;

    async fn get_store_credit(&self, id: &str) -> SalesResult<StoreCredit>;
    async fn put_store_credit(&self, credit: StoreCredit) -> SalesResult<()>;

    async fn get_layaway(&self, id: &str) -> SalesResult<Layaway>;
    async fn put_layaway(&self, layaway: Layaway) -> SalesResult<()>;
}

#[derive(Default)]
struct Tables {
    sales: HashMap<String, Sale>,
    refunds: HashMap<String, Refund>,
    credits: HashMap<String, StoreCredit>,
    layaways: HashMap<String, Layaway>,
}

/// In-memory ledger.
#[derive(Default)]
pub struct InMemorySalesLedger {
    tables: RwLock<Tables>,
}

impl InMemorySalesLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a sale outright, as an operator purge would.
    pub async fn remove_sale(&self, id: &str) -> Option<Sale> {
        self.tables.write().await.sales.remove(id)
    }
}

fn lookup<T: Clone>(table: &HashMap<String, T>, kind: &'static str, id: &str) -> SalesResult<T> {
    table
        .get(id)
        .cloned()
        .ok_or_else(|| SalesError::not_found(kind, id))
}

#[async_trait]
impl SalesLedger for InMemorySalesLedger {
    async fn get_sale(&self, id: &str) -> SalesResult<Sale> {
        lookup(&self.tables.read().await.sales, "Sale", id)
    }

    async fn put_sale(&self, sale: Sale) -> SalesResult<()> {
        self.tables.write().await.sales.insert(sale.id.clone(), sale);
        Ok(())
    }

    async fn get_refund(&self, id: &str) -> SalesResult<Refund> {
        lookup(&self.tables.read().await.refunds, "Refund", id)
    }

    async fn put_refund(&self, refund: Refund) -> SalesResult<()> {
        self.tables
            .write()
            .await
            .refunds
            .insert(refund.id.clone(), refund);
        Ok(())
    }

    async fn get_store_credit(&self, id: &str) -> SalesResult<StoreCredit> {
        lookup(&self.tables.read().await.credits, "Store credit", id)
    }

    async fn put_store_credit(&self, credit: StoreCredit) -> SalesResult<()> {
        self.tables
            .write()
            .await
            .credits
            .insert(credit.id.clone(), credit);
        Ok(())
    }

    async fn get_layaway(&self, id: &str) -> SalesResult<Layaway> {
        lookup(&self.tables.read().await.layaways, "Layaway", id)
    }

    async fn put_layaway(&self, layaway: Layaway) -> SalesResult<()> {
        self.tables
            .write()
            .await
            .layaways
            .insert(layaway.id.clone(), layaway);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_put_and_get() {
        let ledger = InMemorySalesLedger::new();
        ledger.put_sale(Sale::new("S1", Decimal::new(999, 2))).await.unwrap();

        assert_eq!(ledger.get_sale("S1").await.unwrap().total, Decimal::new(999, 2));
        assert!(ledger.get_refund("S1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_remove_sale() {
        let ledger = InMemorySalesLedger::new();
        ledger.put_sale(Sale::new("S1", Decimal::ONE)).await.unwrap();

        assert!(ledger.remove_sale("S1").await.is_some());
        assert!(ledger.get_sale("S1").await.is_err());
    }
}
