//! Sales records and their state changes.
//!
//! Each mutating method checks its precondition, changes the record in place
//! and returns a small serializable result. That result is what the mutation
//! gateway stores and replays for retried requests.

use crate::error::{SalesError, SalesResult};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sale status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Completed,
    Cancelled,
}

/// A completed point-of-sale transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub total: Decimal,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Result of cancelling a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleCancellation {
    pub sale_id: String,
    pub status: SaleStatus,
    pub cancelled_at: DateTime<Utc>,
}

impl Sale {
    pub fn new(id: impl Into<String>, total: Decimal) -> Self {
        Self {
            id: id.into(),
            total,
            status: SaleStatus::Completed,
            created_at: Utc::now(),
            cancelled_at: None,
        }
    }

    /// `COMPLETED -> CANCELLED`.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> SalesResult<SaleCancellation> {
        if self.status != SaleStatus::Completed {
            return Err(SalesError::InvalidState(format!(
                "sale {} is already cancelled",
                self.id
            )));
        }

        self.status = SaleStatus::Cancelled;
        self.cancelled_at = Some(at);
        Ok(SaleCancellation {
            sale_id: self.id.clone(),
            status: self.status,
            cancelled_at: at,
        })
    }
}

/// Refund status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Issued,
    Voided,
}

/// Money returned against a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub sale_id: String,
    pub amount: Decimal,
    pub status: RefundStatus,
    pub issued_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
}

/// Result of voiding a refund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundVoid {
    pub refund_id: String,
    pub sale_id: String,
    pub amount: Decimal,
    pub status: RefundStatus,
    pub voided_at: DateTime<Utc>,
}

impl Refund {
    pub fn new(id: impl Into<String>, sale_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: id.into(),
            sale_id: sale_id.into(),
            amount,
            status: RefundStatus::Issued,
            issued_at: Utc::now(),
            voided_at: None,
        }
    }

    /// `ISSUED -> VOIDED`.
    pub fn void(&mut self, at: DateTime<Utc>) -> SalesResult<RefundVoid> {
        if self.status != RefundStatus::Issued {
            return Err(SalesError::InvalidState(format!(
                "refund {} is already voided",
                self.id
            )));
        }

        self.status = RefundStatus::Voided;
        self.voided_at = Some(at);
        Ok(RefundVoid {
            refund_id: self.id.clone(),
            sale_id: self.sale_id.clone(),
            amount: self.amount,
            status: self.status,
            voided_at: at,
        })
    }
}

/// Store credit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreCreditStatus {
    Active,
    Expired,
}

/// Credit issued to a customer, redeemable until it expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreCredit {
    pub id: String,
    pub balance: Decimal,
    pub status: StoreCreditStatus,
    pub issued_at: DateTime<Utc>,
    pub expired_at: Option<DateTime<Utc>>,
}

/// Result of expiring a store credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditExpiry {
    pub credit_id: String,
    pub status: StoreCreditStatus,
    /// Balance that was left on the credit
    pub forfeited: Decimal,
    pub expired_at: DateTime<Utc>,
}

impl StoreCredit {
    pub fn new(id: impl Into<String>, balance: Decimal) -> Self {
        Self {
            id: id.into(),
            balance,
            status: StoreCreditStatus::Active,
            issued_at: Utc::now(),
            expired_at: None,
        }
    }

    pub fn issued_at(mut self, at: DateTime<Utc>) -> Self {
        self.issued_at = at;
        self
    }

    /// When the credit stops being redeemable.
    pub fn expires_at(&self, validity_days: u32) -> DateTime<Utc> {
        self.issued_at + Duration::days(i64::from(validity_days))
    }

    /// `ACTIVE -> EXPIRED`, forfeiting the remaining balance. Fails while the
    /// credit is still within its validity window.
    pub fn expire(&mut self, now: DateTime<Utc>, validity_days: u32) -> SalesResult<CreditExpiry> {
        if self.status != StoreCreditStatus::Active {
            return Err(SalesError::InvalidState(format!(
                "store credit {} is already expired",
                self.id
            )));
        }

        let expires_at = self.expires_at(validity_days);
        if now < expires_at {
            return Err(SalesError::InvalidState(format!(
                "store credit {} is valid until {}",
                self.id,
                expires_at.to_rfc3339()
            )));
        }

        let forfeited = self.balance;
        self.balance = Decimal::ZERO;
        self.status = StoreCreditStatus::Expired;
        self.expired_at = Some(now);
        Ok(CreditExpiry {
            credit_id: self.id.clone(),
            status: self.status,
            forfeited,
            expired_at: now,
        })
    }
}

/// Layaway status, derived from payments, total and due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayawayStatus {
    Open,
    PaidInFull,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayawayPayment {
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

/// Goods held for a customer who pays in installments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layaway {
    pub id: String,
    pub total: Decimal,
    pub payments: Vec<LayawayPayment>,
    pub due_date: DateTime<Utc>,
    pub status: LayawayStatus,
    pub updated_at: DateTime<Utc>,
}

/// Result of recomputing a layaway's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayawayRecompute {
    pub layaway_id: String,
    pub previous: LayawayStatus,
    pub status: LayawayStatus,
    pub paid: Decimal,
    pub balance_due: Decimal,
}

impl Layaway {
    pub fn new(id: impl Into<String>, total: Decimal, due_date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            total,
            payments: Vec::new(),
            due_date,
            status: LayawayStatus::Open,
            updated_at: Utc::now(),
        }
    }

    pub fn with_payment(mut self, amount: Decimal, paid_at: DateTime<Utc>) -> Self {
        self.payments.push(LayawayPayment { amount, paid_at });
        self
    }

    pub fn paid(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn balance_due(&self) -> Decimal {
        (self.total - self.paid()).max(Decimal::ZERO)
    }

    /// Status as of `now`. A cancelled layaway stays cancelled.
    pub fn derive_status(&self, now: DateTime<Utc>) -> LayawayStatus {
        if self.status == LayawayStatus::Cancelled {
            LayawayStatus::Cancelled
        } else if self.paid() >= self.total {
            LayawayStatus::PaidInFull
        } else if now > self.due_date {
            LayawayStatus::Overdue
        } else {
            LayawayStatus::Open
        }
    }

    pub fn recompute(&mut self, now: DateTime<Utc>) -> SalesResult<LayawayRecompute> {
        if self.status == LayawayStatus::Cancelled {
            return Err(SalesError::InvalidState(format!(
                "layaway {} is cancelled",
                self.id
            )));
        }

        let previous = self.status;
        self.status = self.derive_status(now);
        self.updated_at = now;
        Ok(LayawayRecompute {
            layaway_id: self.id.clone(),
            previous,
            status: self.status,
            paid: self.paid(),
            balance_due: self.balance_due(),
        })
    }
}
