//! Shipment model and its state machine.
//!
//! [`Shipment::apply`] and [`Shipment::mark_remitted`] are the only ways a
//! shipment's status or remittance flag change. Poll results, webhook events
//! and remittance requests all come through here, so the terminal rule is
//! enforced in one place.

use crate::error::{ShippingError, ShippingResult};
use crate::status::ShipmentStatus;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tillkeep_log::info;

/// Where a status report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionSource {
    Poll,
    Reconciliation,
    Webhook,
    Manual,
}

/// What happened to a recorded report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Applied,
    /// The shipment was already terminal; the report was kept for audit only.
    RejectedTerminal,
}

/// One line of a shipment's audit trail, in the order reports were applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub from: ShipmentStatus,
    pub to: ShipmentStatus,
    /// When the carrier says the change happened
    pub reported_at: DateTime<Utc>,
    /// When we processed the report
    pub recorded_at: DateTime<Utc>,
    pub source: TransitionSource,
    pub disposition: Disposition,
}

/// Result of [`Shipment::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },
    /// Same status as already held.
    Unchanged { status: ShipmentStatus },
    /// The shipment is terminal and the report names a different status.
    Stale {
        current: ShipmentStatus,
        reported: ShipmentStatus,
    },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, TransitionOutcome::Stale { .. })
    }
}

/// Proof of a completed remittance, returned to the caller and stored as the
/// idempotent response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemittanceReceipt {
    pub shipment_id: String,
    pub external_id: String,
    pub remitted: bool,
    pub remitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    /// Reference into the delivery provider's system
    pub external_id: String,
    pub status: ShipmentStatus,
    #[serde(default)]
    pub cash_on_delivery: bool,
    #[serde(default)]
    pub remitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<StatusHistoryEntry>,
    pub created_at: DateTime<Utc>,
    /// Last time any report for this shipment was processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Last applied transition, or booking time
    pub last_transition_at: DateTime<Utc>,
}

impl Shipment {
    /// A freshly booked shipment in `CREATED`.
    pub fn new(id: impl Into<String>, external_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            external_id: external_id.into(),
            status: ShipmentStatus::Created,
            cash_on_delivery: false,
            remitted: false,
            remitted_at: None,
            history: Vec::new(),
            created_at: now,
            last_seen_at: None,
            last_transition_at: now,
        }
    }

    pub fn cash_on_delivery(mut self) -> Self {
        self.cash_on_delivery = true;
        self
    }

    /// Backdate the booking, e.g. when importing existing shipments.
    pub fn booked_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.last_transition_at = at;
        self
    }

    /// Apply a reported status.
    ///
    /// - same status: no transition, `last_seen_at` is bumped
    /// - terminal and different: rejected and recorded as
    ///   [`Disposition::RejectedTerminal`], status unchanged
    /// - otherwise: recorded and applied
    pub fn apply(
        &mut self,
        reported: ShipmentStatus,
        reported_at: DateTime<Utc>,
        source: TransitionSource,
    ) -> TransitionOutcome {
        let now = Utc::now();
        self.last_seen_at = Some(now);

        if reported == self.status {
            return TransitionOutcome::Unchanged { status: reported };
        }

        let from = self.status;

        if from.is_terminal() {
            self.history.push(StatusHistoryEntry {
                from,
                to: reported,
                reported_at,
                recorded_at: now,
                source,
                disposition: Disposition::RejectedTerminal,
            });
            info!(
                fields: {
                    "shipment_id" => self.id,
                    "current" => from,
                    "reported" => reported,
                    "source" => format!("{:?}", source)
                },
                "Rejected stale transition on terminal shipment"
            );
            return TransitionOutcome::Stale {
                current: from,
                reported,
            };
        }

        self.history.push(StatusHistoryEntry {
            from,
            to: reported,
            reported_at,
            recorded_at: now,
            source,
            disposition: Disposition::Applied,
        });
        self.status = reported;
        self.last_transition_at = now;

        TransitionOutcome::Applied { from, to: reported }
    }

    /// Mark a delivered cash-on-delivery shipment as remitted.
    ///
    /// Fails with `InvalidState` if the shipment is not cash on delivery,
    /// not delivered, or already remitted.
    pub fn mark_remitted(&mut self, at: DateTime<Utc>) -> ShippingResult<RemittanceReceipt> {
        if !self.cash_on_delivery {
            return Err(ShippingError::InvalidState(format!(
                "shipment {} is not cash on delivery",
                self.id
            )));
        }
        if self.status != ShipmentStatus::Delivered {
            return Err(ShippingError::InvalidState(format!(
                "shipment {} is {}, remittance requires DELIVERED",
                self.id, self.status
            )));
        }
        if self.remitted {
            return Err(ShippingError::InvalidState(format!(
                "shipment {} is already remitted",
                self.id
            )));
        }

        self.remitted = true;
        self.remitted_at = Some(at);

        Ok(RemittanceReceipt {
            shipment_id: self.id.clone(),
            external_id: self.external_id.clone(),
            remitted: true,
            remitted_at: at,
        })
    }

    /// Delivered, cash on delivery, and not yet remitted.
    pub fn is_awaiting_remittance(&self) -> bool {
        self.cash_on_delivery && self.status == ShipmentStatus::Delivered && !self.remitted
    }

    /// Non-terminal with no transition for at least `threshold`.
    pub fn is_stalled(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        !self.status.is_terminal() && now - self.last_transition_at >= threshold
    }
}
