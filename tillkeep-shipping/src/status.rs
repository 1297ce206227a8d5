//! Shipment status domain.

use crate::error::{ShippingError, ShippingResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Created,
    InTransit,
    OutForDelivery,
    Delivered,
    Returned,
    Cancelled,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 6] = [
        ShipmentStatus::Created,
        ShipmentStatus::InTransit,
        ShipmentStatus::OutForDelivery,
        ShipmentStatus::Delivered,
        ShipmentStatus::Returned,
        ShipmentStatus::Cancelled,
    ];

    /// Terminal statuses accept no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ShipmentStatus::Delivered | ShipmentStatus::Returned | ShipmentStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Created => "CREATED",
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            ShipmentStatus::Delivered => "DELIVERED",
            ShipmentStatus::Returned => "RETURNED",
            ShipmentStatus::Cancelled => "CANCELLED",
        }
    }

    /// Map a carrier's status label onto our statuses.
    ///
    /// Matching ignores case and treats `-` and spaces like `_`, so
    /// `"Out for delivery"`, `"out-for-delivery"` and `"OUT_FOR_DELIVERY"`
    /// are the same label.
    pub fn from_provider_label(label: &str) -> ShippingResult<Self> {
        let normalized: String = label
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        let status = match normalized.as_str() {
            "created" | "booked" | "label_created" | "info_received" | "pending" => {
                ShipmentStatus::Created
            }
            "picked_up" | "accepted" | "in_transit" | "transit" | "at_hub" | "departed"
            | "arrived" | "delivery_attempted" => ShipmentStatus::InTransit,
            "out_for_delivery" => ShipmentStatus::OutForDelivery,
            "delivered" => ShipmentStatus::Delivered,
            "returned" | "returned_to_sender" | "return_to_sender" | "rto" => {
                ShipmentStatus::Returned
            }
            "cancelled" | "canceled" | "voided" => ShipmentStatus::Cancelled,
            _ => return Err(ShippingError::UnknownStatus(label.to_string())),
        };
        Ok(status)
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = ShippingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_provider_label(s)
    }
}
