//! Reconciliation passes against the delivery provider.
//!
//! Two passes share one code path:
//!
//! - the tracking poll, run often, over every non-terminal shipment
//! - the daily reconciliation, which also reports drift that a status query
//!   alone does not fix: stalled shipments and delivered cash-on-delivery
//!   shipments still waiting for remittance
//!
//! A failed query for one shipment is recorded in the summary and never
//! aborts the pass. Passes are safe to abandon and re-run: a second run with
//! no provider change applies nothing.

use crate::error::ShippingResult;
use crate::provider::DeliveryProvider;
use crate::repository::ShipmentRepository;
use crate::shipment::{Shipment, TransitionOutcome, TransitionSource};
use crate::status::ShipmentStatus;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tillkeep_config::CoreConfig;
use tillkeep_log::{info, warn};

/// Which pass produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    TrackingPoll,
    DailyReconciliation,
}

impl PassKind {
    fn source(self) -> TransitionSource {
        match self {
            PassKind::TrackingPoll => TransitionSource::Poll,
            PassKind::DailyReconciliation => TransitionSource::Reconciliation,
        }
    }
}

/// Per-shipment line of a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationDetail {
    Changed {
        shipment_id: String,
        external_id: String,
        from: ShipmentStatus,
        to: ShipmentStatus,
    },
    Unchanged {
        shipment_id: String,
        external_id: String,
        status: ShipmentStatus,
    },
    Stale {
        shipment_id: String,
        external_id: String,
        current: ShipmentStatus,
        reported: ShipmentStatus,
    },
    Failed {
        shipment_id: String,
        external_id: String,
        error: String,
    },
    /// Non-terminal, unchanged by this pass, no transition since `since`.
    Stalled {
        shipment_id: String,
        external_id: String,
        status: ShipmentStatus,
        since: DateTime<Utc>,
    },
    AwaitingRemittance {
        shipment_id: String,
        external_id: String,
    },
}

/// Result of one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub kind: PassKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub examined: usize,
    pub changed: usize,
    pub failed: usize,
    pub stale: usize,
    pub details: Vec<ReconciliationDetail>,
}

impl ReconciliationSummary {
    /// Ids of shipments whose status changed in this pass.
    pub fn changed_ids(&self) -> Vec<&str> {
        self.details
            .iter()
            .filter_map(|d| match d {
                ReconciliationDetail::Changed { shipment_id, .. } => Some(shipment_id.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Provider queries in flight at once
    pub concurrency: usize,
    pub stall_threshold: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            stall_threshold: Duration::hours(72),
        }
    }
}

impl From<&CoreConfig> for ReconcilerConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            concurrency: config.reconcile_concurrency,
            stall_threshold: Duration::hours(config.stall_threshold_hours as i64),
        }
    }
}

/// Feeds provider statuses into the shipment state machine.
pub struct Reconciler {
    repository: Arc<dyn ShipmentRepository>,
    provider: Arc<dyn DeliveryProvider>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        repository: Arc<dyn ShipmentRepository>,
        provider: Arc<dyn DeliveryProvider>,
    ) -> Self {
        Self::with_config(repository, provider, ReconcilerConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn ShipmentRepository>,
        provider: Arc<dyn DeliveryProvider>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            repository,
            provider,
            config,
        }
    }

    pub fn repository(&self) -> &Arc<dyn ShipmentRepository> {
        &self.repository
    }

    /// Query the provider for every non-terminal shipment and apply the
    /// results.
    pub async fn run_tracking_poll(&self) -> ShippingResult<ReconciliationSummary> {
        let started_at = Utc::now();
        let shipments = self.repository.list_non_terminal().await?;
        let details = self.query_all(shipments, PassKind::TrackingPoll).await;
        Ok(self.finish(PassKind::TrackingPoll, started_at, details, 0))
    }

    /// The tracking poll plus drift reporting. Drift entries never change
    /// state.
    pub async fn run_daily_reconciliation(&self) -> ShippingResult<ReconciliationSummary> {
        let started_at = Utc::now();
        let shipments = self.repository.list_non_terminal().await?;

        let stall_cutoff = self.config.stall_threshold;
        let mut details = self
            .query_all(shipments.clone(), PassKind::DailyReconciliation)
            .await;

        let now = Utc::now();
        let mut drift = Vec::new();
        for (shipment, detail) in shipments.iter().zip(details.iter()) {
            let unchanged = matches!(detail, ReconciliationDetail::Unchanged { .. });
            if unchanged && shipment.is_stalled(now, stall_cutoff) {
                drift.push(ReconciliationDetail::Stalled {
                    shipment_id: shipment.id.clone(),
                    external_id: shipment.external_id.clone(),
                    status: shipment.status,
                    since: shipment.last_transition_at,
                });
            }
        }

        for shipment in self.repository.list_all().await? {
            if shipment.is_awaiting_remittance() {
                drift.push(ReconciliationDetail::AwaitingRemittance {
                    shipment_id: shipment.id,
                    external_id: shipment.external_id,
                });
            }
        }

        let drift_count = drift.len();
        details.extend(drift);
        Ok(self.finish(PassKind::DailyReconciliation, started_at, details, drift_count))
    }

    /// Details come back in input order.
    async fn query_all(&self, shipments: Vec<Shipment>, kind: PassKind) -> Vec<ReconciliationDetail> {
        let concurrency = self.config.concurrency.max(1);
        stream::iter(shipments)
            .map(|shipment| self.reconcile_one(shipment, kind.source()))
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn reconcile_one(&self, shipment: Shipment, source: TransitionSource) -> ReconciliationDetail {
        let Shipment { id, external_id, .. } = shipment;

        let reported = match self.provider.get_status(&external_id).await {
            Ok(status) => status,
            Err(e) => return self.failed(id, external_id, e.to_string()),
        };
        let status = match reported.shipment_status() {
            Ok(status) => status,
            Err(e) => return self.failed(id, external_id, e.to_string()),
        };

        match self
            .repository
            .apply_status(&id, status, reported.reported_at, source)
            .await
        {
            Ok(TransitionOutcome::Applied { from, to }) => ReconciliationDetail::Changed {
                shipment_id: id,
                external_id,
                from,
                to,
            },
            Ok(TransitionOutcome::Unchanged { status }) => ReconciliationDetail::Unchanged {
                shipment_id: id,
                external_id,
                status,
            },
            Ok(TransitionOutcome::Stale { current, reported }) => ReconciliationDetail::Stale {
                shipment_id: id,
                external_id,
                current,
                reported,
            },
            Err(e) => self.failed(id, external_id, e.to_string()),
        }
    }

    fn failed(&self, shipment_id: String, external_id: String, error: String) -> ReconciliationDetail {
        warn!(
            fields: {
                "shipment_id" => shipment_id,
                "external_id" => external_id,
                "provider" => self.provider.name()
            },
            "Reconciliation failed for shipment: {}", error
        );
        ReconciliationDetail::Failed {
            shipment_id,
            external_id,
            error,
        }
    }

    fn finish(
        &self,
        kind: PassKind,
        started_at: DateTime<Utc>,
        details: Vec<ReconciliationDetail>,
        drift: usize,
    ) -> ReconciliationSummary {
        let count = |f: fn(&ReconciliationDetail) -> bool| details.iter().filter(|d| f(d)).count();

        let examined = details.len() - drift;
        let changed = count(|d| matches!(d, ReconciliationDetail::Changed { .. }));
        let failed = count(|d| matches!(d, ReconciliationDetail::Failed { .. }));
        let stale = count(|d| matches!(d, ReconciliationDetail::Stale { .. }));

        info!(
            fields: {
                "pass" => format!("{:?}", kind),
                "examined" => examined,
                "changed" => changed,
                "failed" => failed,
                "stale" => stale
            },
            "Reconciliation pass finished"
        );

        ReconciliationSummary {
            kind,
            started_at,
            finished_at: Utc::now(),
            examined,
            changed,
            failed,
            stale,
            details,
        }
    }
}
