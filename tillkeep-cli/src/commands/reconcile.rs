//! `tillkeep reconcile`
//!
//! Runs one reconciliation pass over shipments loaded from a JSON file and
//! prints the summary. With `--write` the updated shipments are written back.

use crate::error::{CliError, CliResult};
use clap::ValueEnum;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tillkeep_config::CoreConfig;
use tillkeep_log::info;
use tillkeep_shipping::{
    DeliveryProvider, HttpDeliveryProvider, InMemoryShipmentRepository, Reconciler,
    ReconcilerConfig, ReconciliationSummary, Shipment, ShipmentRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Frequent tracking poll over non-terminal shipments
    Poll,
    /// Daily sweep, with stalled and awaiting-remittance reporting
    Daily,
}

/// Run against the HTTP provider configured in `config`.
pub async fn execute(
    config: &CoreConfig,
    shipments: &Path,
    mode: Mode,
    write: bool,
) -> CliResult<ReconciliationSummary> {
    let provider = HttpDeliveryProvider::from_config(config)?.ok_or_else(|| {
        CliError::InvalidArgument(
            "no delivery provider configured (set TILLKEEP_PROVIDER_BASE_URL and TILLKEEP_PROVIDER_API_KEY)"
                .to_string(),
        )
    })?;

    run(
        Arc::new(provider),
        ReconcilerConfig::from(config),
        shipments,
        mode,
        write,
    )
    .await
}

pub async fn run(
    provider: Arc<dyn DeliveryProvider>,
    config: ReconcilerConfig,
    shipments_path: &Path,
    mode: Mode,
    write: bool,
) -> CliResult<ReconciliationSummary> {
    let shipments: Vec<Shipment> = serde_json::from_str(&fs::read_to_string(shipments_path)?)?;
    let repository = Arc::new(InMemoryShipmentRepository::from_shipments(shipments)?);

    let reconciler = Reconciler::with_config(repository.clone(), provider, config);
    let summary = match mode {
        Mode::Poll => reconciler.run_tracking_poll().await?,
        Mode::Daily => reconciler.run_daily_reconciliation().await?,
    };

    if write {
        let updated = repository.list_all().await?;
        fs::write(shipments_path, serde_json::to_string_pretty(&updated)?)?;
        info!(
            fields: { "path" => shipments_path.display(), "shipments" => updated.len() },
            "Wrote reconciled shipments"
        );
    }

    Ok(summary)
}
