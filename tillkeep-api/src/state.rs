//! Shared application state.

use std::sync::Arc;
use tillkeep_config::{CoreConfig, InMemorySettingsStore, SettingsService};
use tillkeep_idempotency::{InMemoryIdempotencyStore, MutationGateway};
use tillkeep_log::info;
use tillkeep_sales::{InMemorySalesLedger, SalesService};
use tillkeep_shipping::{
    DeliveryProvider, InMemoryShipmentRepository, Reconciler, ReconcilerConfig, ShipmentRepository,
};
use tillkeep_webhooks::DeliveryWebhookReceiver;

use crate::error::{ApiError, ApiResult};

/// Everything the handlers need, built once at start-up and cloned into
/// each request.
#[derive(Clone)]
pub struct AppState {
    pub gateway: MutationGateway,
    pub sales: Arc<SalesService>,
    pub shipments: Arc<dyn ShipmentRepository>,
    pub reconciler: Arc<Reconciler>,
    pub webhooks: Arc<DeliveryWebhookReceiver>,
    pub settings: Arc<SettingsService>,
}

impl AppState {
    /// Wire the state over in-memory stores, taking the webhook secret and
    /// reconciliation tuning from `config`.
    pub async fn in_memory(
        config: &CoreConfig,
        provider: Arc<dyn DeliveryProvider>,
    ) -> ApiResult<Self> {
        let settings = SettingsService::load(Arc::new(InMemorySettingsStore::new()))
            .await
            .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;
        let settings = Arc::new(settings);

        let gateway = MutationGateway::new(Arc::new(InMemoryIdempotencyStore::new()));
        let shipments: Arc<dyn ShipmentRepository> = Arc::new(InMemoryShipmentRepository::new());

        let sales = SalesService::new(
            Arc::new(InMemorySalesLedger::new()),
            gateway.clone(),
            settings.clone(),
        );
        let reconciler = Reconciler::with_config(
            shipments.clone(),
            provider,
            ReconcilerConfig::from(config),
        );
        let webhooks = DeliveryWebhookReceiver::with_secret(config.webhook_secret.clone());

        info!(
            fields: { "webhook_secret_configured" => webhooks.authenticator().is_configured() },
            "Application state ready"
        );

        Ok(Self {
            gateway,
            sales: Arc::new(sales),
            shipments,
            reconciler: Arc::new(reconciler),
            webhooks: Arc::new(webhooks),
            settings,
        })
    }
}
