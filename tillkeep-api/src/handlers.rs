//! Request handlers.
//!
//! Mutating handlers read the `Idempotency-Key` header and go through the
//! mutation gateway; a replayed response carries `Idempotent-Replayed: true`.

use crate::error::{ApiError, ApiResult};
use crate::request::{ApiRequest, ApiResponse, REPLAYED_HEADER};
use crate::state::AppState;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tillkeep_idempotency::{Execution, KeyPolicy};
use tillkeep_log::{debug, info};
use tillkeep_shipping::{
    ReconciliationSummary, ShipmentRepository, ShipmentStatus, ShippingResult, TransitionOutcome,
    TransitionSource,
};
use tillkeep_webhooks::DeliveryEvent;

/// Acknowledgement of an accepted delivery webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub event_id: String,
    pub shipment_id: String,
    pub outcome: TransitionOutcome,
}

/// `POST /sales/{sale_id}/cancel`
pub async fn cancel_sale(state: &AppState, req: &ApiRequest) -> ApiResponse {
    let result = match required_param(req, "sale_id") {
        Ok(sale_id) => state
            .sales
            .cancel_sale(req.idempotency_key(), sale_id)
            .await
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };
    respond(result)
}

/// `POST /refunds/{refund_id}/void`
pub async fn void_refund(state: &AppState, req: &ApiRequest) -> ApiResponse {
    let result = match required_param(req, "refund_id") {
        Ok(refund_id) => state
            .sales
            .void_refund(req.idempotency_key(), refund_id)
            .await
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };
    respond(result)
}

/// `POST /store-credits/{credit_id}/expire`
pub async fn expire_store_credit(state: &AppState, req: &ApiRequest) -> ApiResponse {
    let result = match required_param(req, "credit_id") {
        Ok(credit_id) => state
            .sales
            .expire_store_credit(req.idempotency_key(), credit_id)
            .await
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };
    respond(result)
}

/// `POST /layaways/{layaway_id}/recompute`
pub async fn recompute_layaway(state: &AppState, req: &ApiRequest) -> ApiResponse {
    let result = match required_param(req, "layaway_id") {
        Ok(layaway_id) => state
            .sales
            .recompute_layaway_status(req.idempotency_key(), layaway_id)
            .await
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };
    respond(result)
}

/// `POST /shipments/{shipment_id}/remit`
///
/// Marks a delivered cash-on-delivery shipment as remitted. A retry with the
/// same key replays the original receipt instead of failing on the
/// already-remitted shipment.
pub async fn remit_shipment(state: &AppState, req: &ApiRequest) -> ApiResponse {
    let shipment_id = match required_param(req, "shipment_id") {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    let shipments = state.shipments.as_ref();

    let result = state
        .gateway
        .execute_exclusive(
            req.idempotency_key(),
            KeyPolicy::Required,
            &format!("shipment:{}", shipment_id),
            move || shipments.mark_remitted(shipment_id, Utc::now()),
        )
        .await
        .map_err(ApiError::from);
    respond(result)
}

/// `POST /webhooks/delivery`
///
/// Authenticates the raw body, then applies the event through the shipment
/// state machine. Redeliveries of the same event id replay the first
/// acknowledgement.
pub async fn delivery_webhook(state: &AppState, req: &ApiRequest) -> ApiResponse {
    respond(handle_delivery_webhook(state, req).await)
}

async fn handle_delivery_webhook(
    state: &AppState,
    req: &ApiRequest,
) -> ApiResult<Execution<WebhookAck>> {
    let event = state.webhooks.receive(&req.headers, &req.body)?;
    let reported = ShipmentStatus::from_provider_label(&event.status)?;
    let key = event.idempotency_key();
    let shipments = state.shipments.as_ref();

    let execution = state
        .gateway
        .execute(Some(&key), KeyPolicy::Required, || {
            apply_delivery_event(shipments, &event, reported)
        })
        .await?;

    if execution.replayed {
        debug!(fields: { "event_id" => event.event_id }, "Duplicate webhook delivery");
    }
    Ok(execution)
}

async fn apply_delivery_event(
    shipments: &dyn ShipmentRepository,
    event: &DeliveryEvent,
    reported: ShipmentStatus,
) -> ShippingResult<WebhookAck> {
    let shipment = shipments.find_by_external_id(&event.external_id).await?;
    let outcome = shipments
        .apply_status(
            &shipment.id,
            reported,
            event.occurred_at,
            TransitionSource::Webhook,
        )
        .await?;

    info!(
        fields: {
            "event_id" => event.event_id,
            "shipment_id" => shipment.id,
            "applied" => outcome.is_applied()
        },
        "Delivery webhook processed"
    );

    Ok(WebhookAck {
        event_id: event.event_id.clone(),
        shipment_id: shipment.id,
        outcome,
    })
}

/// `POST /reconciliation/poll`
pub async fn tracking_poll(state: &AppState) -> ApiResponse {
    summary(state.reconciler.run_tracking_poll().await.map_err(ApiError::from))
}

/// `POST /reconciliation/daily`
pub async fn daily_reconciliation(state: &AppState) -> ApiResponse {
    summary(
        state
            .reconciler
            .run_daily_reconciliation()
            .await
            .map_err(ApiError::from),
    )
}

fn required_param<'a>(req: &'a ApiRequest, name: &str) -> ApiResult<&'a str> {
    req.param(name)
        .ok_or_else(|| ApiError::BadRequest(format!("missing path parameter: {}", name)))
}

fn respond<T: Serialize>(result: ApiResult<Execution<T>>) -> ApiResponse {
    match result {
        Ok(execution) if execution.replayed => {
            ApiResponse::ok(&execution.value).with_header(REPLAYED_HEADER, "true")
        }
        Ok(execution) => ApiResponse::ok(&execution.value),
        Err(err) => err.into_response(),
    }
}

fn summary(result: ApiResult<ReconciliationSummary>) -> ApiResponse {
    match result {
        Ok(summary) => ApiResponse::ok(&summary),
        Err(err) => err.into_response(),
    }
}
