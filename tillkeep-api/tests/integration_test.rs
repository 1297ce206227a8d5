//! Integration tests for tillkeep-api

use async_trait::async_trait;
use http::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tillkeep_api::handlers;
use tillkeep_api::*;
use tillkeep_config::CoreConfig;
use tillkeep_idempotency::IDEMPOTENCY_KEY_HEADER;
use tillkeep_sales::{Sale, SaleStatus, SalesLedger};
use tillkeep_shipping::{
    DeliveryProvider, ProviderStatus, Shipment, ShipmentRepository, ShipmentStatus, ShippingError,
    ShippingResult,
};
use tillkeep_webhooks::{DeliveryEvent, headers, sign};

const SECRET: &str = "whsec_test";

struct TableProvider(HashMap<&'static str, &'static str>);

#[async_trait]
impl DeliveryProvider for TableProvider {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn get_status(&self, external_id: &str) -> ShippingResult<ProviderStatus> {
        match self.0.get(external_id) {
            Some(label) => Ok(ProviderStatus::new(external_id, *label)),
            None => Err(ShippingError::ProviderQueryFailed {
                external_id: external_id.to_string(),
                message: "timed out".to_string(),
            }),
        }
    }
}

async fn state() -> AppState {
    let config = CoreConfig {
        webhook_secret: Some(SECRET.to_string()),
        ..CoreConfig::default()
    };
    let provider = TableProvider(HashMap::from([("T1", "in_transit"), ("T3", "delivered")]));
    AppState::in_memory(&config, Arc::new(provider)).await.unwrap()
}

fn webhook(event: &DeliveryEvent, secret: &str) -> ApiRequest {
    let body = event.to_bytes().unwrap();
    let signature = sign(&body, secret).unwrap();
    ApiRequest::post("/webhooks/delivery")
        .with_header(headers::SIGNATURE, signature)
        .with_body(body)
}

fn remit(shipment_id: &str, key: &str) -> ApiRequest {
    ApiRequest::post(format!("/shipments/{}/remit", shipment_id))
        .with_param("shipment_id", shipment_id)
        .with_header(IDEMPOTENCY_KEY_HEADER, key)
}

#[tokio::test]
async fn test_cancel_without_key_is_rejected() {
    let state = state().await;
    state.sales.ledger().put_sale(Sale::new("S1", Decimal::ONE)).await.unwrap();

    let req = ApiRequest::post("/sales/S1/cancel").with_param("sale_id", "S1");
    let resp = handlers::cancel_sale(&state, &req).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.body_json::<Value>().unwrap(),
        json!({ "error": "Missing Idempotency-Key" })
    );
}

#[tokio::test]
async fn test_cancel_retry_replays_body() {
    let state = state().await;
    state.sales.ledger().put_sale(Sale::new("S1", Decimal::ONE)).await.unwrap();

    let req = ApiRequest::post("/sales/S1/cancel")
        .with_param("sale_id", "S1")
        .with_header(IDEMPOTENCY_KEY_HEADER, "abc");

    let first = handlers::cancel_sale(&state, &req).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body_json::<Value>().unwrap()["status"], "CANCELLED");
    assert!(!first.is_replayed());

    let second = handlers::cancel_sale(&state, &req).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body, first.body);
    assert!(second.is_replayed());
}

#[tokio::test]
async fn test_key_reused_on_another_sale_is_not_replayed() {
    let state = state().await;
    for id in ["S1", "S2"] {
        state.sales.ledger().put_sale(Sale::new(id, Decimal::ONE)).await.unwrap();
    }

    let cancel = |id: &str| {
        ApiRequest::post(format!("/sales/{}/cancel", id))
            .with_param("sale_id", id)
            .with_header(IDEMPOTENCY_KEY_HEADER, "abc")
    };

    let first = handlers::cancel_sale(&state, &cancel("S1")).await;
    let second = handlers::cancel_sale(&state, &cancel("S2")).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert!(!second.is_replayed());
    assert_eq!(second.body_json::<Value>().unwrap()["sale_id"], "S2");
    assert_eq!(
        state.sales.ledger().get_sale("S2").await.unwrap().status,
        SaleStatus::Cancelled
    );
}

#[tokio::test]
async fn test_client_key_cannot_claim_webhook_event() {
    let state = state().await;
    state.sales.ledger().put_sale(Sale::new("S1", Decimal::ONE)).await.unwrap();
    state
        .shipments
        .insert(Shipment::new("SH1", "T9"))
        .await
        .unwrap();

    let req = ApiRequest::post("/sales/S1/cancel")
        .with_param("sale_id", "S1")
        .with_header(IDEMPOTENCY_KEY_HEADER, "webhook:evt_1");
    let resp = handlers::cancel_sale(&state, &req).await;
    assert_eq!(resp.status, StatusCode::OK);

    let event = DeliveryEvent::new("T9", "delivered").with_event_id("evt_1");
    let resp = handlers::delivery_webhook(&state, &webhook(&event, SECRET)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(!resp.is_replayed());
    assert_eq!(
        state.shipments.get("SH1").await.unwrap().status,
        ShipmentStatus::Delivered
    );
}

#[tokio::test]
async fn test_unknown_sale_is_404() {
    let state = state().await;
    let req = ApiRequest::post("/sales/S9/cancel")
        .with_param("sale_id", "S9")
        .with_header(IDEMPOTENCY_KEY_HEADER, "k");

    let resp = handlers::cancel_sale(&state, &req).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_then_remit_exactly_once() {
    let state = state().await;
    state
        .shipments
        .insert(Shipment::new("SH1", "T1").cash_on_delivery())
        .await
        .unwrap();

    let event = DeliveryEvent::new("T1", "delivered").with_event_id("evt_1");
    let resp = handlers::delivery_webhook(&state, &webhook(&event, SECRET)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let ack: WebhookAck = resp.body_json().unwrap();
    assert_eq!(ack.shipment_id, "SH1");
    assert!(ack.outcome.is_applied());

    let first = handlers::remit_shipment(&state, &remit("SH1", "remit-1")).await;
    let second = handlers::remit_shipment(&state, &remit("SH1", "remit-1")).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.body, second.body);
    assert!(second.is_replayed());
    assert!(state.shipments.get("SH1").await.unwrap().remitted);

    // A fresh key runs the operation again, which the state machine refuses.
    let other = handlers::remit_shipment(&state, &remit("SH1", "remit-2")).await;
    assert_eq!(other.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_remit_before_delivery_conflicts() {
    let state = state().await;
    state
        .shipments
        .insert(Shipment::new("SH1", "T1").cash_on_delivery())
        .await
        .unwrap();

    let resp = handlers::remit_shipment(&state, &remit("SH1", "remit-1")).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert!(!state.shipments.get("SH1").await.unwrap().remitted);
}

#[tokio::test]
async fn test_webhook_bad_signature_is_rejected() {
    let state = state().await;
    state.shipments.insert(Shipment::new("SH1", "T1")).await.unwrap();

    let event = DeliveryEvent::new("T1", "delivered");
    let resp = handlers::delivery_webhook(&state, &webhook(&event, "wrong-secret")).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body_json::<Value>().unwrap()["error"], "INVALID_SIGNATURE");
    assert_eq!(
        state.shipments.get("SH1").await.unwrap().status,
        ShipmentStatus::Created
    );
}

#[tokio::test]
async fn test_webhook_without_configured_secret_fails_closed() {
    let config = CoreConfig::default();
    let state = AppState::in_memory(&config, Arc::new(TableProvider(HashMap::new())))
        .await
        .unwrap();

    let event = DeliveryEvent::new("T1", "delivered");
    let resp = handlers::delivery_webhook(&state, &webhook(&event, SECRET)).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_redelivery_and_late_event() {
    let state = state().await;
    state.shipments.insert(Shipment::new("SH1", "T1")).await.unwrap();

    let delivered = DeliveryEvent::new("T1", "delivered").with_event_id("evt_2");
    handlers::delivery_webhook(&state, &webhook(&delivered, SECRET)).await;
    let again = handlers::delivery_webhook(&state, &webhook(&delivered, SECRET)).await;
    assert_eq!(again.status, StatusCode::OK);
    assert!(again.is_replayed());

    let late = DeliveryEvent::new("T1", "out_for_delivery").with_event_id("evt_1");
    let resp = handlers::delivery_webhook(&state, &webhook(&late, SECRET)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let ack: WebhookAck = resp.body_json().unwrap();
    assert!(ack.outcome.is_stale());

    let shipment = state.shipments.get("SH1").await.unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Delivered);
    assert_eq!(shipment.history.len(), 2);
}

#[tokio::test]
async fn test_webhook_unknown_status_is_422() {
    let state = state().await;
    state.shipments.insert(Shipment::new("SH1", "T1")).await.unwrap();

    let event = DeliveryEvent::new("T1", "teleported");
    let resp = handlers::delivery_webhook(&state, &webhook(&event, SECRET)).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_tracking_poll_isolates_failures() {
    let state = state().await;
    for (id, ext) in [("SH1", "T1"), ("SH2", "T2"), ("SH3", "T3")] {
        state.shipments.insert(Shipment::new(id, ext)).await.unwrap();
    }

    let resp = handlers::tracking_poll(&state).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body: Value = resp.body_json().unwrap();
    assert_eq!(body["examined"], 3);
    assert_eq!(body["changed"], 2);
    assert_eq!(body["failed"], 1);

    let daily = handlers::daily_reconciliation(&state).await;
    let body: Value = daily.body_json().unwrap();
    assert_eq!(body["changed"], 0);
}
