//! Integration tests for common tillkeep workflows.
//!
//! These walk the request paths an operator actually exercises, across crate
//! boundaries, through the api handlers.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tillkeep_api::{ApiRequest, AppState, REPLAYED_HEADER, handlers};
use tillkeep_config::CoreConfig;
use tillkeep_idempotency::{IDEMPOTENCY_KEY_HEADER, canonical_json, derive_id, hash};
use tillkeep_sales::{Sale, SaleStatus, SalesLedger};
use tillkeep_shipping::{
    DeliveryProvider, ProviderStatus, Shipment, ShipmentRepository, ShipmentStatus, ShippingError,
    ShippingResult,
};
use tillkeep_webhooks::{DeliveryEvent, headers, sign};

const SECRET: &str = "whsec_workflows";

struct FixedProvider(HashMap<&'static str, &'static str>);

#[async_trait]
impl DeliveryProvider for FixedProvider {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn get_status(&self, external_id: &str) -> ShippingResult<ProviderStatus> {
        match self.0.get(external_id) {
            Some(label) => Ok(ProviderStatus::new(external_id, *label)),
            None => Err(ShippingError::ProviderQueryFailed {
                external_id: external_id.to_string(),
                message: "connection reset".to_string(),
            }),
        }
    }
}

async fn app(secret: Option<&str>) -> AppState {
    let config = CoreConfig {
        webhook_secret: secret.map(str::to_string),
        ..CoreConfig::default()
    };
    let provider = FixedProvider(HashMap::from([("T1", "in_transit"), ("T3", "delivered")]));
    AppState::in_memory(&config, Arc::new(provider)).await.unwrap()
}

fn signed(event: &DeliveryEvent) -> ApiRequest {
    let body = event.to_bytes().unwrap();
    ApiRequest::post("/webhooks/delivery")
        .with_header(headers::SIGNATURE, sign(&body, SECRET).unwrap())
        .with_body(body)
}

// =============================================================================
// Idempotent Sale Mutations
// =============================================================================

#[tokio::test]
async fn test_cancel_sale_retry_returns_first_response() {
    let state = app(Some(SECRET)).await;
    state
        .sales
        .ledger()
        .put_sale(Sale::new("S1", Decimal::new(4999, 2)))
        .await
        .unwrap();

    let req = ApiRequest::post("/sales/S1/cancel")
        .with_param("sale_id", "S1")
        .with_header(IDEMPOTENCY_KEY_HEADER, "abc");

    let first = handlers::cancel_sale(&state, &req).await;
    assert_eq!(first.status.as_u16(), 200);
    assert!(!first.is_replayed());

    let second = handlers::cancel_sale(&state, &req).await;
    assert_eq!(second.status.as_u16(), 200);
    assert_eq!(second.headers.get(REPLAYED_HEADER).map(String::as_str), Some("true"));
    assert_eq!(first.body, second.body);

    let sale = state.sales.ledger().get_sale("S1").await.unwrap();
    assert_eq!(sale.status, SaleStatus::Cancelled);
}

#[tokio::test]
async fn test_mutation_without_key_changes_nothing() {
    let state = app(Some(SECRET)).await;
    state
        .sales
        .ledger()
        .put_sale(Sale::new("S1", Decimal::ONE))
        .await
        .unwrap();

    let req = ApiRequest::post("/sales/S1/cancel").with_param("sale_id", "S1");
    let resp = handlers::cancel_sale(&state, &req).await;

    assert_eq!(resp.status.as_u16(), 400);
    assert_eq!(
        resp.body_json::<Value>().unwrap(),
        json!({ "error": "Missing Idempotency-Key" })
    );
    let sale = state.sales.ledger().get_sale("S1").await.unwrap();
    assert_eq!(sale.status, SaleStatus::Completed);
}

// =============================================================================
// Delivery Lifecycle
// =============================================================================

#[tokio::test]
async fn test_webhook_delivery_then_remit_exactly_once() {
    let state = app(Some(SECRET)).await;
    state
        .shipments
        .insert(Shipment::new("SH1", "T9").cash_on_delivery())
        .await
        .unwrap();

    let event = DeliveryEvent::new("T9", "delivered").with_event_id("evt_1");
    let resp = handlers::delivery_webhook(&state, &signed(&event)).await;
    assert_eq!(resp.status.as_u16(), 200);

    let remit = |key: &str| {
        ApiRequest::post("/shipments/SH1/remit")
            .with_param("shipment_id", "SH1")
            .with_header(IDEMPOTENCY_KEY_HEADER, key)
    };

    let first = handlers::remit_shipment(&state, &remit("remit-1")).await;
    let retry = handlers::remit_shipment(&state, &remit("remit-1")).await;
    let other = handlers::remit_shipment(&state, &remit("remit-2")).await;

    assert_eq!(first.status.as_u16(), 200);
    assert_eq!(retry.status.as_u16(), 200);
    assert!(retry.is_replayed());
    assert_eq!(first.body, retry.body);
    assert_eq!(other.status.as_u16(), 409);

    let shipment = state.shipments.get("SH1").await.unwrap();
    assert!(shipment.remitted);
    assert_eq!(shipment.status, ShipmentStatus::Delivered);
}

#[tokio::test]
async fn test_unsigned_webhook_fails_closed() {
    let state = app(None).await;
    state
        .shipments
        .insert(Shipment::new("SH1", "T9"))
        .await
        .unwrap();

    let event = DeliveryEvent::new("T9", "delivered");
    let resp = handlers::delivery_webhook(&state, &signed(&event)).await;

    assert_eq!(resp.status.as_u16(), 401);
    assert_eq!(resp.body_json::<Value>().unwrap()["error"], "INVALID_SIGNATURE");
    let shipment = state.shipments.get("SH1").await.unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Created);
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_poll_isolates_provider_failures() {
    let state = app(Some(SECRET)).await;
    for (id, external_id) in [("SH1", "T1"), ("SH2", "T2"), ("SH3", "T3")] {
        state
            .shipments
            .insert(Shipment::new(id, external_id))
            .await
            .unwrap();
    }

    let resp = handlers::tracking_poll(&state).await;
    assert_eq!(resp.status.as_u16(), 200);

    let summary = resp.body_json::<Value>().unwrap();
    assert_eq!(summary["examined"], 3);
    assert_eq!(summary["changed"], 2);
    assert_eq!(summary["failed"], 1);

    assert_eq!(
        state.shipments.get("SH2").await.unwrap().status,
        ShipmentStatus::Created
    );
    assert_eq!(
        state.shipments.get("SH3").await.unwrap().status,
        ShipmentStatus::Delivered
    );
}

// =============================================================================
// Fingerprints
// =============================================================================

#[test]
fn test_fingerprint_ignores_key_order() {
    let a = canonical_json(&json!({ "items": [{ "sku": "A", "qty": 2 }], "customer": "C1" }));
    let b = canonical_json(&json!({ "customer": "C1", "items": [{ "qty": 2, "sku": "A" }] }));

    assert_eq!(a, b);
    assert_eq!(hash(&a), hash(&b));
    assert_eq!(derive_id("ORD", &hash(&a)), derive_id("ORD", &hash(&b)));
}
