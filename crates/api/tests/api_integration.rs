//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::PaymentProcessor;
use metrics_exporter_prometheus::PrometheusHandle;
use notify::{Dispatcher, DispatcherConfig, RecordingNotifier};
use payments::{InMemoryPaymentGateway, PaymentGateways};
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: Router,
    gateway: InMemoryPaymentGateway,
    notifier: RecordingNotifier,
}

fn setup() -> TestApp {
    let store = InMemoryStore::new();
    let gateway = InMemoryPaymentGateway::new(PaymentProcessor::Paystack);
    let gateways = PaymentGateways::new().with(Arc::new(gateway.clone()));

    let notifier = RecordingNotifier::new();
    let (dispatcher, _worker) =
        Dispatcher::spawn(Arc::new(notifier.clone()), DispatcherConfig::default());

    let state = Arc::new(AppState::new(store, gateways, dispatcher));
    TestApp {
        app: api::create_app(state, get_metrics_handle()),
        gateway,
        notifier,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        admin: bool,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if admin {
            request = request
                .header("x-user-id", "admin-1")
                .header("x-user-role", "admin");
        }
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn create_event(&self, total_seats: u32) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/admin/events",
                true,
                Some(json!({
                    "title": "Off-Grid: Digital Detox",
                    "starts_at": "2026-03-14T19:00:00Z",
                    "venue": "The Silent Space",
                    "total_seats": total_seats
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_item(&self, stock: u32) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/admin/merch",
                true,
                Some(json!({
                    "name": "Ceramic Mug",
                    "price": 2500,
                    "stock": stock,
                    "category": "drinkware"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }
}

fn reservation(event_id: &str, kind: &str, seats: u32) -> Value {
    json!({
        "event_id": event_id,
        "name": "Ada Obi",
        "email": "ada@offgrid.com",
        "phone": "+234 803 123 4567",
        "type": kind,
        "seats": seats
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, body) = app.send("GET", "/health", false, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["processors"], json!(["paystack"]));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

// ============================================================================
// Reservations
// ============================================================================

#[tokio::test]
async fn test_table_reservation_and_fully_booked() {
    let app = setup();
    let event_id = app.create_event(2).await;

    let (status, body) = app
        .send("POST", "/reservations", false, Some(reservation(&event_id, "table", 2)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["seats"], 2);

    let (status, body) = app
        .send("POST", "/reservations", false, Some(reservation(&event_id, "table", 1)))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "fully_booked");

    let (_, event) = app.send("GET", &format!("/events/{event_id}"), false, None).await;
    assert_eq!(event["seats_taken"], 2);
    assert_eq!(event["seats_available"], 0);
    assert_eq!(event["status"], "sold_out");
}

#[tokio::test]
async fn test_ticket_on_full_event_succeeds() {
    let app = setup();
    let event_id = app.create_event(1).await;
    app.send("POST", "/reservations", false, Some(reservation(&event_id, "table", 1)))
        .await;

    let (status, body) = app
        .send("POST", "/reservations", false, Some(reservation(&event_id, "ticket", 0)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["seats"], 1);

    let sent = app.notifier.wait_for(2, Duration::from_secs(2)).await;
    assert_eq!(sent.len(), 2);
}

#[tokio::test]
async fn test_reservation_validation_errors() {
    let app = setup();
    let event_id = app.create_event(5).await;

    let mut bad_email = reservation(&event_id, "table", 1);
    bad_email["email"] = json!("ada.offgrid.com");
    let (status, body) = app.send("POST", "/reservations", false, Some(bad_email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app
        .send("POST", "/reservations", false, Some(json!({ "event_id": event_id })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_reservation_for_unknown_event() {
    let app = setup();
    let (status, body) = app
        .send(
            "POST",
            "/reservations",
            false,
            Some(reservation("7f3c8a4e-2b1d-4c5e-9f60-1a2b3c4d5e6f", "ticket", 1)),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = setup();
    let (status, body) = app
        .send(
            "POST",
            "/admin/merch",
            false,
            Some(json!({ "name": "Mug", "price": 100, "stock": 1, "category": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn test_admin_cannot_shrink_ceiling_below_taken() {
    let app = setup();
    let event_id = app.create_event(5).await;
    app.send("POST", "/reservations", false, Some(reservation(&event_id, "table", 3)))
        .await;

    let uri = format!("/admin/events/{event_id}");
    let (status, body) = app
        .send("PATCH", &uri, true, Some(json!({ "total_seats": 2 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app
        .send("PATCH", &uri, true, Some(json!({ "total_seats": 8 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_seats"], 8);
    assert_eq!(body["seats_taken"], 3);

    let (status, list) = app
        .send("GET", &format!("/admin/events/{event_id}/reservations"), true, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_restock() {
    let app = setup();
    let item_id = app.create_item(2).await;

    let (status, body) = app
        .send(
            "PATCH",
            &format!("/admin/merch/{item_id}"),
            true,
            Some(json!({ "restock": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 7);
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let app = setup();
    let (status, body) = app.send("GET", "/events/not-a-uuid", false, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_and_idempotent_verify() {
    let app = setup();
    let item_id = app.create_item(10).await;

    let (status, session) = app
        .send(
            "POST",
            "/checkout/paystack/initialize",
            false,
            Some(json!({
                "email": "ada@offgrid.com",
                "name": "Ada Obi",
                "items": [{ "id": item_id, "quantity": 2 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["processor"], "paystack");
    let reference = session["reference"].as_str().unwrap().to_string();
    assert!(session["redirect_url"].is_string());

    let verify = json!({ "reference": reference });
    let (status, first) = app
        .send("POST", "/checkout/paystack/verify", false, Some(verify.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "completed");

    let (status, replay) = app
        .send("POST", "/checkout/paystack/verify", false, Some(verify))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["status"], "already_processed");
    assert_eq!(replay["order_id"], first["order_id"]);

    let order_id = first["order_id"].as_str().unwrap();
    let (status, order) = app.send("GET", &format!("/orders/{order_id}"), false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["total_amount"], 5000);
    assert_eq!(order["status"], "completed");

    let (_, item) = app.send("GET", &format!("/merch/{item_id}"), false, None).await;
    assert_eq!(item["stock"], 8);
}

#[tokio::test]
async fn test_checkout_out_of_stock() {
    let app = setup();
    let item_id = app.create_item(1).await;

    let (status, body) = app
        .send(
            "POST",
            "/checkout/paystack/initialize",
            false,
            Some(json!({
                "email": "ada@offgrid.com",
                "items": [{ "id": item_id, "quantity": 3 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "out_of_stock");
}

#[tokio::test]
async fn test_verify_failure_is_payment_required() {
    let app = setup();
    let (status, body) = app
        .send(
            "POST",
            "/checkout/paystack/verify",
            false,
            Some(json!({ "reference": "missing-ref" })),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "verification_failed");

    app.gateway.set_fail_on_verify(true).await;
    let (status, _) = app
        .send(
            "POST",
            "/checkout/paystack/verify",
            false,
            Some(json!({ "reference": "any-ref" })),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_unknown_and_unconfigured_processors() {
    let app = setup();
    let body = json!({ "reference": "ref-1" });

    let (status, error) = app
        .send("POST", "/checkout/paypal/verify", false, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "validation_error");

    let (status, error) = app
        .send("POST", "/checkout/stripe/verify", false, Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "validation_error");
}
