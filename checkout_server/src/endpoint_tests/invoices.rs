use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use checkout_engine::{
    db_types::{Invoice, InvoiceStatus},
    InvoiceError,
};
use cpg_common::{Money, Secret};
use serde_json::json;

use super::{
    helpers::{invoice, invoice_api, send, with_add_ons},
    mocks::MockStore,
};
use crate::{
    config::ServerOptions,
    helpers::room_token,
    routes::{CreateInvoiceRoute, InvoiceByIdRoute, SetAddOnsRoute, UpdateInvoiceStatusRoute},
};

fn new_invoice_body() -> serde_json::Value {
    json!({
        "customer": { "name": "Alice", "email": "alice@example.com" },
        "lineItems": [{ "productRef": "dog-1", "quantity": 1, "unitPrice": 1200 }]
    })
}

fn options(secret: Option<&str>) -> ServerOptions {
    ServerOptions {
        poll_interval: Duration::from_millis(2000),
        room_token_secret: secret.map(|s| Secret::new(s.to_string())),
    }
}

fn configure(store: MockStore, options: ServerOptions) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(invoice_api(store)).app_data(web::Data::new(options)).service(
            web::scope("/api")
                .service(CreateInvoiceRoute::<MockStore>::new())
                .service(InvoiceByIdRoute::<MockStore>::new())
                .service(UpdateInvoiceStatusRoute::<MockStore>::new())
                .service(SetAddOnsRoute::<MockStore>::new()),
        );
    }
}

#[actix_web::test]
async fn create_invoice() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_insert_invoice().times(1).returning(|new| {
        assert_eq!(new.total(), Some(Money::from(1200)));
        Ok(invoice("inv-1", InvoiceStatus::Pending))
    });
    let req = TestRequest::post().uri("/api/invoices").set_json(new_invoice_body());
    let reply = send(req, configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let body = reply.json();
    assert_eq!(body["invoice"]["id"], "inv-1");
    assert_eq!(body["invoice"]["status"], "pending");
    assert_eq!(body["invoice"]["totalAmount"], 1200);
    assert_eq!(body["pollIntervalMs"], 2000);
    assert!(body.get("roomToken").is_none());
}

#[actix_web::test]
async fn create_invoice_issues_room_token() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_insert_invoice().returning(|_| Ok(invoice("inv-1", InvoiceStatus::Pending)));
    let req = TestRequest::post().uri("/api/invoices").set_json(new_invoice_body());
    let reply = send(req, configure(store, options(Some("room-secret")))).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let expected = room_token("room-secret", &"inv-1".into()).unwrap();
    assert_eq!(reply.json()["roomToken"], expected);
}

#[actix_web::test]
async fn create_invoice_without_items() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_insert_invoice().never();
    let mut body = new_invoice_body();
    body["lineItems"] = json!([]);
    let req = TestRequest::post().uri("/api/invoices").set_json(body);
    let reply = send(req, configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error(), "Invalid request. An invoice needs at least one line item");
}

#[actix_web::test]
async fn malformed_body() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post()
        .uri("/api/invoices")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"customer\": 42}");
    let reply = send(req, configure(MockStore::new(), options(None))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.error().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn fetch_invoice() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store
        .expect_fetch_invoice()
        .withf(|id| id.as_str() == "inv-1")
        .returning(|_| Ok(Some(invoice("inv-1", InvoiceStatus::Paid))));
    let reply = send(TestRequest::get().uri("/api/invoices/inv-1"), configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::OK);
    let invoice: Invoice = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.payment_ref.as_deref(), Some("pi_123"));
}

#[actix_web::test]
async fn fetch_missing_invoice() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_invoice().returning(|_| Ok(None));
    let reply = send(TestRequest::get().uri("/api/invoices/nope"), configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.error(), "The data was not found. The requested invoice nope does not exist");
}

#[actix_web::test]
async fn confirm_payment() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store
        .expect_update_status_if_pending()
        .withf(|id, status, payment_ref| {
            id.as_str() == "inv-1" && *status == InvoiceStatus::Paid && payment_ref.as_deref() == Some("pi_123")
        })
        .times(1)
        .returning(|_, _, _| Ok(Some(invoice("inv-1", InvoiceStatus::Paid))));
    let req = TestRequest::patch()
        .uri("/api/invoices/inv-1")
        .set_json(json!({ "event": "paymentConfirmed", "paymentRef": "pi_123" }));
    let reply = send(req, configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "paid");
}

#[actix_web::test]
async fn repeated_confirmation_returns_the_stored_invoice() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_update_status_if_pending().returning(|_, _, _| Ok(None));
    store.expect_fetch_invoice().returning(|_| Ok(Some(invoice("inv-1", InvoiceStatus::Paid))));
    let req = TestRequest::patch()
        .uri("/api/invoices/inv-1")
        .set_json(json!({ "event": "paymentConfirmed", "paymentRef": "pi_other" }));
    let reply = send(req, configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["paymentRef"], "pi_123");
}

#[actix_web::test]
async fn cancelling_a_paid_invoice_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_update_status_if_pending().returning(|_, _, _| Ok(None));
    store.expect_fetch_invoice().returning(|_| Ok(Some(invoice("inv-1", InvoiceStatus::Paid))));
    let req = TestRequest::patch().uri("/api/invoices/inv-1").set_json(json!({ "event": "cancel" }));
    let reply = send(req, configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.error(), "The invoice is already paid and cannot become cancelled");
}

#[actix_web::test]
async fn confirmation_without_reference() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_update_status_if_pending().never();
    let req = TestRequest::patch()
        .uri("/api/invoices/inv-1")
        .set_json(json!({ "event": "paymentConfirmed", "paymentRef": "  " }));
    let reply = send(req, configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_event() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::patch().uri("/api/invoices/inv-1").set_json(json!({ "event": "refund" }));
    let reply = send(req, configure(MockStore::new(), options(None))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn store_outage_is_retryable() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store
        .expect_update_status_if_pending()
        .returning(|_, _, _| Err(InvoiceError::TransientIo("database is locked".into())));
    let req = TestRequest::patch().uri("/api/invoices/inv-1").set_json(json!({ "event": "cancel" }));
    let reply = send(req, configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.retry_after.as_deref(), Some("1"));
}

#[actix_web::test]
async fn add_ons_raise_the_total() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store
        .expect_set_add_ons_if_pending()
        .withf(|_, add_ons| add_ons.quantity == 2 && add_ons.unit_price == Money::from(100))
        .returning(|_, _| Ok(Some(with_add_ons(invoice("inv-1", InvoiceStatus::Pending), 2))));
    let req = TestRequest::patch().uri("/api/invoices/inv-1/add-ons").set_json(json!({ "quantity": 2, "unitPrice": 100 }));
    let reply = send(req, configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["totalAmount"], 1400);
}

#[actix_web::test]
async fn add_ons_on_a_paid_invoice_are_rejected() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_set_add_ons_if_pending().returning(|_, _| Ok(None));
    store.expect_fetch_invoice().returning(|_| Ok(Some(invoice("inv-1", InvoiceStatus::Paid))));
    let req = TestRequest::patch().uri("/api/invoices/inv-1/add-ons").set_json(json!({ "quantity": 2, "unitPrice": 100 }));
    let reply = send(req, configure(store, options(None))).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.error(), "The add-ons for invoice inv-1 can no longer be changed");
}
