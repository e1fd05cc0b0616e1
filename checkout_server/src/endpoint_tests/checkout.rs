use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use checkout_engine::{
    db_types::{Invoice, InvoiceId, InvoiceStatus},
    events::EventProducers,
    CheckoutApi,
    GatewayError,
    InvoiceFlowApi,
    PaymentGateway,
    PaymentOutcome,
    SessionId,
    SessionState,
};
use cpg_common::Money;
use serde_json::json;

use super::{
    helpers::{invoice, send, with_add_ons},
    mocks::{MockGateway, MockStore},
};
use crate::routes::{CheckoutSessionRoute, VerifyPaymentRoute};

const TIMEOUT: Duration = Duration::from_millis(250);

fn configure<G: PaymentGateway + 'static>(store: MockStore, gateway: G) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let invoices = InvoiceFlowApi::new(store, EventProducers::default());
        let api = CheckoutApi::new(invoices, gateway, TIMEOUT, Money::from(100));
        cfg.app_data(web::Data::new(api)).service(
            web::scope("/api")
                .service(CheckoutSessionRoute::<MockStore, G>::new())
                .service(VerifyPaymentRoute::<MockStore, G>::new()),
        );
    }
}

fn outcome(session: &str, invoice_id: &str, state: SessionState) -> PaymentOutcome {
    PaymentOutcome { session_id: SessionId::from(session), invoice_id: InvoiceId::from(invoice_id), state }
}

/// A provider that never answers.
#[derive(Clone)]
struct StalledGateway;

impl PaymentGateway for StalledGateway {
    async fn create_session(&self, _invoice: &Invoice) -> Result<SessionId, GatewayError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(SessionId::from("too_late"))
    }

    async fn retrieve_outcome(&self, session_id: &SessionId) -> Result<PaymentOutcome, GatewayError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(GatewayError::SessionNotFound(session_id.clone()))
    }
}

#[actix_web::test]
async fn checkout_with_add_ons() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_invoice().returning(|_| Ok(Some(invoice("inv-1", InvoiceStatus::Pending))));
    store
        .expect_set_add_ons_if_pending()
        .withf(|_, add_ons| add_ons.quantity == 2 && add_ons.unit_price == Money::from(100))
        .times(1)
        .returning(|_, _| Ok(Some(with_add_ons(invoice("inv-1", InvoiceStatus::Pending), 2))));
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_session()
        .withf(|invoice| invoice.total_amount == Money::from(1400))
        .returning(|_| Ok(SessionId::from("sess_1")));
    let req = TestRequest::post().uri("/api/checkout-session").set_json(json!({ "invoiceId": "inv-1", "addOnQuantity": 2 }));
    let reply = send(req, configure(store, gateway)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({ "sessionId": "sess_1" }));
}

#[actix_web::test]
async fn checkout_without_add_ons() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_invoice().returning(|_| Ok(Some(invoice("inv-1", InvoiceStatus::Pending))));
    store.expect_set_add_ons_if_pending().never();
    let mut gateway = MockGateway::new();
    gateway.expect_create_session().returning(|_| Ok(SessionId::from("sess_1")));
    let req = TestRequest::post().uri("/api/checkout-session").set_json(json!({ "invoiceId": "inv-1" }));
    let reply = send(req, configure(store, gateway)).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[actix_web::test]
async fn checkout_of_a_cancelled_invoice() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_invoice().returning(|_| Ok(Some(invoice("inv-1", InvoiceStatus::Cancelled))));
    let mut gateway = MockGateway::new();
    gateway.expect_create_session().never();
    let req = TestRequest::post().uri("/api/checkout-session").set_json(json!({ "invoiceId": "inv-1" }));
    let reply = send(req, configure(store, gateway)).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn stalled_provider_times_out() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_invoice().returning(|_| Ok(Some(invoice("inv-1", InvoiceStatus::Pending))));
    let req = TestRequest::post().uri("/api/checkout-session").set_json(json!({ "invoiceId": "inv-1" }));
    let reply = send(req, configure(store, StalledGateway)).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.retry_after.as_deref(), Some("1"));
    assert_eq!(reply.error(), "The payment gateway did not respond within 250ms");
}

#[actix_web::test]
async fn verify_paid_session() {
    let _ = env_logger::try_init().ok();
    let mut gateway = MockGateway::new();
    gateway
        .expect_retrieve_outcome()
        .returning(|_| Ok(outcome("sess_1", "inv-1", SessionState::Paid { external_ref: "pi_123".into() })));
    let mut store = MockStore::new();
    store
        .expect_update_status_if_pending()
        .withf(|id, status, payment_ref| {
            id.as_str() == "inv-1" && *status == InvoiceStatus::Paid && payment_ref.as_deref() == Some("pi_123")
        })
        .times(1)
        .returning(|_, _, _| Ok(Some(invoice("inv-1", InvoiceStatus::Paid))));
    let req = TestRequest::post().uri("/api/verify-payment").set_json(json!({ "sessionId": "sess_1" }));
    let reply = send(req, configure(store, gateway)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "paid");
}

#[actix_web::test]
async fn verify_failed_session_cancels() {
    let _ = env_logger::try_init().ok();
    let mut gateway = MockGateway::new();
    gateway.expect_retrieve_outcome().returning(|_| Ok(outcome("sess_1", "inv-1", SessionState::Failed)));
    let mut store = MockStore::new();
    store
        .expect_update_status_if_pending()
        .withf(|_, status, _| *status == InvoiceStatus::Cancelled)
        .returning(|_, _, _| Ok(Some(invoice("inv-1", InvoiceStatus::Cancelled))));
    let req = TestRequest::post().uri("/api/verify-payment").set_json(json!({ "sessionId": "sess_1" }));
    let reply = send(req, configure(store, gateway)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "cancelled");
}

#[actix_web::test]
async fn verify_open_session() {
    let _ = env_logger::try_init().ok();
    let mut gateway = MockGateway::new();
    gateway.expect_retrieve_outcome().returning(|_| Ok(outcome("sess_1", "inv-1", SessionState::Open)));
    let mut store = MockStore::new();
    store.expect_update_status_if_pending().never();
    let req = TestRequest::post().uri("/api/verify-payment").set_json(json!({ "sessionId": "sess_1" }));
    let reply = send(req, configure(store, gateway)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error(), "Invalid request. Payment not completed");
}

#[actix_web::test]
async fn verify_unknown_session() {
    let _ = env_logger::try_init().ok();
    let mut gateway = MockGateway::new();
    gateway.expect_retrieve_outcome().returning(|id| Err(GatewayError::SessionNotFound(id.clone())));
    let req = TestRequest::post().uri("/api/verify-payment").set_json(json!({ "sessionId": "sess_x" }));
    let reply = send(req, configure(MockStore::new(), gateway)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn verify_session_for_deleted_invoice() {
    let _ = env_logger::try_init().ok();
    let mut gateway = MockGateway::new();
    gateway
        .expect_retrieve_outcome()
        .returning(|_| Ok(outcome("sess_1", "gone", SessionState::Paid { external_ref: "pi_1".into() })));
    let mut store = MockStore::new();
    store.expect_update_status_if_pending().returning(|_, _, _| Ok(None));
    store.expect_fetch_invoice().returning(|_| Ok(None));
    let req = TestRequest::post().uri("/api/verify-payment").set_json(json!({ "sessionId": "sess_1" }));
    let reply = send(req, configure(store, gateway)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
