use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use checkout_engine::{
    db_types::{InvoiceId, InvoiceStatus},
    events::EventProducers,
    CheckoutApi,
    InvoiceFlowApi,
    PaymentOutcome,
    SessionId,
    SessionState,
};
use cpg_common::{Money, Secret};

use super::{
    helpers::{invoice, send},
    mocks::{MockGateway, MockStore},
};
use crate::{
    helpers::calculate_hmac,
    middleware::{HmacMiddlewareFactory, WEBHOOK_HMAC_HEADER},
    routes::PaymentWebhookRoute,
};

const SECRET: &str = "whsec_test";
const BODY: &str = r#"{"sessionId":"sess_1"}"#;

fn configure(store: MockStore, gateway: MockGateway, checks: bool) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let invoices = InvoiceFlowApi::new(store, EventProducers::default());
        let api = CheckoutApi::new(invoices, gateway, Duration::from_secs(1), Money::from(100));
        cfg.app_data(web::Data::new(api)).service(
            web::scope("/webhook")
                .wrap(HmacMiddlewareFactory::new(WEBHOOK_HMAC_HEADER, Secret::new(SECRET.to_string()), checks))
                .service(PaymentWebhookRoute::<MockStore, MockGateway>::new()),
        );
    }
}

/// Mocks that expect exactly one paid settlement of `sess_1`.
fn settling_mocks() -> (MockStore, MockGateway) {
    let mut gateway = MockGateway::new();
    gateway.expect_retrieve_outcome().times(1).returning(|_| {
        Ok(PaymentOutcome {
            session_id: SessionId::from("sess_1"),
            invoice_id: InvoiceId::from("inv-1"),
            state: SessionState::Paid { external_ref: "pi_123".into() },
        })
    });
    let mut store = MockStore::new();
    store
        .expect_update_status_if_pending()
        .times(1)
        .returning(|_, _, _| Ok(Some(invoice("inv-1", InvoiceStatus::Paid))));
    (store, gateway)
}

/// Mocks that must never be reached.
fn untouched_mocks() -> (MockStore, MockGateway) {
    let mut gateway = MockGateway::new();
    gateway.expect_retrieve_outcome().never();
    let mut store = MockStore::new();
    store.expect_update_status_if_pending().never();
    (store, gateway)
}

fn webhook_request() -> TestRequest {
    TestRequest::post().uri("/webhook/payment").insert_header(("Content-Type", "application/json")).set_payload(BODY)
}

#[actix_web::test]
async fn signed_webhook_settles_the_session() {
    let _ = env_logger::try_init().ok();
    let (store, gateway) = settling_mocks();
    let signature = calculate_hmac(SECRET, BODY.as_bytes()).unwrap();
    let req = webhook_request().insert_header((WEBHOOK_HMAC_HEADER, signature));
    let reply = send(req, configure(store, gateway, true)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "paid");
}

#[actix_web::test]
async fn unsigned_webhook_is_forbidden() {
    let _ = env_logger::try_init().ok();
    let (store, gateway) = untouched_mocks();
    let reply = send(webhook_request(), configure(store, gateway, true)).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body, "No HMAC signature found.");
}

#[actix_web::test]
async fn tampered_webhook_is_forbidden() {
    let _ = env_logger::try_init().ok();
    let (store, gateway) = untouched_mocks();
    let signature = calculate_hmac(SECRET, br#"{"sessionId":"sess_2"}"#).unwrap();
    let req = webhook_request().insert_header((WEBHOOK_HMAC_HEADER, signature));
    let reply = send(req, configure(store, gateway, true)).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body, "Invalid HMAC signature.");
}

#[actix_web::test]
async fn disabled_checks_let_unsigned_calls_through() {
    let _ = env_logger::try_init().ok();
    let (store, gateway) = settling_mocks();
    let reply = send(webhook_request(), configure(store, gateway, false)).await;
    assert_eq!(reply.status, StatusCode::OK);
}
