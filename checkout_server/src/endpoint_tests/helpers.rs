use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web::{self, ServiceConfig},
    App,
};
use chrono::Utc;
use checkout_engine::{
    db_types::{AddOns, Customer, Invoice, InvoiceId, InvoiceStatus, LineItem},
    events::EventProducers,
    InvoiceFlowApi,
};
use cpg_common::Money;
use log::debug;

use super::mocks::MockStore;
use crate::server::{json_config, path_config};

pub struct Reply {
    pub status: StatusCode,
    pub retry_after: Option<String>,
    pub body: String,
}

impl Reply {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Response body is not JSON")
    }

    pub fn error(&self) -> String {
        self.json()["error"].as_str().expect("Response has no error message").to_string()
    }
}

/// Sends `req` to an app set up by `configure`. Errors that escape the app (from middleware) are rendered the way the
/// HTTP server would render them.
pub async fn send<F>(req: TestRequest, configure: F) -> Reply
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().app_data(json_config()).app_data(path_config()).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let retry_after = res.headers().get("Retry-After").and_then(|v| v.to_str().ok()).map(String::from);
            let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
            Reply { status, retry_after, body }
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            Reply { status, retry_after: None, body: String::from_utf8_lossy(&body).into_owned() }
        },
    }
}

pub fn invoice_api(store: MockStore) -> web::Data<InvoiceFlowApi<MockStore>> {
    web::Data::new(InvoiceFlowApi::new(store, EventProducers::default()))
}

pub fn invoice(id: &str, status: InvoiceStatus) -> Invoice {
    let now = Utc::now();
    Invoice {
        id: InvoiceId::from(id),
        customer: Customer::new("Alice", "alice@example.com"),
        line_items: vec![LineItem::new("dog-1", 1, Money::from(1200))],
        add_ons: None,
        total_amount: Money::from(1200),
        status,
        payment_ref: (status == InvoiceStatus::Paid).then(|| "pi_123".to_string()),
        created_at: now,
        updated_at: now,
    }
}

pub fn with_add_ons(mut invoice: Invoice, quantity: u32) -> Invoice {
    let add_ons = AddOns::new(quantity, Money::from(100));
    invoice.total_amount = Money::from(1200 + 100 * i64::from(quantity));
    invoice.add_ons = Some(add_ons);
    invoice
}
