//! A small HTTP client for the checkout server.
//!
//! Storefront code and tests use it to drive invoices through the server. It also implements [`InvoiceSource`], so a
//! [`StatusReconciler`](checkout_engine::reconciler::StatusReconciler) can poll an invoice over HTTP.
use checkout_engine::{
    db_types::{AddOns, Invoice, InvoiceId, NewInvoice},
    reconciler::InvoiceSource,
    InvoiceError,
    InvoiceEvent,
    PaymentOutcome,
    SessionId,
};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    RequestBuilder,
    StatusCode,
    Url,
};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;

use crate::data_objects::{
    CheckoutSessionRequest,
    CheckoutSessionResponse,
    InvoiceCreated,
    SessionReference,
    SettleSessionRequest,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server URL. {0}")]
    InvalidUrl(String),
    #[error("Could not reach the server. {0}")]
    Transport(#[from] reqwest::Error),
    #[error("The server responded with {status}. {message}")]
    Status { status: StatusCode, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone, Debug)]
pub struct InvoiceClient {
    client: Client,
    server: Url,
}

impl InvoiceClient {
    pub fn new(server: &str) -> Result<Self, ClientError> {
        let server = Url::parse(server).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder().user_agent("Checkout Payment Gateway Client").default_headers(headers).build()?;
        Ok(Self { client, server })
    }

    pub fn server(&self) -> &str {
        self.server.as_str()
    }

    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.server.join(path).map_err(|e| ClientError::InvalidUrl(format!("Failed to join URL: {e}")))
    }

    pub async fn health(&self) -> Result<String, ClientError> {
        let res = self.client.get(self.url("/health")?).send().await?;
        Ok(res.text().await?)
    }

    pub async fn create_invoice(&self, invoice: &NewInvoice) -> Result<InvoiceCreated, ClientError> {
        self.execute(self.client.post(self.url("/api/invoices")?).json(invoice)).await
    }

    pub async fn invoice(&self, id: &InvoiceId) -> Result<Invoice, ClientError> {
        self.execute(self.client.get(self.url(&format!("/api/invoices/{id}"))?)).await
    }

    pub async fn transition(&self, id: &InvoiceId, event: &InvoiceEvent) -> Result<Invoice, ClientError> {
        self.execute(self.client.patch(self.url(&format!("/api/invoices/{id}"))?).json(event)).await
    }

    pub async fn set_add_ons(&self, id: &InvoiceId, add_ons: &AddOns) -> Result<Invoice, ClientError> {
        self.execute(self.client.patch(self.url(&format!("/api/invoices/{id}/add-ons"))?).json(add_ons)).await
    }

    pub async fn checkout_session(&self, id: &InvoiceId, add_on_quantity: u32) -> Result<SessionId, ClientError> {
        let body = CheckoutSessionRequest { invoice_id: id.clone(), add_on_quantity };
        let res: CheckoutSessionResponse =
            self.execute(self.client.post(self.url("/api/checkout-session")?).json(&body)).await?;
        Ok(res.session_id)
    }

    pub async fn verify_payment(&self, session_id: &SessionId) -> Result<Invoice, ClientError> {
        let body = SessionReference { session_id: session_id.clone() };
        self.execute(self.client.post(self.url("/api/verify-payment")?).json(&body)).await
    }

    /// Only available while the server runs against the simulated payment provider.
    pub async fn settle_simulated_session(
        &self,
        session_id: &SessionId,
        paid: bool,
    ) -> Result<PaymentOutcome, ClientError> {
        let url = self.url(&format!("/api/simulator/sessions/{session_id}/settle"))?;
        self.execute(self.client.post(url).json(&SettleSessionRequest { paid })).await
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let res = req.send().await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text).map(|b| b.error).unwrap_or(text);
            debug!("🔁️ Request failed with {status}. {message}");
            return Err(ClientError::Status { status, message });
        }
        Ok(res.json::<T>().await?)
    }
}

impl InvoiceSource for InvoiceClient {
    async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Invoice, InvoiceError> {
        self.invoice(id).await.map_err(|e| match e.status() {
            Some(StatusCode::NOT_FOUND) => InvoiceError::InvoiceNotFound(id.clone()),
            Some(StatusCode::BAD_REQUEST) => InvoiceError::Validation(e.to_string()),
            _ => InvoiceError::TransientIo(e.to_string()),
        })
    }
}
