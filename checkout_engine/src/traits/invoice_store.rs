use std::time::Duration;

use thiserror::Error;

use crate::{
    db_types::{AddOns, Invoice, InvoiceId, InvoiceStatus, NewInvoice},
    traits::{GatewayError, SessionId},
};

/// The storage contract for invoices.
///
/// Implementations must apply [`Self::set_add_ons_if_pending`] and [`Self::update_status_if_pending`] as single atomic
/// compare-and-swap operations. No in-memory lock is expected to be held across these calls.
#[allow(async_fn_in_trait)]
pub trait InvoiceStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Persists a new invoice with status `pending` and a total computed from its lines.
    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice, InvoiceError>;

    async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, InvoiceError>;

    /// Records the add-on line and adds its amount to the total, but only if the invoice is still `pending` and has
    /// no add-ons yet. Returns `None` if the condition did not hold (or the invoice does not exist).
    async fn set_add_ons_if_pending(&self, id: &InvoiceId, add_ons: AddOns) -> Result<Option<Invoice>, InvoiceError>;

    /// Moves a `pending` invoice to `status`, storing `payment_ref` alongside. Returns `None` if the invoice was not
    /// `pending` at the time of the update (or does not exist).
    async fn update_status_if_pending(
        &self,
        id: &InvoiceId,
        status: InvoiceStatus,
        payment_ref: Option<String>,
    ) -> Result<Option<Invoice>, InvoiceError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), InvoiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("The requested invoice {0} does not exist")]
    InvoiceNotFound(InvoiceId),
    #[error("The payment session {0} does not exist")]
    SessionNotFound(SessionId),
    #[error("The invoice is already {current} and cannot become {requested}")]
    Conflict { current: InvoiceStatus, requested: InvoiceStatus },
    #[error("The add-ons for invoice {0} can no longer be changed")]
    AddOnsLocked(InvoiceId),
    #[error("A transient I/O error occurred: {0}")]
    TransientIo(String),
    #[error("The payment gateway did not respond within {}ms", .0.as_millis())]
    GatewayTimeout(Duration),
    #[error("Invalid request. {0}")]
    Validation(String),
}

impl InvoiceError {
    /// True for errors where the same request may succeed if it is repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientIo(_) | Self::GatewayTimeout(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AddOnsLocked(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InvoiceNotFound(_) | Self::SessionNotFound(_))
    }
}

impl From<sqlx::Error> for InvoiceError {
    fn from(e: sqlx::Error) -> Self {
        Self::TransientIo(e.to_string())
    }
}

impl From<GatewayError> for InvoiceError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::SessionNotFound(id) => Self::SessionNotFound(id),
            GatewayError::Unavailable(msg) => Self::TransientIo(msg),
        }
    }
}
