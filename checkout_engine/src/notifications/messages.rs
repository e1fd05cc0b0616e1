use serde::{Deserialize, Serialize};

use crate::{
    db_types::{InvoiceId, InvoiceStatus},
    events::InvoiceStatusEvent,
};

/// Messages pushed from the server to a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    PaymentConfirmed { invoice_id: InvoiceId },
    #[serde(rename_all = "camelCase")]
    InvoiceCancelled { invoice_id: InvoiceId },
    Error { message: String },
}

impl ServerMessage {
    /// The announcement for an invoice that reached `status`. Nothing is announced for `pending`.
    pub fn for_status(invoice_id: InvoiceId, status: InvoiceStatus) -> Option<Self> {
        match status {
            InvoiceStatus::Pending => None,
            InvoiceStatus::Paid => Some(Self::PaymentConfirmed { invoice_id }),
            InvoiceStatus::Cancelled => Some(Self::InvoiceCancelled { invoice_id }),
        }
    }

    pub fn for_event(event: &InvoiceStatusEvent) -> Option<Self> {
        Self::for_status(event.invoice_id.clone(), event.status)
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::Error { message: message.into() }
    }

    pub fn invoice_id(&self) -> Option<&InvoiceId> {
        match self {
            Self::PaymentConfirmed { invoice_id } | Self::InvoiceCancelled { invoice_id } => Some(invoice_id),
            Self::Error { .. } => None,
        }
    }
}

/// Messages a connected client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinInvoiceRoom {
        invoice_id: InvoiceId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LeaveInvoiceRoom { invoice_id: InvoiceId },
    /// A client's claim that the invoice has been paid. The server checks it before relaying it.
    #[serde(rename_all = "camelCase")]
    PaymentConfirmed { invoice_id: InvoiceId },
}
