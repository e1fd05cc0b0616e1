use serde::{Deserialize, Serialize};

use crate::db_types::{Invoice, InvoiceId, InvoiceStatus};

/// Emitted exactly once for every invoice that actually moved out of `pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStatusEvent {
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
}

impl InvoiceStatusEvent {
    pub fn new(invoice_id: InvoiceId, status: InvoiceStatus) -> Self {
        Self { invoice_id, status }
    }
}

impl From<&Invoice> for InvoiceStatusEvent {
    fn from(invoice: &Invoice) -> Self {
        Self { invoice_id: invoice.id.clone(), status: invoice.status }
    }
}
