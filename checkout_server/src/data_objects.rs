use checkout_engine::{
    db_types::{Invoice, InvoiceId},
    SessionId,
};
use serde::{Deserialize, Serialize};

/// Response to a successful invoice creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceCreated {
    pub invoice: Invoice,
    /// Present when room tokens are enabled. Clients pass it along when they join the invoice's room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_token: Option<String>,
    /// How often a client watching this invoice should poll for its status.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    pub invoice_id: InvoiceId,
    #[serde(default)]
    pub add_on_quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub session_id: SessionId,
}

/// Body of both the payment verification call and the provider webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReference {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleSessionRequest {
    pub paid: bool,
}
