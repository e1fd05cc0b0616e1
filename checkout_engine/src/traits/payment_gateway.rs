use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Invoice, InvoiceId};

/// Identifier of a payment session issued by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The state of a payment session as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    /// The customer has not completed the payment yet.
    Open,
    #[serde(rename_all = "camelCase")]
    Paid { external_ref: String },
    /// The payment was declined, abandoned or expired.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub session_id: SessionId,
    pub invoice_id: InvoiceId,
    #[serde(flatten)]
    pub state: SessionState,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Unknown payment session {0}")]
    SessionNotFound(SessionId),
    #[error("The payment provider is unavailable. {0}")]
    Unavailable(String),
}

/// An external payment provider.
///
/// Callers must not assume these calls return promptly. The engine wraps every call in a timeout.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    async fn create_session(&self, invoice: &Invoice) -> Result<SessionId, GatewayError>;

    async fn retrieve_outcome(&self, session_id: &SessionId) -> Result<PaymentOutcome, GatewayError>;
}
