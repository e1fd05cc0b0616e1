use std::{collections::HashMap, sync::Arc, time::Duration};

use log::*;
use tokio::sync::RwLock;

use crate::{
    db_types::{Invoice, InvoiceId},
    traits::{GatewayError, PaymentGateway, PaymentOutcome, SessionId, SessionState},
};

const SESSION_PREFIX: &str = "mock_session_";

/// An in-memory payment provider.
///
/// Sessions are named `mock_session_<invoice id>`, so opening a session twice for the same invoice returns the same
/// session. A session stays open until [`SimulatedGateway::settle`] marks it paid or failed.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    sessions: Arc<RwLock<HashMap<SessionId, PaymentOutcome>>>,
    latency: Option<Duration>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn session_id_for(invoice_id: &InvoiceId) -> SessionId {
        SessionId(format!("{SESSION_PREFIX}{invoice_id}"))
    }

    /// Completes an open session. Settling a session that is already settled returns the existing outcome.
    pub async fn settle(&self, session_id: &SessionId, paid: bool) -> Result<PaymentOutcome, GatewayError> {
        let mut sessions = self.sessions.write().await;
        let outcome =
            sessions.get_mut(session_id).ok_or_else(|| GatewayError::SessionNotFound(session_id.clone()))?;
        if outcome.state == SessionState::Open {
            outcome.state = if paid {
                SessionState::Paid { external_ref: format!("sim_pay_{:016x}", rand::random::<u64>()) }
            } else {
                SessionState::Failed
            };
            info!("💳️ Simulated session {session_id} settled: {:?}", outcome.state);
        }
        Ok(outcome.clone())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl PaymentGateway for SimulatedGateway {
    async fn create_session(&self, invoice: &Invoice) -> Result<SessionId, GatewayError> {
        self.simulate_latency().await;
        let session_id = Self::session_id_for(&invoice.id);
        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.clone()).or_insert_with(|| PaymentOutcome {
            session_id: session_id.clone(),
            invoice_id: invoice.id.clone(),
            state: SessionState::Open,
        });
        trace!("💳️ Simulated session {session_id} is open");
        Ok(session_id)
    }

    async fn retrieve_outcome(&self, session_id: &SessionId) -> Result<PaymentOutcome, GatewayError> {
        self.simulate_latency().await;
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned().ok_or_else(|| GatewayError::SessionNotFound(session_id.clone()))
    }
}
