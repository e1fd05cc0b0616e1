//! Polling fallback for the push channel.
//!
//! A [`StatusReconciler`] tracks one invoice from the point of view of a client. While the locally held status is
//! `pending` it re-fetches the invoice on a fixed interval. Push messages for the invoice, when they arrive, only
//! trigger an early re-fetch, so the push path and the poll path always apply the same transition: the one the store
//! reports. Losing every push message delays the outcome by at most one interval.
use std::time::Duration;

use log::*;
use tokio::{sync::mpsc, time::MissedTickBehavior};

use crate::{
    db_types::{Invoice, InvoiceId, InvoiceStatus},
    invoice_api::invoice_flow_api::InvoiceFlowApi,
    notifications::ServerMessage,
    traits::{InvoiceError, InvoiceStore},
};

/// Anything that can report the current state of an invoice.
#[allow(async_fn_in_trait)]
pub trait InvoiceSource {
    async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Invoice, InvoiceError>;
}

impl<B: InvoiceStore> InvoiceSource for InvoiceFlowApi<B> {
    async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Invoice, InvoiceError> {
        InvoiceFlowApi::fetch_invoice(self, id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Nothing new. Either the invoice is still pending or its terminal state was already applied.
    Unchanged,
    /// The invoice reached a terminal state that had not been applied locally yet.
    Transitioned(Invoice),
}

pub struct StatusReconciler<S> {
    source: S,
    invoice_id: InvoiceId,
    local: InvoiceStatus,
    interval: Duration,
    settled: Option<Invoice>,
}

impl<S> StatusReconciler<S> {
    pub fn new(source: S, invoice_id: InvoiceId, local: InvoiceStatus, interval: Duration) -> Self {
        Self { source, invoice_id, local, interval, settled: None }
    }

    pub fn invoice_id(&self) -> &InvoiceId {
        &self.invoice_id
    }

    pub fn status(&self) -> InvoiceStatus {
        self.local
    }

    pub fn is_settled(&self) -> bool {
        self.local.is_terminal()
    }

    /// Applies a freshly fetched invoice to the local state. Applying the same terminal state twice is a no-op.
    pub fn apply(&mut self, invoice: Invoice) -> Observation {
        if invoice.id != self.invoice_id || self.local.is_terminal() || !invoice.status.is_terminal() {
            return Observation::Unchanged;
        }
        debug!("🔁️ Invoice [{}] moved from {} to {}", self.invoice_id, self.local, invoice.status);
        self.local = invoice.status;
        self.settled = Some(invoice.clone());
        Observation::Transitioned(invoice)
    }
}

impl<S: InvoiceSource> StatusReconciler<S> {
    pub async fn poll_once(&mut self) -> Result<Observation, InvoiceError> {
        trace!("🔁️ Polling invoice [{}]", self.invoice_id);
        let invoice = self.source.fetch_invoice(&self.invoice_id).await?;
        Ok(self.apply(invoice))
    }

    /// Handles a push message. Messages about this invoice trigger a re-fetch; anything else is ignored.
    pub async fn on_push(&mut self, message: &ServerMessage) -> Result<Observation, InvoiceError> {
        match message.invoice_id() {
            Some(id) if id == &self.invoice_id => {
                trace!("🔁️ Push received for invoice [{id}]");
                self.poll_once().await
            },
            _ => Ok(Observation::Unchanged),
        }
    }

    /// Runs until the invoice reaches a terminal state and returns it.
    ///
    /// `push` is the optional push channel. Retryable errors are logged and polling carries on. Any other error ends
    /// the run.
    pub async fn run(mut self, mut push: Option<mpsc::Receiver<ServerMessage>>) -> Result<Invoice, InvoiceError> {
        if let Some(invoice) = self.settled.take() {
            return Ok(invoice);
        }
        if self.local.is_terminal() {
            return self.source.fetch_invoice(&self.invoice_id).await;
        }
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🔁️ Watching invoice [{}] every {}ms", self.invoice_id, self.interval.as_millis());
        loop {
            let wake = tokio::select! {
                _ = ticker.tick() => Wake::Tick,
                msg = next_push(&mut push) => Wake::Push(msg),
            };
            let observation = match wake {
                Wake::Tick => self.poll_once().await,
                Wake::Push(Some(msg)) => self.on_push(&msg).await,
                Wake::Push(None) => {
                    debug!("🔁️ Push channel for invoice [{}] closed. Polling only", self.invoice_id);
                    push = None;
                    continue;
                },
            };
            match observation {
                Ok(Observation::Transitioned(invoice)) => {
                    info!("🔁️ Invoice [{}] settled as {}", self.invoice_id, invoice.status);
                    return Ok(invoice);
                },
                Ok(Observation::Unchanged) => {},
                Err(e) if e.is_retryable() => warn!("🔁️ Could not fetch invoice [{}]. {e}", self.invoice_id),
                Err(e) => {
                    error!("🔁️ Giving up on invoice [{}]. {e}", self.invoice_id);
                    return Err(e);
                },
            }
        }
    }
}

enum Wake {
    Tick,
    Push(Option<ServerMessage>),
}

async fn next_push(push: &mut Option<mpsc::Receiver<ServerMessage>>) -> Option<ServerMessage> {
    match push {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
