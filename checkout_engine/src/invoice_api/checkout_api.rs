use std::{fmt::Debug, future::Future, time::Duration};

use cpg_common::Money;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{AddOns, Invoice, InvoiceId, InvoiceStatus},
    invoice_api::{invoice_flow_api::InvoiceFlowApi, state_machine::InvoiceEvent},
    traits::{GatewayError, InvoiceError, InvoiceStore, PaymentGateway, SessionId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: SessionId,
    pub invoice: Invoice,
}

/// `CheckoutApi` connects payment sessions at the provider with the invoice lifecycle.
///
/// Every call into the [`PaymentGateway`] is bounded by `timeout`. A call that does not finish in time surfaces as
/// [`InvoiceError::GatewayTimeout`], which callers may retry.
pub struct CheckoutApi<B, G> {
    invoices: InvoiceFlowApi<B>,
    gateway: G,
    timeout: Duration,
    add_on_unit_price: Money,
}

impl<B, G> Debug for CheckoutApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi (timeout: {}ms, add-on price: {})", self.timeout.as_millis(), self.add_on_unit_price)
    }
}

impl<B, G> CheckoutApi<B, G> {
    pub fn new(invoices: InvoiceFlowApi<B>, gateway: G, timeout: Duration, add_on_unit_price: Money) -> Self {
        Self { invoices, gateway, timeout, add_on_unit_price }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn invoices(&self) -> &InvoiceFlowApi<B> {
        &self.invoices
    }

    pub fn add_on_unit_price(&self) -> Money {
        self.add_on_unit_price
    }
}

impl<B, G> CheckoutApi<B, G>
where
    B: InvoiceStore,
    G: PaymentGateway,
{
    /// Prepares a pending invoice for payment and opens a session for it at the provider.
    ///
    /// A non-zero `add_on_quantity` records the add-on line first, priced at the configured unit price. Repeating the
    /// call with the same quantity reuses the recorded line.
    pub async fn begin_checkout(
        &self,
        invoice_id: &InvoiceId,
        add_on_quantity: u32,
    ) -> Result<CheckoutSession, InvoiceError> {
        let mut invoice = self.invoices.fetch_invoice(invoice_id).await?;
        if invoice.status.is_terminal() {
            return Err(InvoiceError::Conflict { current: invoice.status, requested: InvoiceStatus::Paid });
        }
        if add_on_quantity > 0 {
            let add_ons = AddOns::new(add_on_quantity, self.add_on_unit_price);
            if invoice.add_ons != Some(add_ons) {
                invoice = self.invoices.set_add_ons(invoice_id, add_ons).await?;
            }
        }
        let session_id = self.guarded(self.gateway.create_session(&invoice)).await?;
        info!("💳️ Payment session {session_id} opened for invoice [{invoice_id}] ({})", invoice.total_amount);
        Ok(CheckoutSession { session_id, invoice })
    }

    /// Looks up the outcome of a payment session and applies it to its invoice.
    ///
    /// A paid session confirms the payment and a failed one cancels the invoice. A session that is still open is a
    /// validation error, and a session whose invoice no longer exists is [`InvoiceError::InvoiceNotFound`].
    pub async fn settle_session(&self, session_id: &SessionId) -> Result<Invoice, InvoiceError> {
        let outcome = self.guarded(self.gateway.retrieve_outcome(session_id)).await?;
        let event = InvoiceEvent::from_session_state(&outcome.state).ok_or_else(|| {
            debug!("💳️ Session {session_id} is still open");
            InvoiceError::Validation("Payment not completed".into())
        })?;
        debug!("💳️ Session {session_id} for invoice [{}] settled with {event:?}", outcome.invoice_id);
        self.invoices.transition(&outcome.invoice_id, event).await
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, InvoiceError>
    where F: Future<Output = Result<T, GatewayError>> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| {
                warn!("💳️ Payment gateway call failed. {e}");
                InvoiceError::from(e)
            }),
            Err(_) => {
                warn!("💳️ Payment gateway call timed out after {}ms", self.timeout.as_millis());
                Err(InvoiceError::GatewayTimeout(self.timeout))
            },
        }
    }
}
