use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{AddOns, Invoice, InvoiceId, InvoiceStatus, NewInvoice},
    events::{EventProducers, InvoiceStatusEvent},
    invoice_api::state_machine::{check_add_ons, resolve_lost_race, validate_add_ons, InvoiceEvent},
    traits::{InvoiceError, InvoiceStore},
};

/// `InvoiceFlowApi` is the primary API for moving invoices through their lifecycle.
///
/// Every status change goes through [`Self::transition`], which applies it as a conditional update on the store and
/// notifies the status hooks only when this call is the one that moved the invoice out of `pending`. Retries and
/// concurrent duplicates therefore never produce a second notification.
pub struct InvoiceFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for InvoiceFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvoiceFlowApi")
    }
}

impl<B: Clone> Clone for InvoiceFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> InvoiceFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn producers_mut(&mut self) -> &mut EventProducers {
        &mut self.producers
    }
}

impl<B> InvoiceFlowApi<B>
where B: InvoiceStore
{
    /// Creates a new `pending` invoice. The total is the sum of the line amounts.
    pub async fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice, InvoiceError> {
        validate_new_invoice(&invoice)?;
        let invoice = self.db.insert_invoice(invoice).await?;
        info!("🧾️ Invoice [{}] created for {} ({} lines)", invoice.id, invoice.total_amount, invoice.line_items.len());
        Ok(invoice)
    }

    pub async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Invoice, InvoiceError> {
        self.db.fetch_invoice(id).await?.ok_or_else(|| InvoiceError::InvoiceNotFound(id.clone()))
    }

    /// Records the add-on line on a pending invoice and raises the total accordingly. This can happen once.
    pub async fn set_add_ons(&self, id: &InvoiceId, add_ons: AddOns) -> Result<Invoice, InvoiceError> {
        validate_add_ons(&add_ons)?;
        match self.db.set_add_ons_if_pending(id, add_ons).await? {
            Some(invoice) => {
                debug!("🧾️ Invoice [{id}] now carries {} add-ons. Total {}", add_ons.quantity, invoice.total_amount);
                Ok(invoice)
            },
            None => {
                let current = self.fetch_invoice(id).await?;
                check_add_ons(&current, &add_ons)?;
                // pending without add-ons, yet the update missed
                Err(InvoiceError::TransientIo(format!("The add-on update for invoice {id} did not apply. Try again.")))
            },
        }
    }

    /// Applies `event` to the invoice.
    ///
    /// * If the invoice is `pending`, it moves to the event's target status and the status hooks are notified once.
    /// * If it already sits in the requested terminal status, the stored invoice is returned and nobody is notified.
    /// * If it sits in the other terminal status, the result is [`InvoiceError::Conflict`].
    pub async fn transition(&self, id: &InvoiceId, event: InvoiceEvent) -> Result<Invoice, InvoiceError> {
        event.validate()?;
        let target = event.target_status();
        let payment_ref = event.payment_ref().map(|s| s.trim().to_string());
        trace!("🧾️ Trying to move invoice [{id}] to {target}");
        match self.db.update_status_if_pending(id, target, payment_ref).await? {
            Some(invoice) => {
                info!("🧾️ Invoice [{id}] is now {target}");
                self.call_status_changed_hook(&invoice).await;
                Ok(invoice)
            },
            None => {
                let stored = self.fetch_invoice(id).await?;
                let result = resolve_lost_race(stored, &event);
                match &result {
                    Ok(_) => debug!("🧾️ Invoice [{id}] was already {target}. Nothing to do."),
                    Err(e) => warn!("🧾️ Invoice [{id}] cannot become {target}. {e}"),
                }
                result
            },
        }
    }

    /// Checks a client's claim that an invoice has been paid against the store.
    ///
    /// Returns the event to fan out if the claim holds, or `None` if the invoice is not paid.
    pub async fn revalidate_payment_claim(&self, id: &InvoiceId) -> Result<Option<InvoiceStatusEvent>, InvoiceError> {
        let invoice = self.fetch_invoice(id).await?;
        if invoice.status == InvoiceStatus::Paid {
            Ok(Some(InvoiceStatusEvent::from(&invoice)))
        } else {
            debug!("🧾️ Payment claim for invoice [{id}] rejected. It is {}", invoice.status);
            Ok(None)
        }
    }

    async fn call_status_changed_hook(&self, invoice: &Invoice) {
        for emitter in &self.producers.status_changed_producer {
            trace!("🧾️ Notifying status hook subscribers");
            emitter.publish_event(InvoiceStatusEvent::from(invoice)).await;
        }
    }
}

fn validate_new_invoice(invoice: &NewInvoice) -> Result<(), InvoiceError> {
    let fail = |msg: &str| Err(InvoiceError::Validation(msg.to_string()));
    if invoice.customer.name.trim().is_empty() {
        return fail("The customer name is required");
    }
    if !invoice.customer.email.contains('@') {
        return fail("The customer email is not valid");
    }
    if invoice.line_items.is_empty() {
        return fail("An invoice needs at least one line item");
    }
    for item in &invoice.line_items {
        if item.product_ref.trim().is_empty() {
            return fail("Every line item needs a product reference");
        }
        if item.quantity == 0 {
            return fail("Line item quantities must be at least 1");
        }
        if item.unit_price.is_negative() {
            return fail("Line item prices cannot be negative");
        }
    }
    if invoice.total().is_none() {
        return fail("The invoice total is too large");
    }
    Ok(())
}
