//! Invoice transition rules.
//!
//! An invoice starts `pending` and moves at most once, to either `paid` or `cancelled`. The functions here decide what
//! a request means given the stored invoice. Applying the decision is the job of the store's conditional update.
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{AddOns, Invoice, InvoiceStatus},
    traits::{InvoiceError, SessionState},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum InvoiceEvent {
    #[serde(rename_all = "camelCase")]
    PaymentConfirmed { payment_ref: String },
    Cancel,
}

impl InvoiceEvent {
    pub fn payment_confirmed<S: Into<String>>(payment_ref: S) -> Self {
        Self::PaymentConfirmed { payment_ref: payment_ref.into() }
    }

    pub fn target_status(&self) -> InvoiceStatus {
        match self {
            Self::PaymentConfirmed { .. } => InvoiceStatus::Paid,
            Self::Cancel => InvoiceStatus::Cancelled,
        }
    }

    pub fn payment_ref(&self) -> Option<&str> {
        match self {
            Self::PaymentConfirmed { payment_ref } => Some(payment_ref.as_str()),
            Self::Cancel => None,
        }
    }

    pub fn validate(&self) -> Result<(), InvoiceError> {
        match self {
            Self::PaymentConfirmed { payment_ref } if payment_ref.trim().is_empty() => {
                Err(InvoiceError::Validation("A payment confirmation requires a payment reference".into()))
            },
            _ => Ok(()),
        }
    }

    /// Maps a provider outcome to the event it implies. An open session implies nothing yet.
    pub fn from_session_state(state: &SessionState) -> Option<Self> {
        match state {
            SessionState::Open => None,
            SessionState::Paid { external_ref } => Some(Self::payment_confirmed(external_ref.clone())),
            SessionState::Failed => Some(Self::Cancel),
        }
    }
}

/// What a transition request means for an invoice in a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The invoice is pending; the transition should be written.
    Apply,
    /// The invoice already sits in the requested terminal state. Return it as is.
    Replay,
    Reject(InvoiceError),
}

pub fn plan_transition(current: InvoiceStatus, event: &InvoiceEvent) -> Transition {
    let requested = event.target_status();
    match current {
        InvoiceStatus::Pending => Transition::Apply,
        s if s == requested => Transition::Replay,
        s => Transition::Reject(InvoiceError::Conflict { current: s, requested }),
    }
}

/// Resolves a conditional update that matched nothing, given the invoice as it is stored now.
pub fn resolve_lost_race(stored: Invoice, event: &InvoiceEvent) -> Result<Invoice, InvoiceError> {
    match plan_transition(stored.status, event) {
        Transition::Replay => Ok(stored),
        Transition::Reject(e) => Err(e),
        // the row is pending yet the update missed it; only a concurrent writer outside the CAS path does that
        Transition::Apply => Err(InvoiceError::TransientIo(format!(
            "The status update for invoice {} did not apply. Try again.",
            stored.id
        ))),
    }
}

/// Checks an add-on request against the stored invoice.
pub fn check_add_ons(current: &Invoice, add_ons: &AddOns) -> Result<(), InvoiceError> {
    validate_add_ons(add_ons)?;
    if current.status.is_terminal() || current.add_ons.is_some() {
        return Err(InvoiceError::AddOnsLocked(current.id.clone()));
    }
    if add_ons.amount().and_then(|a| current.total_amount.checked_add(a)).is_none() {
        return Err(InvoiceError::Validation("The invoice total would become too large".into()));
    }
    Ok(())
}

pub fn validate_add_ons(add_ons: &AddOns) -> Result<(), InvoiceError> {
    if add_ons.quantity == 0 {
        return Err(InvoiceError::Validation("The add-on quantity must be at least 1".into()));
    }
    if add_ons.unit_price.is_negative() {
        return Err(InvoiceError::Validation("The add-on unit price cannot be negative".into()));
    }
    Ok(())
}
