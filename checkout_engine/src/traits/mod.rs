//! # Backend contracts
//!
//! This module defines the interfaces that the engine's collaborators must provide.
//!
//! * [`InvoiceStore`] is the durable record of invoices. Besides create and fetch, it exposes two conditional updates
//!   keyed on the invoice still being `pending`. They are the only way an invoice is ever mutated, which is what
//!   linearises concurrent transitions on the same invoice.
//! * [`PaymentGateway`] is the external payment provider. It creates a payment session for an invoice and later reports
//!   the outcome of that session.
mod invoice_store;
mod payment_gateway;

pub use invoice_store::{InvoiceError, InvoiceStore};
pub use payment_gateway::{GatewayError, PaymentGateway, PaymentOutcome, SessionId, SessionState};
