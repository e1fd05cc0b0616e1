//! The public API of the checkout engine.
//!
//! * [`invoice_flow_api::InvoiceFlowApi`] owns the invoice lifecycle: creation, add-ons and status transitions.
//! * [`checkout_api::CheckoutApi`] bridges payment sessions at the provider to the invoice lifecycle.
//! * [`state_machine`] holds the transition rules. It does no I/O.
pub mod checkout_api;
pub mod invoice_flow_api;
pub mod state_machine;
