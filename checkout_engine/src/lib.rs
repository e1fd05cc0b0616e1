//! Checkout Payment Engine
//!
//! This library contains the core logic of the checkout payment gateway. It is transport-agnostic: the HTTP and
//! WebSocket surfaces live in `checkout_server`.
//!
//! The library is divided into the following sections:
//! 1. Data types ([`mod@db_types`]) and the storage contract ([`InvoiceStore`]). SQLite is the supported backend. The
//!    only way the invoice status changes is through the conditional update exposed by the store.
//! 2. The invoice state machine ([`InvoiceFlowApi`]). It validates transitions, applies them atomically and emits
//!    exactly one status event for every transition that actually happened.
//! 3. The payment gateway adapter ([`PaymentGateway`]) and [`CheckoutApi`], which turns payment session outcomes into
//!    state machine events. Every gateway call is bounded by a timeout.
//! 4. The [`NotificationHub`], a room-scoped publish/subscribe service that fans status changes out to connected
//!    clients on a best-effort basis.
//! 5. The [`StatusReconciler`], the polling fallback that converges on the same terminal state as the push channel.
//!
//! Status events are delivered to subscribers through the hook system in [`mod@events`].
pub mod db_types;
pub mod events;
pub mod gateway;
pub mod notifications;
pub mod reconciler;

mod invoice_api;
mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use invoice_api::{
    checkout_api::{CheckoutApi, CheckoutSession},
    invoice_flow_api::InvoiceFlowApi,
    state_machine::InvoiceEvent,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{GatewayError, InvoiceError, InvoiceStore, PaymentGateway, PaymentOutcome, SessionId, SessionState};
