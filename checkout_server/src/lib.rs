//! # Checkout payment gateway server
//! This crate hosts the HTTP and WebSocket surface of the checkout payment gateway. It is responsible for:
//! * Creating invoices and moving them through their lifecycle on behalf of the storefront.
//! * Opening payment sessions with the payment provider and applying their outcomes, either when the customer returns
//!   from checkout or when the provider calls the payment webhook.
//! * Announcing payment and cancellation events to the clients watching an invoice, over WebSockets.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/invoices`, `/api/invoices/{id}` and `/api/invoices/{id}/add-ons`: invoice creation, lookup and updates.
//! * `/api/checkout-session` and `/api/verify-payment`: the customer-facing checkout step.
//! * `/webhook/payment`: the payment provider's callback, protected by an HMAC signature.
//! * `/ws`: the notification rooms.
//!
//! The [`client::InvoiceClient`] talks to these routes and lets a
//! [`StatusReconciler`](checkout_engine::reconciler::StatusReconciler) poll an invoice over HTTP.

pub mod cli;
pub mod client;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod ws;
