//! Payment provider adapters.
//!
//! Real providers implement [`crate::PaymentGateway`] in the binary that embeds the engine. The engine ships with
//! [`SimulatedGateway`], which stands in for a provider during development and in tests.
mod simulated;

pub use simulated::SimulatedGateway;
