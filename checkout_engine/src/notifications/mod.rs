//! Room-scoped push notifications.
//!
//! Each invoice has a room keyed by its id. Connections join the rooms of the invoices they are watching, and status
//! changes are fanned out to the members of exactly one room. Delivery is best-effort and at most once: a subscriber
//! whose buffer is full misses the event and catches up through the status reconciler.
mod hub;
mod messages;

pub use hub::{ConnectionId, HubError, NotificationHub, PublishReport, Subscription};
pub use messages::{ClientMessage, ServerMessage};
