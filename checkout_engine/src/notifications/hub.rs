use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use log::*;
use thiserror::Error;
use tokio::sync::{mpsc, mpsc::error::TrySendError, RwLock};

use crate::{db_types::InvoiceId, notifications::ServerMessage};

pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("The notification hub has shut down")]
    ShutDown,
    #[error("Connection #{0} is not registered with the notification hub")]
    UnknownConnection(ConnectionId),
}

/// The receiving end of a connection. Dropping it (or calling [`NotificationHub::leave`]) ends the subscription.
#[derive(Debug)]
pub struct Subscription {
    pub id: ConnectionId,
    pub receiver: mpsc::Receiver<ServerMessage>,
}

/// What happened to a single publish.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Members whose buffer accepted the message.
    pub delivered: usize,
    /// Members whose buffer was full. They miss this message.
    pub dropped: usize,
    /// Members whose receiver was gone. They have been removed from the hub.
    pub disconnected: usize,
}

struct Connection {
    sender: mpsc::Sender<ServerMessage>,
    rooms: HashSet<InvoiceId>,
}

#[derive(Default)]
struct HubState {
    rooms: HashMap<InvoiceId, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, Connection>,
    shut_down: bool,
}

impl HubState {
    fn remove_connection(&mut self, id: ConnectionId) -> Option<usize> {
        let connection = self.connections.remove(&id)?;
        for room in &connection.rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&id);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }
        Some(connection.rooms.len())
    }
}

/// The room membership table and fan-out service.
///
/// The hub is cheap to clone; clones share the same table. The table is guarded by a single async `RwLock`.
/// Publishing holds the read lock while it fills subscriber buffers with `try_send`, so it never waits on a slow
/// consumer and never observes a room halfway through a membership change.
#[derive(Clone)]
pub struct NotificationHub {
    state: Arc<RwLock<HubState>>,
    next_id: Arc<AtomicU64>,
    buffer_size: usize,
}

impl Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationHub (buffer: {})", self.buffer_size)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(16)
    }
}

impl NotificationHub {
    /// Creates a hub whose connections each buffer up to `buffer_size` undelivered messages.
    pub fn new(buffer_size: usize) -> Self {
        Self { state: Arc::new(RwLock::new(HubState::default())), next_id: Arc::new(AtomicU64::new(1)), buffer_size }
    }

    /// Registers a new connection. It is not a member of any room yet.
    pub async fn connect(&self) -> Result<Subscription, HubError> {
        let (sender, receiver) = mpsc::channel(self.buffer_size.max(1));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.write().await;
        if state.shut_down {
            return Err(HubError::ShutDown);
        }
        state.connections.insert(id, Connection { sender, rooms: HashSet::new() });
        trace!("📢️ Connection #{id} registered");
        Ok(Subscription { id, receiver })
    }

    /// Adds the connection to the invoice's room. Returns `false` if it was already a member.
    pub async fn join(&self, id: ConnectionId, invoice_id: &InvoiceId) -> Result<bool, HubError> {
        let mut state = self.state.write().await;
        if state.shut_down {
            return Err(HubError::ShutDown);
        }
        let connection = state.connections.get_mut(&id).ok_or(HubError::UnknownConnection(id))?;
        let added = connection.rooms.insert(invoice_id.clone());
        state.rooms.entry(invoice_id.clone()).or_default().insert(id);
        if added {
            debug!("📢️ Connection #{id} joined room {invoice_id}");
        }
        Ok(added)
    }

    /// Removes the connection from a single room. Returns `false` if it was not a member.
    pub async fn leave_room(&self, id: ConnectionId, invoice_id: &InvoiceId) -> bool {
        let mut state = self.state.write().await;
        let was_member = state.connections.get_mut(&id).map(|c| c.rooms.remove(invoice_id)).unwrap_or(false);
        if let Some(members) = state.rooms.get_mut(invoice_id) {
            members.remove(&id);
            if members.is_empty() {
                state.rooms.remove(invoice_id);
            }
        }
        if was_member {
            debug!("📢️ Connection #{id} left room {invoice_id}");
        }
        was_member
    }

    /// Removes the connection from every room and closes its channel. Calling this again is a no-op.
    pub async fn leave(&self, id: ConnectionId) {
        let mut state = self.state.write().await;
        if let Some(rooms) = state.remove_connection(id) {
            debug!("📢️ Connection #{id} disconnected from {rooms} rooms");
        }
    }

    /// Delivers `message` to every connection currently in the invoice's room, and to nobody else.
    ///
    /// Nothing is kept for connections that join later.
    pub async fn publish(&self, invoice_id: &InvoiceId, message: ServerMessage) -> PublishReport {
        let mut report = PublishReport::default();
        let mut gone = Vec::new();
        {
            let state = self.state.read().await;
            let Some(members) = state.rooms.get(invoice_id) else {
                trace!("📢️ Nobody is in room {invoice_id}");
                return report;
            };
            for id in members {
                let Some(connection) = state.connections.get(id) else { continue };
                match connection.sender.try_send(message.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!("📢️ Connection #{id} is not keeping up. Dropping a message for room {invoice_id}");
                        report.dropped += 1;
                    },
                    Err(TrySendError::Closed(_)) => gone.push(*id),
                }
            }
        }
        if !gone.is_empty() {
            let mut state = self.state.write().await;
            for id in gone {
                if state.remove_connection(id).is_some() {
                    report.disconnected += 1;
                    debug!("📢️ Connection #{id} went away. Removed from the hub");
                }
            }
        }
        debug!(
            "📢️ Published to room {invoice_id}: {} delivered, {} dropped, {} disconnected",
            report.delivered, report.dropped, report.disconnected
        );
        report
    }

    pub async fn room_size(&self, invoice_id: &InvoiceId) -> usize {
        self.state.read().await.rooms.get(invoice_id).map(HashSet::len).unwrap_or(0)
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    pub async fn is_shut_down(&self) -> bool {
        self.state.read().await.shut_down
    }

    /// Empties every room and closes every connection's channel. The hub refuses new connections afterwards.
    ///
    /// Returns the number of connections that were closed.
    pub async fn shutdown(&self) -> usize {
        let mut state = self.state.write().await;
        state.shut_down = true;
        state.rooms.clear();
        let closed = state.connections.len();
        state.connections.clear();
        info!("📢️ Notification hub shut down. {closed} connections closed");
        closed
    }
}
