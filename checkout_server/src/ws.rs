//! WebSocket endpoint for the invoice notification rooms.
//!
//! Every socket is registered with the [`NotificationHub`] as one connection. Clients speak the JSON protocol in
//! [`ClientMessage`] and receive [`ServerMessage`]s. Joining a room has no reply. Problems with a client message are
//! answered with an `error` message and never close the socket.
//!
//! The session ends when the client closes the socket, stops answering pings, or the hub shuts down. In every case the
//! connection leaves all of its rooms.
use std::time::{Duration, Instant};

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{CloseCode, CloseReason, Message, MessageStream, Session};
use checkout_engine::{
    db_types::InvoiceId,
    notifications::{ClientMessage, ConnectionId, NotificationHub, ServerMessage},
    InvoiceFlowApi,
    InvoiceStore,
};
use futures::StreamExt;
use log::*;
use tokio::sync::mpsc;

use crate::{config::ServerOptions, errors::ServerError, helpers::verify_room_token};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(75);
const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Upgrades the request and hands the socket to a task that runs for as long as the connection lives.
pub async fn start_session<B>(
    req: &HttpRequest,
    body: web::Payload,
    hub: NotificationHub,
    api: InvoiceFlowApi<B>,
    options: ServerOptions,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceStore + 'static,
{
    let subscription = hub.connect().await?;
    let (response, session, stream) = match actix_ws::handle(req, body) {
        Ok(parts) => parts,
        Err(e) => {
            hub.leave(subscription.id).await;
            return Err(ServerError::InvalidRequestBody(format!("WebSocket handshake failed. {e}")));
        },
    };
    let stream = stream.max_frame_size(MAX_FRAME_SIZE);
    let connection = RoomConnection { id: subscription.id, hub, api, options, session };
    debug!("📢️ Connection #{} opened", connection.id);
    actix_web::rt::spawn(connection.run(subscription.receiver, stream));
    Ok(response)
}

struct RoomConnection<B> {
    id: ConnectionId,
    hub: NotificationHub,
    api: InvoiceFlowApi<B>,
    options: ServerOptions,
    session: Session,
}

impl<B: InvoiceStore> RoomConnection<B> {
    async fn run(mut self, mut receiver: mpsc::Receiver<ServerMessage>, mut stream: MessageStream) {
        let mut heartbeat = tokio::time::interval(PING_INTERVAL);
        let mut last_seen = Instant::now();
        let reason = loop {
            tokio::select! {
                pushed = receiver.recv() => match pushed {
                    Some(message) => {
                        if self.send(&message).await.is_err() {
                            break None;
                        }
                    },
                    None => {
                        debug!("📢️ Hub closed connection #{}", self.id);
                        break Some(CloseReason::from(CloseCode::Away));
                    },
                },
                frame = stream.next() => {
                    last_seen = Instant::now();
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if self.handle_text(&text).await.is_err() {
                                break None;
                            }
                        },
                        Some(Ok(Message::Ping(bytes))) => {
                            if self.session.pong(&bytes).await.is_err() {
                                break None;
                            }
                        },
                        Some(Ok(Message::Binary(_))) => {
                            if self.send(&ServerMessage::error("Binary frames are not supported")).await.is_err() {
                                break None;
                            }
                        },
                        Some(Ok(Message::Close(reason))) => break reason,
                        Some(Ok(_)) => {},
                        Some(Err(e)) => {
                            warn!("📢️ Protocol error on connection #{}. {e}", self.id);
                            break Some(CloseReason::from(CloseCode::Protocol));
                        },
                        None => break None,
                    }
                },
                _ = heartbeat.tick() => {
                    if last_seen.elapsed() > CLIENT_TIMEOUT {
                        info!("📢️ Connection #{} timed out", self.id);
                        break None;
                    }
                    if self.session.ping(b"").await.is_err() {
                        break None;
                    }
                },
            }
        };
        self.hub.leave(self.id).await;
        debug!("📢️ Connection #{} closed", self.id);
        let _ = self.session.close(reason).await;
    }

    async fn send(&mut self, message: &ServerMessage) -> Result<(), actix_ws::Closed> {
        match serde_json::to_string(message) {
            Ok(json) => self.session.text(json).await,
            Err(e) => {
                error!("📢️ Could not serialize {message:?}. {e}");
                Ok(())
            },
        }
    }

    async fn handle_text(&mut self, text: &str) -> Result<(), actix_ws::Closed> {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(m) => m,
            Err(e) => {
                debug!("📢️ Unreadable message on connection #{}. {e}", self.id);
                return self.send(&ServerMessage::error(format!("Unrecognised message. {e}"))).await;
            },
        };
        match message {
            ClientMessage::JoinInvoiceRoom { invoice_id, token } => self.join(invoice_id, token).await,
            ClientMessage::LeaveInvoiceRoom { invoice_id } => {
                self.hub.leave_room(self.id, &invoice_id).await;
                Ok(())
            },
            ClientMessage::PaymentConfirmed { invoice_id } => self.relay_payment_claim(invoice_id).await,
        }
    }

    async fn join(&mut self, invoice_id: InvoiceId, token: Option<String>) -> Result<(), actix_ws::Closed> {
        if let Some(secret) = &self.options.room_token_secret {
            let authorised = token.map(|t| verify_room_token(secret.reveal(), &invoice_id, &t)).unwrap_or(false);
            if !authorised {
                warn!("🔐️ Connection #{} presented no valid token for room [{invoice_id}]", self.id);
                return self.send(&ServerMessage::error(format!("Not authorised to join room {invoice_id}"))).await;
            }
        }
        match self.hub.join(self.id, &invoice_id).await {
            Ok(_) => Ok(()),
            Err(e) => self.send(&ServerMessage::error(e.to_string())).await,
        }
    }

    /// Fans a client's payment claim out to the room, but only if the store agrees that the invoice is paid.
    async fn relay_payment_claim(&mut self, invoice_id: InvoiceId) -> Result<(), actix_ws::Closed> {
        match self.api.revalidate_payment_claim(&invoice_id).await {
            Ok(Some(event)) => {
                if let Some(message) = ServerMessage::for_event(&event) {
                    let report = self.hub.publish(&invoice_id, message).await;
                    debug!("📢️ Relayed payment claim for [{invoice_id}] from #{}. {report:?}", self.id);
                }
                Ok(())
            },
            Ok(None) => {
                warn!("📢️ Connection #{} claimed that unpaid invoice [{invoice_id}] was paid", self.id);
                self.send(&ServerMessage::error(format!("Invoice {invoice_id} has not been paid"))).await
            },
            Err(e) => self.send(&ServerMessage::error(e.to_string())).await,
        }
    }
}
