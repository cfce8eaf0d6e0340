//! WebSocket sessions
//!
//! Each upgraded connection is served by two tasks on its worker's runtime:
//! a reader that parses client commands and a writer that drains the
//! connection's outbox into the socket. Broadcasts reach the outbox through
//! the worker's subscription registry.
//!
//! Commands are JSON objects tagged by `action`:
//!
//! ```json
//! {"action": "subscribe", "topic": "mutation"}
//! {"action": "unsubscribe", "topic": "all"}
//! {"action": "subscriptions"}
//! ```
//!
//! Subscription changes run on the worker's event loop; the acknowledgement
//! is only sent once the change has been applied there.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::handler::TodoHandler;
use super::routes::AppState;
use crate::registry::topic;
use crate::registry::{Connection, ConnectionId, SubscriptionRegistry, OUTBOX_CAPACITY};
use crate::worker::LoopHandle;

/// Reply to a frame that is not JSON
pub const INVALID_FORMAT: &str = "Invalid message format";

/// Reply to JSON that is not a known command
pub const UNSUPPORTED_ACTION: &str = "Invalid request or unsupported action";

/// Query parameters accepted on upgrade
#[derive(Debug, Default, Deserialize)]
pub struct UpgradeParams {
    /// Opaque client token; stored with the connection, not verified
    pub token: Option<String>,
}

/// Client → server command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientCommand {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Subscriptions,
}

impl ClientCommand {
    /// Parse a text frame, returning the reply text on failure
    pub fn parse(text: &str) -> Result<Self, &'static str> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|_| INVALID_FORMAT)?;
        serde_json::from_value(value).map_err(|_| UNSUPPORTED_ACTION)
    }

    /// Apply to the registry and build the acknowledgement
    ///
    /// Runs on the owning loop.
    pub fn apply(self, registry: &mut SubscriptionRegistry, id: ConnectionId) -> String {
        match self {
            ClientCommand::Subscribe { topic } => match registry.subscribe(id, &topic) {
                Ok(_) if topic == topic::ALL => {
                    "Subscribed to all topics: query/mutation/random".to_string()
                }
                Ok(_) => format!("Subscribed to topic: {topic}"),
                Err(e) => e.to_string(),
            },
            ClientCommand::Unsubscribe { topic } => match registry.unsubscribe(id, &topic) {
                Ok(_) if topic == topic::ALL => {
                    "Unsubscribed to all topics: query/mutation/random".to_string()
                }
                Ok(_) => format!("Unsubscribed to topic: {topic}"),
                Err(e) => e.to_string(),
            },
            ClientCommand::Subscriptions => match registry.topics_of(id) {
                Ok(topics) => format!("Subscribed topics: {}", serde_json::json!(topics)),
                Err(e) => e.to_string(),
            },
        }
    }
}

/// Fallback handler: upgrade any unrouted request to a WebSocket
pub async fn upgrade<H: TodoHandler>(
    State(state): State<AppState<H>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    Query(params): Query<UpgradeParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let id = state.next_connection_id();
    let peer = peer.map(|ConnectInfo(addr)| addr);
    let local = state.local.clone();

    tracing::debug!(
        worker = local.index(),
        connection_id = id,
        peer = ?peer,
        "WebSocket upgrade"
    );

    ws.on_upgrade(move |socket| serve_connection(socket, local, id, params.token))
}

/// Serve one upgraded connection until either side closes it
pub async fn serve_connection(
    socket: WebSocket,
    local: LoopHandle,
    id: ConnectionId,
    token: Option<String>,
) {
    let worker = local.index();
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut outgoing) = mpsc::channel::<Arc<str>>(OUTBOX_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(payload) = outgoing.recv().await {
            if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
                tracing::debug!(connection_id = id, error = %e, "WebSocket write failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Greeting goes out before the connection can receive any broadcast
    let _ = outbox
        .send(Arc::from(format!("Connected to worker {worker}")))
        .await;

    let connection = Connection::new(id, outbox.clone()).with_auth_token(token);
    if let Err(e) = local.defer(move |registry| registry.attach(connection)) {
        tracing::warn!(worker, connection_id = id, error = %e, "Could not register connection");
        drop(outbox);
        let _ = writer.await;
        return;
    }

    tracing::info!(worker, connection_id = id, "WebSocket connected");

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(_) => {
                    let _ = outbox.send(Arc::from(INVALID_FORMAT)).await;
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(worker, connection_id = id, error = %e, "WebSocket read failed");
                break;
            }
        };

        let reply = handle_command(&local, id, &text).await;
        if outbox.send(Arc::from(reply)).await.is_err() {
            break;
        }
    }

    if let Err(e) = local.defer(move |registry| {
        registry.detach(id);
    }) {
        tracing::debug!(worker, connection_id = id, error = %e, "Detach skipped");
    }

    drop(outbox);
    let _ = writer.await;

    tracing::info!(worker, connection_id = id, "WebSocket closed");
}

async fn handle_command(local: &LoopHandle, id: ConnectionId, text: &str) -> String {
    let command = match ClientCommand::parse(text) {
        Ok(command) => command,
        Err(reply) => return reply.to_string(),
    };

    match local.call(move |registry| command.apply(registry, id)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(connection_id = id, error = %e, "Command not applied");
            UNSUPPORTED_ACTION.to_string()
        }
    }
}
