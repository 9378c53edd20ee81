use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use super::{MetricsError, SnapshotPublisher, Snapshot};
use crate::AppState;

// ─── Wire messages ───────────────────────────────────────────────

/// Frames pushed to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage<'a> {
    Stats(&'a Snapshot),
}

/// Frames the client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientMessage {
    RequestStats,
}

impl ServerMessage<'_> {
    pub fn encode(&self) -> Result<String, MetricsError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ClientMessage {
    /// Accepts `{"event":"requestStats"}` or the bare event name.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "requestStats" => Some(Self::RequestStats),
            other => serde_json::from_str(other).ok(),
        }
    }
}

// ─── GET /ws ─────────────────────────────────────────────────────
/// WebSocket push channel. The client gets a snapshot on connect, on every
/// publisher tick, and whenever it sends `requestStats`.

pub async fn metrics_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let publisher = state.publisher.clone();
    ws.on_upgrade(move |socket| serve_subscriber(socket, publisher))
}

async fn serve_subscriber(mut socket: WebSocket, publisher: Arc<SnapshotPublisher>) {
    let mut subscription = publisher.subscribe();
    let id = subscription.id();
    info!(%id, "client connected");

    loop {
        tokio::select! {
            update = subscription.next() => {
                // Publisher closed: server is shutting down
                let Some(snapshot) = update else {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                let frame = match ServerMessage::Stats(&snapshot).encode() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(%id, error = %e, "skipping snapshot frame");
                        continue;
                    }
                };
                if socket.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match ClientMessage::parse(&text) {
                    Some(ClientMessage::RequestStats) => {
                        subscription.request();
                    }
                    None => debug!(%id, "ignoring unknown client message"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(%id, error = %e, "socket error");
                    break;
                }
            },
        }
    }

    // Deregisters before the log line so counts are accurate
    drop(subscription);
    info!(%id, "client disconnected");
}
