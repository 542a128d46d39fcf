use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use journal_autosave::SaveStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error};

use super::api::{ApiError, SharedState, authenticate};
use crate::store::EntrySummary;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    EntryCreated {
        entry: EntrySummary,
    },
    EntryUpdated {
        entry: EntrySummary,
    },
    EntryArchived {
        entry_id: String,
    },
    DraftStatus {
        draft_id: String,
        status: SaveStatus,
        label: String,
    },
    DraftSaved {
        draft_id: String,
        bytes: usize,
    },
    /// Toast channel: a save was rejected.
    SaveFailed {
        draft_id: String,
        message: String,
    },
}

/// A serialized `WsMessage` addressed to one user's sockets.
#[derive(Debug, Clone)]
pub struct WsEvent {
    pub owner_id: String,
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    /// Browsers cannot set headers on a WebSocket upgrade, so the bearer
    /// token may also arrive as `?token=`.
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = authenticate(&state, &headers, query.token.as_deref())?;
    let rx = state.ws_tx.subscribe();
    debug!(user_id = %identity.user_id, "WebSocket connected");
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, identity.user_id, rx))
        .into_response())
}

async fn handle_socket(socket: WebSocket, owner_id: String, rx: broadcast::Receiver<WsEvent>) {
    let (sender, receiver) = socket.split();
    run_socket_loop(sender, receiver, rx, &owner_id).await;
}

/// Core WebSocket loop with ping/pong keepalive.
///
/// Combines broadcast forwarding (only events for `owner_id`), client
/// message receiving, and periodic ping/pong health checking into a single
/// select loop. If no Pong is received within [`PONG_TIMEOUT`] after a Ping
/// is sent, the connection is considered dead and the loop exits.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<WsEvent>,
    owner_id: &str,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately; consume it so the first real
    // ping fires after PING_INTERVAL has elapsed.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(event) if event.owner_id == owner_id => {
                        if sender.send(Message::Text(event.payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Best-effort close frame
    let _ = sender.send(Message::Close(None)).await;
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Serialize and broadcast a WsMessage to the owner's connected sockets.
/// Returns silently even if no clients are connected.
pub fn broadcast_message(tx: &broadcast::Sender<WsEvent>, owner_id: &str, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(payload) => {
            let _ = tx.send(WsEvent {
                owner_id: owner_id.to_string(),
                payload,
            });
        }
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
