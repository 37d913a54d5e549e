//! WebSocket handler for real-time delivery event streaming.
//!
//! The `/ws/events` endpoint upgrades an HTTP connection to a WebSocket.
//! Once connected, the handler:
//!
//! - **Forwards events:** subscribes to the engine's event bus and pushes
//!   every [`DeliveryEvent`] to the client as a JSON text frame. With
//!   `?run_id=<uuid>` only that run's events are forwarded.
//! - **Answers commands:** `{"type":"ping"}` gets `{"type":"pong"}`;
//!   `{"type":"status"}` gets the current status snapshot.
//!
//! Lagged receivers (when the client is too slow to keep up) skip the missed
//! events and continue. Disconnecting never affects the delivery run.
//!
//! [`DeliveryEvent`]: convoy_types::event::DeliveryEvent

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::state::AppState;

/// Query parameters of `/ws/events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Follow a single run instead of all of them.
    pub run_id: Option<Uuid>,
}

/// Incoming command from a WebSocket client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    /// Keep-alive ping. Server responds with `{"type":"pong"}`.
    Ping,
    /// Request a status snapshot.
    Status,
}

/// Upgrade an HTTP request to a WebSocket connection for delivery events.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, query.run_id))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState, run_id: Option<Uuid>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut event_rx = match run_id {
        Some(run_id) => state.engine.follow_run(run_id),
        None => state.engine.subscribe(),
    };
    tracing::debug!(run_id = ?event_rx.run_id(), "WebSocket connected");

    loop {
        tokio::select! {
            event_result = event_rx.recv() => {
                match event_result {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => {
                            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            tracing::warn!("Failed to serialize DeliveryEvent: {err}");
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "WebSocket subscriber lagged, skipping {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        if !process_command(&text, &mut ws_sender, &state).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                }
            }

            _ = state.shutdown.cancelled() => {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    tracing::debug!("WebSocket connection closed");
}

/// Handle one client frame. Returns `false` if the client is gone.
async fn process_command(
    text: &str,
    ws_sender: &mut SplitSink<WebSocket, Message>,
    state: &AppState,
) -> bool {
    let reply = match serde_json::from_str::<WsCommand>(text) {
        Ok(WsCommand::Ping) => json!({ "type": "pong" }),
        Ok(WsCommand::Status) => json!({
            "type": "status",
            "data": state.engine.status().await,
        }),
        Err(err) => {
            tracing::debug!("Ignoring unrecognized WebSocket command: {err}");
            return true;
        }
    };
    ws_sender
        .send(Message::Text(reply.to_string().into()))
        .await
        .is_ok()
}
