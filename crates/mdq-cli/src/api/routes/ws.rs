//! Progress push channel over WebSocket.
//!
//! Each connection attaches one broadcaster subscriber and receives every
//! event published after it connected, one JSON text message per event:
//!
//! ```json
//! {"type":"progress","job_id":"dl_…","progress":42}
//! {"type":"complete","job_id":"dl_…","state":"failed","progress":42,"error":{…}}
//! ```
//!
//! Client text messages are ignored. A Ping goes out every 30 seconds and a
//! client that never answers it is dropped at the next tick. Connections are
//! closed when the server shuts down.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};

use crate::api::server::AppState;

const HEARTBEAT_INTERVAL_SECS: u64 = 30;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(progress_ws))
}

async fn progress_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut subscription = state.orchestrator.subscribe();
    let subscriber = subscription.id();
    tracing::debug!(subscriber, "websocket client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    // The first tick completes immediately.
    heartbeat.tick().await;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => awaiting_pong = false,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(subscriber, "websocket error: {}", e);
                        break;
                    }
                }
            }

            event = subscription.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("encode progress event: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            _ = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }

            _ = heartbeat.tick() => {
                if awaiting_pong {
                    tracing::debug!(subscriber, "no pong from websocket client, closing");
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }
        }
    }

    tracing::debug!(subscriber, "websocket client disconnected");
}
