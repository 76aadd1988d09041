//! Real-time comment channel
//!
//! On connect the client gets `{type: "history"}` once, then every comment
//! anyone posts as `{type: "new_message"}`, in append order.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::error::GameError;
use crate::protocol::{parse_comment_payload, ServerMessage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session token; only used for rate limiting the upgrade
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::debug!(
        "Comment WebSocket request, has_token={}",
        params.token.is_some()
    );
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            None
        }
    }
}

/// Handle one comment connection until the peer leaves or fails
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let subscription = match state.join_comments().await {
        Ok(sub) => sub,
        Err(e) => {
            tracing::error!("Failed to join comment channel: {}", e);
            return;
        }
    };
    let connection_id = subscription.connection_id;
    let mut broadcast_rx = subscription.receiver;

    // Snapshot goes out before anything live
    let history = ServerMessage::History {
        messages: subscription.snapshot,
    };
    let delivered = match encode(&history) {
        Some(msg) => sender.send(msg).await.is_ok(),
        None => false,
    };

    if delivered {
        loop {
            tokio::select! {
                broadcast_msg = broadcast_rx.recv() => {
                    match broadcast_msg {
                        Ok(msg) => {
                            let Some(frame) = encode(&msg) else { continue };
                            if let Err(e) = sender.send(frame).await {
                                tracing::debug!(connection = %connection_id, "Send failed: {}", e);
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            // Peer can't keep up; drop it rather than hold up others
                            tracing::warn!(
                                connection = %connection_id,
                                skipped,
                                "Comment connection lagged, disconnecting"
                            );
                            break;
                        }
                        Err(RecvError::Closed) => break,
                    }
                }

                ws_msg = receiver.next() => {
                    match ws_msg {
                        Some(Ok(Message::Text(text))) => {
                            tracing::debug!(connection = %connection_id, "Received comment: {}", text.as_str());
                            if let Some(reply) = handle_inbound(&state, &connection_id, text.as_str()).await {
                                let Some(frame) = encode(&reply) else { continue };
                                if sender.send(frame).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::debug!(connection = %connection_id, "Peer closed");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(
                                connection = %connection_id,
                                "{}",
                                GameError::Transport(e.to_string())
                            );
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
    }

    state.leave_comments(&connection_id).await;
    state.comment_limiter.forget(&connection_id).await;
}

/// Process one inbound frame. Returns an error message for the sender only;
/// successful comments reach it through the broadcast like everyone else.
pub async fn handle_inbound(
    state: &AppState,
    connection_id: &str,
    text: &str,
) -> Option<ServerMessage> {
    if !state.comment_limiter.check(connection_id).await {
        tracing::warn!(connection = connection_id, "Comment rate limited");
        return Some(ServerMessage::Error {
            code: "RATE_LIMITED".to_string(),
            msg: "Too many comments, slow down".to_string(),
        });
    }

    let result = match parse_comment_payload(text) {
        Ok(payload) => state.post_comment(payload).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(message) => {
            tracing::debug!(connection = connection_id, seq = message.seq, "Comment posted");
            None
        }
        Err(e) => {
            tracing::warn!(connection = connection_id, "Comment rejected: {}", e);
            Some(ServerMessage::error(&e))
        }
    }
}
