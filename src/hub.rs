//! Live fan-out of comments to every connected client.
//!
//! Delivery goes through one `tokio::sync::broadcast` channel. A publish
//! appends to the history and sends on the channel while holding the
//! history's write lock; a join snapshots the history and subscribes while
//! holding its read lock. Every message is therefore either in a joiner's
//! snapshot or in its receiver, never both and never neither.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::state::comments::CommentHistory;
use crate::types::{CommentMessage, ConnectionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// What a connection gets when it joins: the snapshot to send first, and
/// the receiver for everything published afterwards.
pub struct Subscription {
    pub connection_id: ConnectionId,
    pub snapshot: Vec<CommentMessage>,
    pub receiver: broadcast::Receiver<ServerMessage>,
}

#[derive(Clone)]
pub struct CommentHub {
    tx: broadcast::Sender<ServerMessage>,
    connections: Arc<RwLock<HashMap<ConnectionId, ConnectionState>>>,
}

impl CommentHub {
    /// `capacity` bounds how far a slow peer may fall behind before it is
    /// dropped; publishers never wait on peers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new connection in the `Connecting` state
    pub async fn connect(&self) -> ConnectionId {
        let id = ulid::Ulid::new().to_string();
        self.connections
            .write()
            .await
            .insert(id.clone(), ConnectionState::Connecting);
        tracing::debug!(connection = %id, "Comment connection registered");
        id
    }

    /// Snapshot the history and subscribe to live messages atomically,
    /// moving the connection to `Connected`.
    pub async fn join(
        &self,
        connection_id: &str,
        history: &CommentHistory,
    ) -> GameResult<Subscription> {
        let (snapshot, receiver) = history
            .read_with(|messages| (messages.to_vec(), self.tx.subscribe()))
            .await;

        let mut connections = self.connections.write().await;
        match connections.get_mut(connection_id) {
            Some(state) if *state == ConnectionState::Connecting => {
                *state = ConnectionState::Connected;
            }
            Some(_) => {
                return Err(GameError::Transport(format!(
                    "Connection {} already joined",
                    connection_id
                )));
            }
            None => {
                return Err(GameError::Transport(format!(
                    "Connection {} is not registered",
                    connection_id
                )));
            }
        }
        drop(connections);

        tracing::info!(
            connection = connection_id,
            history = snapshot.len(),
            "Comment connection joined"
        );

        Ok(Subscription {
            connection_id: connection_id.to_string(),
            snapshot,
            receiver,
        })
    }

    /// Append to the history, then fan out to every subscribed connection.
    pub async fn publish(
        &self,
        history: &CommentHistory,
        payload: serde_json::Value,
    ) -> GameResult<CommentMessage> {
        history
            .append_with(payload, |message| {
                // No receivers is fine: nobody is connected
                let receivers = self
                    .tx
                    .send(ServerMessage::NewMessage {
                        message: message.clone(),
                    })
                    .unwrap_or(0);
                tracing::debug!(seq = message.seq, receivers, "Comment broadcast");
            })
            .await
    }

    /// Remove a connection from the active set. Safe to call repeatedly;
    /// returns whether this call removed it.
    pub async fn disconnect(&self, connection_id: &str) -> bool {
        let removed = self.connections.write().await.remove(connection_id).is_some();
        if removed {
            tracing::info!(connection = connection_id, "Comment connection closed");
        }
        removed
    }

    pub async fn state_of(&self, connection_id: &str) -> ConnectionState {
        self.connections
            .read()
            .await
            .get(connection_id)
            .copied()
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Number of connections that completed their join
    pub async fn active_connections(&self) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|s| **s == ConnectionState::Connected)
            .count()
    }
}
