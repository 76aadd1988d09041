use crate::error::GameError;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Messages a client may send on the comment channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    NewMessage { message: serde_json::Value },
}

/// Messages the server sends on the comment channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full history, sent once right after connecting
    History { messages: Vec<CommentMessage> },
    /// A comment someone just posted
    NewMessage { message: CommentMessage },
    /// Sent only to the client whose input was rejected
    Error { code: String, msg: String },
}

impl ServerMessage {
    pub fn error(err: &GameError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

/// Extract the comment payload from an inbound text frame.
///
/// A tagged `new_message` envelope is unwrapped; any other JSON value is
/// taken as the payload itself, which is what older clients send.
pub fn parse_comment_payload(text: &str) -> Result<serde_json::Value, GameError> {
    if let Ok(ClientMessage::NewMessage { message }) = serde_json::from_str::<ClientMessage>(text) {
        return Ok(message);
    }
    serde_json::from_str::<serde_json::Value>(text)
        .map_err(|e| GameError::InvalidInput(format!("Invalid message format: {}", e)))
}
