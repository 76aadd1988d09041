//! Error taxonomy shared by the game state, the stores and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::StoreError;
use crate::types::Mode;

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Catalog or persisted state is unusable; the mode cannot be served.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown session")]
    UnknownSession,

    /// The move was made against a round the session has already left
    #[error("The {0} round has ended, reload the puzzle")]
    RoundEnded(Mode),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl GameError {
    /// Stable machine-readable code, used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            GameError::Configuration(_) => "CONFIGURATION_ERROR",
            GameError::Persistence(_) => "PERSISTENCE_ERROR",
            GameError::InvalidInput(_) => "INVALID_INPUT",
            GameError::UnknownSession => "UNKNOWN_SESSION",
            GameError::RoundEnded(_) => "ROUND_ENDED",
            GameError::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            GameError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GameError::UnknownSession => StatusCode::UNAUTHORIZED,
            GameError::RoundEnded(_) => StatusCode::CONFLICT,
            GameError::Configuration(_) | GameError::Persistence(_) | GameError::Transport(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    msg: String,
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        let body = ErrorBody {
            code: self.code(),
            msg: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GameError::InvalidInput("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GameError::UnknownSession.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GameError::RoundEnded(Mode::Emoji).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GameError::Configuration("empty".into())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_converts_to_persistence() {
        let err: GameError = StoreError::Io(std::io::Error::other("disk full")).into();
        assert_eq!(err.code(), "PERSISTENCE_ERROR");
        assert!(err.to_string().contains("disk full"));
    }
}
