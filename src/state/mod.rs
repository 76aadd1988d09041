pub mod comments;
mod daily;
mod game;
mod session;

pub use daily::{DailySelection, DailyState};
pub use game::{ClassicOutcome, EmojiOutcome, PuzzleView, SplashOutcome};
pub use session::{CompletionFlags, ModeProgress, SessionEntry, SessionProgress};

use crate::abuse::RateLimiter;
use crate::catalog::CharacterCatalog;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::{GameError, GameResult};
use crate::hub::{CommentHub, Subscription};
use crate::store::DocumentStore;
use crate::types::*;
use comments::CommentHistory;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub catalog: Arc<CharacterCatalog>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    rng: Arc<std::sync::Mutex<StdRng>>,
    /// Per-mode daily selection; the mutex covers the whole rotation
    daily: Arc<Mutex<DailyState>>,
    pub comments: Arc<CommentHistory>,
    /// Live comment fan-out
    pub hub: CommentHub,
    sessions: Arc<RwLock<HashMap<SessionToken, SessionEntry>>>,
    /// Inbound comment rate limit, keyed by connection
    pub comment_limiter: RateLimiter,
}

impl AppState {
    /// Load catalog, daily state and comment history from `store`.
    ///
    /// Fails with `GameError::Configuration` when the catalog is missing or
    /// empty or the persisted state cannot be trusted.
    pub async fn load(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> GameResult<Self> {
        let catalog = CharacterCatalog::load(store.as_ref()).await?;
        let daily = DailyState::load(store.as_ref(), &catalog).await?;
        let comments =
            CommentHistory::load(store.clone(), clock.clone(), config.comment_history_limit).await?;

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            catalog: Arc::new(catalog),
            store,
            clock,
            rng: Arc::new(std::sync::Mutex::new(rng)),
            daily: Arc::new(Mutex::new(daily)),
            comments: Arc::new(comments),
            hub: CommentHub::new(config.broadcast_capacity),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            comment_limiter: RateLimiter::new(config.comment_rate_max, config.comment_rate_window),
            config,
        })
    }

    /// Register a comment connection and hand back its snapshot + receiver
    pub async fn join_comments(&self) -> GameResult<Subscription> {
        let connection_id = self.hub.connect().await;
        match self.hub.join(&connection_id, &self.comments).await {
            Ok(subscription) => Ok(subscription),
            Err(e) => {
                self.hub.disconnect(&connection_id).await;
                Err(e)
            }
        }
    }

    pub async fn leave_comments(&self, connection_id: &str) -> bool {
        self.hub.disconnect(connection_id).await
    }

    /// Validate, persist and broadcast a comment
    pub async fn post_comment(&self, payload: serde_json::Value) -> GameResult<CommentMessage> {
        if payload.is_null() {
            return Err(GameError::InvalidInput("Empty comment".to_string()));
        }
        let size = serde_json::to_vec(&payload)
            .map_err(|e| GameError::InvalidInput(format!("Unserializable comment: {}", e)))?
            .len();
        if size > self.config.comment_max_bytes {
            return Err(GameError::InvalidInput(format!(
                "Comment too large ({} bytes, max {})",
                size, self.config.comment_max_bytes
            )));
        }
        self.hub.publish(&self.comments, payload).await
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_without_catalog_fails() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        let result = AppState::load(test_config(), store, clock).await;
        assert!(matches!(result, Err(GameError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_post_comment_reaches_joined_clients() {
        let (state, _clock, _store) = test_state().await;
        let mut c1 = state.join_comments().await.unwrap();
        let mut c2 = state.join_comments().await.unwrap();
        assert!(c2.snapshot.is_empty());

        let posted = state
            .post_comment(json!({"author": "c1", "text": "hello"}))
            .await
            .unwrap();

        for sub in [&mut c1, &mut c2] {
            match sub.receiver.recv().await.unwrap() {
                crate::protocol::ServerMessage::NewMessage { message } => {
                    assert_eq!(message, posted)
                }
                other => panic!("Expected NewMessage, got {:?}", other),
            }
        }
        assert_eq!(state.hub.active_connections().await, 2);
        assert!(state.leave_comments(&c1.connection_id).await);
        assert!(!state.leave_comments(&c1.connection_id).await);
        assert_eq!(state.hub.active_connections().await, 1);
    }

    #[tokio::test]
    async fn test_post_comment_validation() {
        let (state, _clock, _store) = test_state().await;
        assert!(matches!(
            state.post_comment(serde_json::Value::Null).await,
            Err(GameError::InvalidInput(_))
        ));

        let huge = "x".repeat(state.config.comment_max_bytes + 1);
        assert!(matches!(
            state.post_comment(json!(huge)).await,
            Err(GameError::InvalidInput(_))
        ));
        assert!(state.comments.is_empty().await);
    }

    #[tokio::test]
    async fn test_rotation_clears_history_for_new_joiners() {
        let (state, clock, _store) = test_state().await;
        state.get_or_rotate(Mode::Classic).await.unwrap();
        state.post_comment(json!("yesterday")).await.unwrap();

        clock.advance_days(1);
        state.get_or_rotate(Mode::Emoji).await.unwrap();

        let sub = state.join_comments().await.unwrap();
        assert!(sub.snapshot.is_empty());
    }
}
