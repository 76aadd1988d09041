use crate::abuse::RateLimiter;
use crate::state::AppState;
use crate::types::Mode;
use std::sync::Arc;
use std::time::Duration;

/// Rotate every mode once per check so the day boundary (and the chat
/// clear that comes with it) happens even when nobody is playing.
/// A failing mode is logged and skipped; the modes that failed are returned.
pub async fn rotate_stale_modes(state: &AppState) -> Vec<Mode> {
    let mut failed = Vec::new();
    for mode in Mode::ALL {
        if let Err(e) = state.get_or_rotate(mode).await {
            tracing::error!(mode = %mode, "Daily rotation failed: {}", e);
            failed.push(mode);
        }
    }
    failed
}

/// Spawn a background task that keeps the daily selection current
pub fn spawn_daily_rollover(state: Arc<AppState>) {
    let interval = state.config.rollover_check_interval;
    tokio::spawn(async move {
        loop {
            rotate_stale_modes(&state).await;
            tokio::time::sleep(interval).await;
        }
    });
}

/// Spawn a background task that expires idle sessions
pub fn spawn_session_sweeper(state: Arc<AppState>) {
    let every = state.config.sweep_interval;
    let idle_ttl = state.config.session_idle_ttl;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            state.prune_idle_sessions(idle_ttl).await;
        }
    });
}

/// Spawn a background task that prunes stale rate limiter entries
pub fn spawn_rate_limiter_cleanup(limiter: RateLimiter, every: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            limiter.cleanup().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::state::test_support::test_state;
    use crate::store::GAME_STATE_DOC;
    use serde_json::json;

    #[tokio::test]
    async fn test_rollover_rotates_every_mode_without_players() {
        let (state, clock, _store) = test_state().await;
        assert!(rotate_stale_modes(&state).await.is_empty());
        state.post_comment(json!("from yesterday")).await.unwrap();

        clock.advance_days(1);
        assert!(rotate_stale_modes(&state).await.is_empty());

        for mode in Mode::ALL {
            let selection = state.peek_daily(mode).await.unwrap();
            assert_eq!(selection.selected_on, clock.today());
        }
        assert!(state.comments.is_empty().await);
    }

    #[tokio::test]
    async fn test_rollover_failure_in_one_mode_does_not_stop_others() {
        let (state, clock, store) = test_state().await;
        rotate_stale_modes(&state).await;
        let classic_before = state.peek_daily(Mode::Classic).await.unwrap();
        state.post_comment(json!("from yesterday")).await.unwrap();

        clock.advance_days(1);
        // Classic rotates first; only its state write fails
        store.fail_next_saves(GAME_STATE_DOC, 1);
        assert_eq!(rotate_stale_modes(&state).await, vec![Mode::Classic]);

        assert_eq!(state.peek_daily(Mode::Classic).await.unwrap(), classic_before);
        for mode in [Mode::Emoji, Mode::Splash] {
            assert_eq!(state.peek_daily(mode).await.unwrap().selected_on, clock.today());
        }
        assert!(state.comments.is_empty().await);

        // Next check picks the failed mode up
        assert!(rotate_stale_modes(&state).await.is_empty());
        assert_eq!(
            state.peek_daily(Mode::Classic).await.unwrap().selected_on,
            clock.today()
        );
    }

    #[tokio::test]
    async fn test_session_sweeper_expires_idle_sessions() {
        let (mut state, _clock, _store) = test_state().await;
        state.config.sweep_interval = Duration::from_millis(10);
        state.config.session_idle_ttl = Duration::from_millis(20);
        let state = Arc::new(state);
        state.create_session().await;

        spawn_session_sweeper(state.clone());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(state.session_count().await, 0);
    }
}
