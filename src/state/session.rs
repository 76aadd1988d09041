//! Per-session game progress.
//!
//! A session is created fresh on login and dropped on logout or after
//! sitting idle past the configured expiry. Progress is
//! tracked per mode and tied to the daily round it was made in: once a
//! mode's character rotates, that mode's progress starts over.

use super::AppState;
use crate::error::{GameError, GameResult};
use crate::evaluate::names_match;
use crate::types::{GuessResult, Mode, SessionToken};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModeProgress {
    /// Solved in the current round; only a reset clears it
    pub completed: bool,
    /// Names already guessed, hidden from suggestions
    pub excluded_names: BTreeSet<String>,
    /// Round (selection date) this progress belongs to
    pub round: Option<NaiveDate>,
}

/// Completion flags for all modes, as shown on the home screen
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionFlags {
    pub classic: bool,
    pub emoji: bool,
    pub splash: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionProgress {
    pub classic: ModeProgress,
    pub emoji: ModeProgress,
    pub splash: ModeProgress,
    /// Classic guesses in submission order
    pub classic_history: Vec<GuessResult>,
}

impl SessionProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self, mode: Mode) -> &ModeProgress {
        match mode {
            Mode::Classic => &self.classic,
            Mode::Emoji => &self.emoji,
            Mode::Splash => &self.splash,
        }
    }

    fn mode_mut(&mut self, mode: Mode) -> &mut ModeProgress {
        match mode {
            Mode::Classic => &mut self.classic,
            Mode::Emoji => &mut self.emoji,
            Mode::Splash => &mut self.splash,
        }
    }

    pub fn mark_used(&mut self, mode: Mode, name: &str) {
        let name = name.trim();
        if name.is_empty() || self.is_used(mode, name) {
            return;
        }
        self.mode_mut(mode).excluded_names.insert(name.to_string());
    }

    pub fn is_used(&self, mode: Mode, name: &str) -> bool {
        self.mode(mode)
            .excluded_names
            .iter()
            .any(|used| names_match(used, name))
    }

    pub fn mark_completed(&mut self, mode: Mode) {
        self.mode_mut(mode).completed = true;
    }

    pub fn is_completed(&self, mode: Mode) -> bool {
        self.mode(mode).completed
    }

    pub fn completion(&self) -> CompletionFlags {
        CompletionFlags {
            classic: self.classic.completed,
            emoji: self.emoji.completed,
            splash: self.splash.completed,
        }
    }

    /// Bind a mode's progress to a round, resetting it when the round moved
    /// forward. Returns true when a reset happened.
    ///
    /// A round older than the one already bound is refused with
    /// `RoundEnded` and changes nothing.
    pub fn sync_round(&mut self, mode: Mode, round: NaiveDate) -> GameResult<bool> {
        let progress = self.mode_mut(mode);
        match progress.round {
            Some(current) if current == round => Ok(false),
            Some(current) if current > round => Err(GameError::RoundEnded(mode)),
            None => {
                progress.round = Some(round);
                Ok(false)
            }
            Some(_) => {
                *progress = ModeProgress {
                    round: Some(round),
                    ..ModeProgress::default()
                };
                if mode == Mode::Classic {
                    self.classic_history.clear();
                }
                Ok(true)
            }
        }
    }
}

/// Registry entry: a session's progress and when it was last used
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub progress: SessionProgress,
    last_seen: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            progress: SessionProgress::new(),
            last_seen: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

impl AppState {
    /// Start a session with fresh progress (login)
    pub async fn create_session(&self) -> (SessionToken, SessionProgress) {
        let token = ulid::Ulid::new().to_string();
        let entry = SessionEntry::new();
        let progress = entry.progress.clone();
        self.sessions.write().await.insert(token.clone(), entry);
        tracing::info!("Session created");
        (token, progress)
    }

    /// Drop a session (logout). Returns whether it existed.
    pub async fn end_session(&self, token: &str) -> bool {
        let removed = self.sessions.write().await.remove(token).is_some();
        if removed {
            tracing::info!("Session ended");
        }
        removed
    }

    /// Current progress of a session; counts as activity
    pub async fn session_progress(&self, token: &str) -> GameResult<SessionProgress> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(token).ok_or(GameError::UnknownSession)?;
        entry.touch();
        Ok(entry.progress.clone())
    }

    /// Apply `f` to a session's progress under the registry write lock.
    /// `f` must leave the progress untouched when it returns an error.
    pub(crate) async fn update_session<F, R>(&self, token: &str, f: F) -> GameResult<R>
    where
        F: FnOnce(&mut SessionProgress) -> GameResult<R>,
    {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(token).ok_or(GameError::UnknownSession)?;
        entry.touch();
        f(&mut entry.progress)
    }

    /// Drop sessions unused for longer than `idle_ttl` (expiry).
    /// Returns how many were dropped.
    pub async fn prune_idle_sessions(&self, idle_ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() <= idle_ttl);
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::info!(pruned, remaining = sessions.len(), "Expired idle sessions");
        }
        pruned
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
