//! Game moves: opening a puzzle, guessing, and autocomplete.
//!
//! Every move validates its input before touching the session, so a
//! rejected guess leaves progress exactly as it was.

use super::session::{CompletionFlags, SessionProgress};
use super::AppState;
use crate::error::{GameError, GameResult};
use crate::evaluate::{self, INITIAL_STEP, INITIAL_ZOOM, MAX_OFFSET, MIN_ZOOM};
use crate::types::{GuessResult, Mode, Suggestion};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Starting view of a puzzle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PuzzleView {
    Classic {
        history: Vec<GuessResult>,
        done: bool,
        progress: CompletionFlags,
    },
    Emoji {
        emojis: Vec<String>,
        step: u32,
        done: bool,
        progress: CompletionFlags,
    },
    Splash {
        splash: String,
        zoom: u32,
        offset_x: u32,
        offset_y: u32,
        done: bool,
        progress: CompletionFlags,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassicOutcome {
    pub result: GuessResult,
    pub history: Vec<GuessResult>,
    pub done: bool,
    pub progress: CompletionFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmojiOutcome {
    pub guess: String,
    pub correct: bool,
    pub step: u32,
    pub emojis: Vec<String>,
    pub done: bool,
    pub progress: CompletionFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplashOutcome {
    pub guess: String,
    pub correct: bool,
    pub splash: String,
    pub zoom: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub done: bool,
    pub progress: CompletionFlags,
}

fn require_guess(guess: &str) -> GameResult<&str> {
    let guess = guess.trim();
    if guess.is_empty() {
        return Err(GameError::InvalidInput("Guess must not be empty".to_string()));
    }
    Ok(guess)
}

impl AppState {
    /// Today's puzzle for `mode`, as the session should first see it
    pub async fn open_puzzle(&self, token: &str, mode: Mode) -> GameResult<PuzzleView> {
        // Fail fast on unknown sessions before a rotation can be triggered
        self.session_progress(token).await?;
        let selection = self.get_or_rotate(mode).await?;

        let progress = self
            .update_session(token, |progress| {
                progress.sync_round(mode, selection.selected_on)?;
                Ok(progress.clone())
            })
            .await?;
        let done = progress.is_completed(mode);
        let flags = progress.completion();

        let view = match mode {
            Mode::Classic => PuzzleView::Classic {
                history: progress.classic_history,
                done,
                progress: flags,
            },
            Mode::Emoji => PuzzleView::Emoji {
                emojis: evaluate::revealed_emojis(&selection.character.emoji_set, INITIAL_STEP),
                step: INITIAL_STEP,
                done,
                progress: flags,
            },
            Mode::Splash => {
                let (offset_x, offset_y) = {
                    let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
                    (
                        rng.random_range(0..=MAX_OFFSET),
                        rng.random_range(0..=MAX_OFFSET),
                    )
                };
                PuzzleView::Splash {
                    splash: selection.character.splash_img_url.clone(),
                    zoom: INITIAL_ZOOM,
                    offset_x,
                    offset_y,
                    done,
                    progress: flags,
                }
            }
        };
        Ok(view)
    }

    /// Classic guess: the name must be a catalog character
    pub async fn guess_classic(&self, token: &str, name: &str) -> GameResult<ClassicOutcome> {
        let name = require_guess(name)?;
        self.session_progress(token).await?;
        let selection = self.get_or_rotate(Mode::Classic).await?;

        let guessed = self
            .catalog
            .find(name)
            .ok_or_else(|| GameError::InvalidInput(format!("Unknown character '{}'", name)))?;
        let result = evaluate::evaluate(guessed, &selection.character);

        let progress = self
            .update_session(token, |progress| {
                progress.sync_round(Mode::Classic, selection.selected_on)?;
                progress.classic_history.push(result.clone());
                if result.solved {
                    progress.mark_completed(Mode::Classic);
                } else {
                    progress.mark_used(Mode::Classic, &guessed.name);
                }
                Ok(progress.clone())
            })
            .await?;

        tracing::debug!(guess = %guessed.name, solved = result.solved, "Classic guess");
        Ok(ClassicOutcome {
            result,
            done: progress.is_completed(Mode::Classic),
            progress: progress.completion(),
            history: progress.classic_history,
        })
    }

    /// Emoji guess; `step` is the caller's current reveal step
    pub async fn guess_emoji(&self, token: &str, guess: &str, step: u32) -> GameResult<EmojiOutcome> {
        let guess = require_guess(guess)?;
        self.session_progress(token).await?;
        let selection = self.get_or_rotate(Mode::Emoji).await?;

        let correct = evaluate::names_match(guess, &selection.character.name);
        let step = evaluate::next_step(step, correct);
        let recorded = self.recorded_name(guess);

        let progress = self
            .update_session(token, |progress| {
                record_text_guess(progress, Mode::Emoji, selection.selected_on, &recorded, correct)
            })
            .await?;

        tracing::debug!(correct, step, "Emoji guess");
        Ok(EmojiOutcome {
            guess: guess.to_string(),
            correct,
            step,
            emojis: evaluate::revealed_emojis(&selection.character.emoji_set, step),
            done: progress.is_completed(Mode::Emoji),
            progress: progress.completion(),
        })
    }

    /// Splash guess; zoom and offsets are the caller's current view
    pub async fn guess_splash(
        &self,
        token: &str,
        guess: &str,
        zoom: u32,
        offset_x: u32,
        offset_y: u32,
    ) -> GameResult<SplashOutcome> {
        let guess = require_guess(guess)?;
        self.session_progress(token).await?;
        let selection = self.get_or_rotate(Mode::Splash).await?;

        let correct = evaluate::names_match(guess, &selection.character.name);
        let zoom = if correct {
            zoom.clamp(MIN_ZOOM, INITIAL_ZOOM)
        } else {
            evaluate::next_zoom(zoom)
        };
        let recorded = self.recorded_name(guess);

        let progress = self
            .update_session(token, |progress| {
                record_text_guess(progress, Mode::Splash, selection.selected_on, &recorded, correct)
            })
            .await?;

        tracing::debug!(correct, zoom, "Splash guess");
        Ok(SplashOutcome {
            guess: guess.to_string(),
            correct,
            splash: selection.character.splash_img_url.clone(),
            zoom,
            offset_x: offset_x.min(MAX_OFFSET),
            offset_y: offset_y.min(MAX_OFFSET),
            done: progress.is_completed(Mode::Splash),
            progress: progress.completion(),
        })
    }

    /// Autocomplete over the catalog, hiding names the session already used
    /// in `mode`. Without a session nothing is hidden.
    pub async fn search_suggestions(
        &self,
        token: Option<&str>,
        mode: Mode,
        prefix: &str,
    ) -> Vec<Suggestion> {
        let progress = match token {
            Some(token) => self.session_progress(token).await.ok(),
            None => None,
        };
        self.catalog.suggestions(prefix, |name| {
            progress
                .as_ref()
                .is_some_and(|p| p.is_used(mode, name))
        })
    }

    /// Catalog spelling of a free-text guess when it names a character
    fn recorded_name(&self, guess: &str) -> String {
        self.catalog
            .find(guess)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| guess.to_string())
    }
}

fn record_text_guess(
    progress: &mut SessionProgress,
    mode: Mode,
    round: chrono::NaiveDate,
    name: &str,
    correct: bool,
) -> GameResult<SessionProgress> {
    progress.sync_round(mode, round)?;
    if correct {
        progress.mark_completed(mode);
    } else {
        progress.mark_used(mode, name);
    }
    Ok(progress.clone())
}
