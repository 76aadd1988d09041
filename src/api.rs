//! HTTP API endpoints for sessions, puzzles, guesses and search.
//!
//! Rendering lives in the frontend; these handlers only return JSON.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{GameError, GameResult};
use crate::evaluate::INITIAL_STEP;
use crate::state::{
    AppState, ClassicOutcome, EmojiOutcome, PuzzleView, SessionProgress, SplashOutcome,
};
use crate::types::{CommentMessage, Mode, Suggestion};

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    pub token: Option<String>,
}

fn default_mode() -> String {
    Mode::Classic.as_str().to_string()
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub progress: SessionProgress,
}

#[derive(Debug, Deserialize)]
pub struct ClassicGuess {
    pub token: String,
    pub character: String,
}

#[derive(Debug, Deserialize)]
pub struct EmojiGuess {
    pub token: String,
    pub guess: String,
    #[serde(default = "default_step")]
    pub step: u32,
}

fn default_step() -> u32 {
    INITIAL_STEP
}

#[derive(Debug, Deserialize)]
pub struct SplashGuess {
    pub token: String,
    pub guess: String,
    pub zoom: u32,
    #[serde(default)]
    pub offset_x: u32,
    #[serde(default)]
    pub offset_y: u32,
}

/// Outcome of any guess, tagged by mode
#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GuessResponse {
    Classic(ClassicOutcome),
    Emoji(EmojiOutcome),
    Splash(SplashOutcome),
}

/// Start a session with fresh progress.
///
/// POST /api/session
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SessionResponse>) {
    let (token, progress) = state.create_session().await;
    (StatusCode::CREATED, Json(SessionResponse { token, progress }))
}

/// End a session. Ending an unknown session is not an error.
///
/// DELETE /api/session?token=
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TokenQuery>,
) -> StatusCode {
    state.end_session(&params.token).await;
    StatusCode::NO_CONTENT
}

/// GET /api/progress?token=
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TokenQuery>,
) -> GameResult<Json<SessionProgress>> {
    Ok(Json(state.session_progress(&params.token).await?))
}

/// Autocomplete character names.
///
/// GET /api/search_characters?query=&mode=&token=
pub async fn search_characters(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> GameResult<Json<Vec<Suggestion>>> {
    let mode: Mode = params.mode.parse()?;
    let results = state
        .search_suggestions(params.token.as_deref(), mode, &params.query)
        .await;
    Ok(Json(results))
}

/// Today's puzzle for a mode.
///
/// GET /api/{mode}?token=
pub async fn open_puzzle(
    State(state): State<Arc<AppState>>,
    Path(mode): Path<String>,
    Query(params): Query<TokenQuery>,
) -> GameResult<Json<PuzzleView>> {
    let mode: Mode = mode.parse()?;
    Ok(Json(state.open_puzzle(&params.token, mode).await?))
}

fn body_for<T: serde::de::DeserializeOwned>(mode: Mode, body: serde_json::Value) -> GameResult<T> {
    serde_json::from_value(body)
        .map_err(|e| GameError::InvalidInput(format!("Malformed {} guess: {}", mode, e)))
}

/// Submit a guess.
///
/// POST /api/{mode}/guess
pub async fn submit_guess(
    State(state): State<Arc<AppState>>,
    Path(mode): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> GameResult<Json<GuessResponse>> {
    let mode: Mode = mode.parse()?;
    let response = match mode {
        Mode::Classic => {
            let guess: ClassicGuess = body_for(mode, body)?;
            GuessResponse::Classic(state.guess_classic(&guess.token, &guess.character).await?)
        }
        Mode::Emoji => {
            let guess: EmojiGuess = body_for(mode, body)?;
            GuessResponse::Emoji(
                state
                    .guess_emoji(&guess.token, &guess.guess, guess.step)
                    .await?,
            )
        }
        Mode::Splash => {
            let guess: SplashGuess = body_for(mode, body)?;
            GuessResponse::Splash(
                state
                    .guess_splash(
                        &guess.token,
                        &guess.guess,
                        guess.zoom,
                        guess.offset_x,
                        guess.offset_y,
                    )
                    .await?,
            )
        }
    };
    Ok(Json(response))
}

/// Replay of the current comment history.
///
/// GET /api/comments
pub async fn list_comments(State(state): State<Arc<AppState>>) -> Json<Vec<CommentMessage>> {
    Json(state.comments.list().await)
}

/// All JSON routes, mounted under `/api`
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session", post(create_session).delete(end_session))
        .route("/progress", get(get_progress))
        .route("/search_characters", get(search_characters))
        .route("/comments", get(list_comments))
        .route("/{mode}", get(open_puzzle))
        .route("/{mode}/guess", post(submit_guess))
}
