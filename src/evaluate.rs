//! Guess scoring. Everything here is pure: no state, no I/O.

use crate::types::{AttributeMatch, Character, GuessResult};

/// Splash zoom handed out with a fresh puzzle
pub const INITIAL_ZOOM: u32 = 350;
/// Zoom removed per wrong splash guess
pub const ZOOM_STEP: u32 = 50;
/// Zoom never goes below this
pub const MIN_ZOOM: u32 = 100;
/// Splash crop offsets are drawn from `0..=MAX_OFFSET`
pub const MAX_OFFSET: u32 = 50;
/// Emoji puzzles start with one emoji revealed
pub const INITIAL_STEP: u32 = 1;

/// Case-insensitive, whitespace-trimmed name equality
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn attribute<T: PartialEq + Clone>(guess: &T, target: &T) -> AttributeMatch<T> {
    AttributeMatch {
        value: guess.clone(),
        matches: guess == target,
    }
}

/// Compare a guessed character against the target on every attribute
pub fn evaluate(guess: &Character, target: &Character) -> GuessResult {
    GuessResult {
        name: guess.name.clone(),
        avatar: guess.avatar_url.clone(),
        solved: names_match(&guess.name, &target.name),
        gender: attribute(&guess.gender, &target.gender),
        path: attribute(&guess.path, &target.path),
        element: attribute(&guess.element, &target.element),
        rarity: attribute(&guess.rarity, &target.rarity),
        patch: attribute(&guess.patch, &target.patch),
    }
}

/// Zoom after a wrong splash guess.
///
/// The echoed value is clamped into `[MIN_ZOOM, INITIAL_ZOOM]` first, so a
/// tampered request can neither re-blur the image nor go under the floor.
pub fn next_zoom(zoom: u32) -> u32 {
    zoom.clamp(MIN_ZOOM, INITIAL_ZOOM)
        .saturating_sub(ZOOM_STEP)
        .max(MIN_ZOOM)
}

/// Emoji step after a guess
pub fn next_step(step: u32, correct: bool) -> u32 {
    let step = step.max(INITIAL_STEP);
    if correct {
        step
    } else {
        step.saturating_add(1)
    }
}

/// Emojis visible at a given step
pub fn revealed_emojis(emoji_set: &[String], step: u32) -> Vec<String> {
    let shown = (step.max(INITIAL_STEP) as usize).min(emoji_set.len());
    emoji_set[..shown].to_vec()
}
