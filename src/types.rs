use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GameError;

/// Opaque ID types for type safety
pub type CharacterId = String;
pub type SessionToken = String;
pub type ConnectionId = String;

/// One of the three game variants, each with its own daily character
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Classic,
    Emoji,
    Splash,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Classic, Mode::Emoji, Mode::Splash];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Classic => "classic",
            Mode::Emoji => "emoji",
            Mode::Splash => "splash",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(Mode::Classic),
            "emoji" => Ok(Mode::Emoji),
            "splash" => Ok(Mode::Splash),
            other => Err(GameError::InvalidInput(format!("Unknown mode '{}'", other))),
        }
    }
}

/// A playable character. Loaded once from the catalog and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Character {
    /// Unique display name, doubles as the character id
    #[serde(alias = "name_ru")]
    pub name: CharacterId,
    pub gender: String,
    pub path: String,
    pub element: String,
    pub rarity: u8,
    pub patch: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub emoji_set: Vec<String>,
    #[serde(default)]
    pub splash_img_url: String,
}

/// A single attribute of a guessed character and whether it matches the target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeMatch<T> {
    pub value: T,
    pub matches: bool,
}

/// Per-attribute comparison of a guess against the daily character
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuessResult {
    pub name: String,
    pub avatar: String,
    /// Name matched the target
    pub solved: bool,
    pub gender: AttributeMatch<String>,
    pub path: AttributeMatch<String>,
    pub element: AttributeMatch<String>,
    pub rarity: AttributeMatch<u8>,
    pub patch: AttributeMatch<String>,
}

/// Autocomplete entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub name: String,
    pub avatar: String,
}

/// A chat message as stored and broadcast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentMessage {
    /// Order number; delivery order follows it
    pub seq: u64,
    /// RFC 3339 UTC receive time
    pub ts: String,
    /// Client-supplied content, opaque to the server
    pub payload: serde_json::Value,
}
