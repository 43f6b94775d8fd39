//! Character, exchange, and owner types.
//!
//! A character is a persona owned by exactly one user. Its scripted examples
//! and its transcript (the exchanges appended after each completed turn) are
//! both ordered sequences of [`Turn`]s and are replayed verbatim when a
//! prompt is assembled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Opaque identity of the user who owns characters.
///
/// Supplied by the chat surface; nothing about its format is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a character, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    /// Create a new CharacterId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CharacterId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a persisted exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExchangeId(pub Uuid);

impl ExchangeId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExchangeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One (prompt, response) pair.
///
/// Used both for author-supplied scripted examples and for transcript
/// entries. Serialized as `{"prompt": ..., "response": ...}`, which is also
/// the element shape of the persisted `examples_json` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub prompt: String,
    pub response: String,
}

impl Turn {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
        }
    }
}

/// A persona owned by a single user.
///
/// `(owner_id, name)` is unique. `last_messaged_at` stays `None` until the
/// first exchange is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub owner_id: OwnerId,
    pub name: String,
    pub description: String,
    /// Short bracketed persona summary (appearance, personality, ...).
    pub persona_line: String,
    /// Scripted examples, replayed in this exact order ahead of the transcript.
    pub examples: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_messaged_at: Option<DateTime<Utc>>,
}

/// Input to a character upsert.
///
/// Produced by the definition-command parser; fully overwrites the
/// description, persona line and examples of an existing character with the
/// same owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDefinition {
    pub owner_id: OwnerId,
    pub name: String,
    pub description: String,
    pub persona_line: String,
    pub examples: Vec<Turn>,
}

/// One persisted turn of a character's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub id: ExchangeId,
    pub character_id: CharacterId,
    /// The stripped user text (never the rendered prompt).
    pub prompt: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl Exchange {
    pub fn turn(&self) -> Turn {
        Turn::new(self.prompt.clone(), self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_id_roundtrip() {
        let id = CharacterId::new();
        let parsed: CharacterId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_character_ids_are_time_ordered() {
        let first = CharacterId::new();
        let second = CharacterId::new();
        assert!(first < second);
    }

    #[test]
    fn test_turn_json_shape() {
        let turn = Turn::new("I'm cold.", "*casts fireball* There you go!");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["prompt"], "I'm cold.");
        assert_eq!(json["response"], "*casts fireball* There you go!");
    }

    #[test]
    fn test_examples_preserve_order_through_json() {
        let examples = vec![Turn::new("b", "2"), Turn::new("a", "1"), Turn::new("b", "2")];
        let json = serde_json::to_string(&examples).unwrap();
        let parsed: Vec<Turn> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, examples);
    }

    #[test]
    fn test_owner_id_display() {
        assert_eq!(OwnerId::new("1234").to_string(), "1234");
    }
}
