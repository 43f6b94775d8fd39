//! Assembled prompt and conversation identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::character::{CharacterId, OwnerId};

/// A fully rendered prompt plus the bookkeeping needed to record the turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Text sent to the backend as the `prompt` field.
    pub text: String,
    pub owner_id: OwnerId,
    pub character_id: CharacterId,
    pub character_name: String,
    /// The user's message with any `<name>,` selector stripped. This, not
    /// `text`, is persisted as the exchange's prompt.
    pub user_text: String,
}

/// Identifies the conversation (channel, DM, terminal session) a turn runs in.
///
/// At most one generation is active per conversation at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
