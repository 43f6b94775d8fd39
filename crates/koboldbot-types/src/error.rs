use thiserror::Error;

use crate::generation::GenerationError;

/// Example of a well-formed character-definition command, shown to users
/// whose command failed to parse.
pub const DEFINITION_EXAMPLE: &str = "```
!add Monica
description: {{char}} is a phenomenal magician who is well versed in the fiery arts.
pline: appearance: cloak, wizard hat, staff, boots; personality: kind, wise, powerful
examples:
{{user}}: {{char}}, I'm cold.
{{char}}: *casts fireball* There you go!
```";

/// Errors from repository operations (used by trait definitions in koboldbot-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Why a message could not be attributed to a character.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no character named '{0}'")]
    NotFound(String),

    #[error("no character has been talked to yet")]
    NoActiveCharacter,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Rejections of a character-definition command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("malformed character definition")]
    Syntax,

    #[error("examples block has {residual} unmatched characters")]
    InvalidExamples { residual: usize },
}

/// Failure of one chat turn, caught at the turn boundary.
///
/// Every variant is recoverable: the caller turns it into a user-visible
/// notice with [`TurnError::user_notice`] and carries on.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("validation error: {0}")]
    Validation(#[from] DefinitionError),

    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("talk target unknown: {0}")]
    TalkTargetUnknown(ResolveError),

    #[error("stream error: {0}")]
    Stream(#[from] GenerationError),

    #[error("a generation is already running in this conversation")]
    Busy,

    #[error("generation cancelled")]
    Cancelled,
}

impl From<ResolveError> for TurnError {
    fn from(err: ResolveError) -> Self {
        match err {
            // A storage failure during lookup is not the user's fault.
            ResolveError::Repository(e) => TurnError::Persistence(e),
            other => TurnError::TalkTargetUnknown(other),
        }
    }
}

impl TurnError {
    /// Text to show the user in place of the failed turn.
    pub fn user_notice(&self) -> String {
        match self {
            TurnError::Validation(DefinitionError::Syntax) => {
                format!("Invalid syntax. Example:\n{DEFINITION_EXAMPLE}")
            }
            TurnError::Validation(DefinitionError::InvalidExamples { .. }) => {
                "Invalid examples.".to_string()
            }
            TurnError::Persistence(_) => "Something went wrong saving that.".to_string(),
            TurnError::TalkTargetUnknown(_) => "Who are you talking to?".to_string(),
            TurnError::Stream(_) => "The story backend stopped responding.".to_string(),
            TurnError::Busy => "Hold on, I'm still answering the last message.".to_string(),
            TurnError::Cancelled => "(interrupted)".to_string(),
        }
    }

    /// Like [`TurnError::user_notice`], worded for a failed character
    /// definition.
    pub fn definition_notice(&self) -> String {
        match self {
            TurnError::Persistence(_) => "Failed to add character.".to_string(),
            other => other.user_notice(),
        }
    }
}
