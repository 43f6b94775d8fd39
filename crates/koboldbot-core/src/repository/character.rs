//! CharacterRepository trait definition.
//!
//! Durable CRUD for characters and their append-only exchange history.

use koboldbot_types::character::{
    Character, CharacterDefinition, CharacterId, ExchangeId, OwnerId, Turn,
};
use koboldbot_types::error::{RepositoryError, ResolveError};

/// Repository trait for character and transcript persistence.
///
/// Implementations live in koboldbot-infra (e.g., `SqliteCharacterRepository`).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CharacterRepository: Send + Sync {
    /// Insert a character, or overwrite description, persona line and
    /// examples of the existing `(owner, name)` character. The transcript is
    /// never touched. Returns the (stable) character id.
    fn upsert_character(
        &self,
        definition: &CharacterDefinition,
    ) -> impl std::future::Future<Output = Result<CharacterId, RepositoryError>> + Send;

    /// Pick the character a message addresses.
    ///
    /// With `name`, the owner's character of exactly that name
    /// ([`ResolveError::NotFound`] otherwise). Without, the owner's most
    /// recently messaged character ([`ResolveError::NoActiveCharacter`] if
    /// the owner has none).
    fn resolve_character(
        &self,
        owner: &OwnerId,
        name: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Character, ResolveError>> + Send;

    /// Append one exchange and bump the character's last-messaged timestamp.
    fn append_exchange(
        &self,
        character_id: &CharacterId,
        prompt: &str,
        response: &str,
    ) -> impl std::future::Future<Output = Result<ExchangeId, RepositoryError>> + Send;

    /// The character's transcript, oldest first.
    fn list_history(
        &self,
        character_id: &CharacterId,
    ) -> impl std::future::Future<Output = Result<Vec<Turn>, RepositoryError>> + Send;

    /// All characters of an owner, in implicit-resolution order.
    fn list_characters(
        &self,
        owner: &OwnerId,
    ) -> impl std::future::Future<Output = Result<Vec<Character>, RepositoryError>> + Send;

    /// Delete a character and (by cascade) its transcript.
    fn delete_character(
        &self,
        owner: &OwnerId,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Number of exchanges in a character's transcript.
    fn count_exchanges(
        &self,
        character_id: &CharacterId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
