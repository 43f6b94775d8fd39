//! In-memory `CharacterRepository` used by the core unit tests.

use std::cmp::Ordering;
use std::sync::Mutex;
use std::sync::atomic::{self, AtomicBool};

use chrono::Utc;

use koboldbot_types::character::{
    Character, CharacterDefinition, CharacterId, Exchange, ExchangeId, OwnerId, Turn,
};
use koboldbot_types::error::{RepositoryError, ResolveError};

use super::character::CharacterRepository;

#[derive(Default)]
struct State {
    characters: Vec<Character>,
    exchanges: Vec<Exchange>,
}

#[derive(Default)]
pub struct InMemoryCharacterRepository {
    state: Mutex<State>,
    /// When set, every write fails with a query error.
    fail_writes: AtomicBool,
}

impl InMemoryCharacterRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, atomic::Ordering::SeqCst);
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.state.lock().unwrap().exchanges.clone()
    }

    fn check_write(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(atomic::Ordering::SeqCst) {
            Err(RepositoryError::Query("disk I/O error".to_string()))
        } else {
            Ok(())
        }
    }
}

fn resolution_order(a: &Character, b: &Character) -> Ordering {
    match (&a.last_messaged_at, &b.last_messaged_at) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.updated_at.cmp(&a.updated_at))
    .then_with(|| a.id.cmp(&b.id))
}

impl CharacterRepository for InMemoryCharacterRepository {
    async fn upsert_character(
        &self,
        definition: &CharacterDefinition,
    ) -> Result<CharacterId, RepositoryError> {
        self.check_write()?;
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = state
            .characters
            .iter_mut()
            .find(|c| c.owner_id == definition.owner_id && c.name == definition.name)
        {
            existing.description = definition.description.clone();
            existing.persona_line = definition.persona_line.clone();
            existing.examples = definition.examples.clone();
            existing.updated_at = now;
            return Ok(existing.id);
        }

        let id = CharacterId::new();
        state.characters.push(Character {
            id,
            owner_id: definition.owner_id.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            persona_line: definition.persona_line.clone(),
            examples: definition.examples.clone(),
            created_at: now,
            updated_at: now,
            last_messaged_at: None,
        });
        Ok(id)
    }

    async fn resolve_character(
        &self,
        owner: &OwnerId,
        name: Option<&str>,
    ) -> Result<Character, ResolveError> {
        let state = self.state.lock().unwrap();
        let mut owned: Vec<&Character> = state
            .characters
            .iter()
            .filter(|c| &c.owner_id == owner)
            .collect();

        match name {
            Some(name) => owned
                .into_iter()
                .find(|c| c.name == name)
                .cloned()
                .ok_or_else(|| ResolveError::NotFound(name.to_string())),
            None => {
                owned.sort_by(|a, b| resolution_order(a, b));
                owned
                    .first()
                    .map(|c| (*c).clone())
                    .ok_or(ResolveError::NoActiveCharacter)
            }
        }
    }

    async fn append_exchange(
        &self,
        character_id: &CharacterId,
        prompt: &str,
        response: &str,
    ) -> Result<ExchangeId, RepositoryError> {
        self.check_write()?;
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let character = state
            .characters
            .iter_mut()
            .find(|c| &c.id == character_id)
            .ok_or(RepositoryError::NotFound)?;
        character.last_messaged_at = Some(now);

        let id = ExchangeId::new();
        state.exchanges.push(Exchange {
            id,
            character_id: *character_id,
            prompt: prompt.to_string(),
            response: response.to_string(),
            created_at: now,
        });
        Ok(id)
    }

    async fn list_history(&self, character_id: &CharacterId) -> Result<Vec<Turn>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .exchanges
            .iter()
            .filter(|e| &e.character_id == character_id)
            .map(Exchange::turn)
            .collect())
    }

    async fn list_characters(&self, owner: &OwnerId) -> Result<Vec<Character>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut owned: Vec<Character> = state
            .characters
            .iter()
            .filter(|c| &c.owner_id == owner)
            .cloned()
            .collect();
        owned.sort_by(resolution_order);
        Ok(owned)
    }

    async fn delete_character(&self, owner: &OwnerId, name: &str) -> Result<(), RepositoryError> {
        self.check_write()?;
        let mut state = self.state.lock().unwrap();
        let position = state
            .characters
            .iter()
            .position(|c| &c.owner_id == owner && c.name == name)
            .ok_or(RepositoryError::NotFound)?;
        let removed = state.characters.remove(position);
        state.exchanges.retain(|e| e.character_id != removed.id);
        Ok(())
    }

    async fn count_exchanges(&self, character_id: &CharacterId) -> Result<u64, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .exchanges
            .iter()
            .filter(|e| &e.character_id == character_id)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str) -> CharacterDefinition {
        CharacterDefinition {
            owner_id: OwnerId::new("1"),
            name: name.to_string(),
            description: String::new(),
            persona_line: String::new(),
            examples: vec![],
        }
    }

    #[tokio::test]
    async fn test_fail_writes_toggles_write_errors() {
        let repo = InMemoryCharacterRepository::new();
        repo.set_fail_writes(true);
        let err = repo.upsert_character(&definition("Monica")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Query(_)));

        repo.set_fail_writes(false);
        let id = repo.upsert_character(&definition("Monica")).await.unwrap();
        let resolved = repo.resolve_character(&OwnerId::new("1"), None).await.unwrap();
        assert_eq!(resolved.id, id);
    }
}
