//! SQLite character repository implementation.
//!
//! Implements `CharacterRepository` from `koboldbot-core` using sqlx with
//! split read/write pools: raw queries, private Row structs, all writes on
//! the single-connection writer pool.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use koboldbot_core::repository::character::CharacterRepository;
use koboldbot_types::character::{
    Character, CharacterDefinition, CharacterId, ExchangeId, OwnerId, Turn,
};
use koboldbot_types::error::{RepositoryError, ResolveError};

use super::pool::DatabasePool;

/// Implicit-resolution order: messaged characters before never-messaged
/// ones, then most recently messaged, most recently updated, lowest id.
const RESOLUTION_ORDER: &str =
    "ORDER BY last_messaged_at IS NULL, last_messaged_at DESC, updated_at DESC, id ASC";

/// SQLite-backed implementation of `CharacterRepository`.
#[derive(Clone)]
pub struct SqliteCharacterRepository {
    pool: DatabasePool,
}

impl SqliteCharacterRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Total number of stored characters across all owners.
    pub async fn count_characters(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM character")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count as u64)
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct CharacterRow {
    id: String,
    owner_id: String,
    name: String,
    description: String,
    persona_line: String,
    examples_json: String,
    created_at: String,
    updated_at: String,
    last_messaged_at: Option<String>,
}

impl CharacterRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            persona_line: row.try_get("persona_line")?,
            examples_json: row.try_get("examples_json")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            last_messaged_at: row.try_get("last_messaged_at")?,
        })
    }

    fn into_character(self) -> Result<Character, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid character id: {e}")))?;
        let examples: Vec<Turn> = serde_json::from_str(&self.examples_json)
            .map_err(|e| RepositoryError::Query(format!("invalid examples_json: {e}")))?;

        Ok(Character {
            id: CharacterId(id),
            owner_id: OwnerId(self.owner_id),
            name: self.name,
            description: self.description,
            persona_line: self.persona_line,
            examples,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            last_messaged_at: self
                .last_messaged_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width RFC 3339 so that string order matches time order in SQL.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn rows_to_characters(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Character>, RepositoryError> {
    let mut characters = Vec::with_capacity(rows.len());
    for row in rows {
        let character_row = CharacterRow::from_row(row).map_err(query_error)?;
        characters.push(character_row.into_character()?);
    }
    Ok(characters)
}

// ---------------------------------------------------------------------------
// CharacterRepository implementation
// ---------------------------------------------------------------------------

impl CharacterRepository for SqliteCharacterRepository {
    async fn upsert_character(
        &self,
        definition: &CharacterDefinition,
    ) -> Result<CharacterId, RepositoryError> {
        let examples_json = serde_json::to_string(&definition.examples)
            .map_err(|e| RepositoryError::Query(format!("failed to encode examples: {e}")))?;
        let now = format_datetime(&Utc::now());

        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        sqlx::query("INSERT OR IGNORE INTO user (id) VALUES (?)")
            .bind(definition.owner_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        let id: String = sqlx::query_scalar(
            r#"INSERT INTO character (id, owner_id, name, description, persona_line, examples_json, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (owner_id, name) DO UPDATE SET
                   description = excluded.description,
                   persona_line = excluded.persona_line,
                   examples_json = excluded.examples_json,
                   updated_at = excluded.updated_at
               RETURNING id"#,
        )
        .bind(CharacterId::new().to_string())
        .bind(definition.owner_id.as_str())
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(&definition.persona_line)
        .bind(&examples_json)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;

        let id = id
            .parse::<CharacterId>()
            .map_err(|e| RepositoryError::Query(format!("invalid character id: {e}")))?;
        debug!(character_id = %id, owner = %definition.owner_id, name = %definition.name, "Character upserted");
        Ok(id)
    }

    async fn resolve_character(
        &self,
        owner: &OwnerId,
        name: Option<&str>,
    ) -> Result<Character, ResolveError> {
        let row = match name {
            Some(name) => {
                let row = sqlx::query("SELECT * FROM character WHERE owner_id = ? AND name = ?")
                    .bind(owner.as_str())
                    .bind(name)
                    .fetch_optional(&self.pool.reader)
                    .await
                    .map_err(query_error)?;
                row.ok_or_else(|| ResolveError::NotFound(name.to_string()))?
            }
            None => {
                let sql = format!("SELECT * FROM character WHERE owner_id = ? {RESOLUTION_ORDER} LIMIT 1");
                let row = sqlx::query(&sql)
                    .bind(owner.as_str())
                    .fetch_optional(&self.pool.reader)
                    .await
                    .map_err(query_error)?;
                row.ok_or(ResolveError::NoActiveCharacter)?
            }
        };

        let character_row = CharacterRow::from_row(&row).map_err(query_error)?;
        Ok(character_row.into_character()?)
    }

    async fn append_exchange(
        &self,
        character_id: &CharacterId,
        prompt: &str,
        response: &str,
    ) -> Result<ExchangeId, RepositoryError> {
        let id = ExchangeId::new();
        let now = format_datetime(&Utc::now());

        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let touched = sqlx::query("UPDATE character SET last_messaged_at = ? WHERE id = ?")
            .bind(&now)
            .bind(character_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        if touched.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            r#"INSERT INTO exchange (id, character_id, prompt, response, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(id.to_string())
        .bind(character_id.to_string())
        .bind(prompt)
        .bind(response)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;
        Ok(id)
    }

    async fn list_history(&self, character_id: &CharacterId) -> Result<Vec<Turn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT prompt, response FROM exchange WHERE character_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(character_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| -> Result<Turn, RepositoryError> {
                Ok(Turn {
                    prompt: row.try_get("prompt").map_err(query_error)?,
                    response: row.try_get("response").map_err(query_error)?,
                })
            })
            .collect()
    }

    async fn list_characters(&self, owner: &OwnerId) -> Result<Vec<Character>, RepositoryError> {
        let sql = format!("SELECT * FROM character WHERE owner_id = ? {RESOLUTION_ORDER}");
        let rows = sqlx::query(&sql)
            .bind(owner.as_str())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;
        rows_to_characters(&rows)
    }

    async fn delete_character(&self, owner: &OwnerId, name: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM character WHERE owner_id = ? AND name = ?")
            .bind(owner.as_str())
            .bind(name)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        debug!(owner = %owner, name, "Character deleted");
        Ok(())
    }

    async fn count_exchanges(&self, character_id: &CharacterId) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exchange WHERE character_id = ?")
            .bind(character_id.to_string())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;
        Ok(count as u64)
    }
}
