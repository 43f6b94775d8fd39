//! Persists completed turns.

use tracing::{debug, info};

use koboldbot_types::character::ExchangeId;
use koboldbot_types::error::RepositoryError;
use koboldbot_types::prompt::Prompt;

use crate::repository::character::CharacterRepository;

/// Appends a finished turn to the addressed character's transcript.
pub struct ExchangeRecorder<'a, R: CharacterRepository> {
    repo: &'a R,
}

impl<'a, R: CharacterRepository> ExchangeRecorder<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Record `(prompt.user_text, response)` unless the response is empty
    /// after trimming. Returns the id of the stored exchange, if any.
    pub async fn record(
        &self,
        prompt: &Prompt,
        response: &str,
    ) -> Result<Option<ExchangeId>, RepositoryError> {
        let response = response.trim();
        if response.is_empty() {
            debug!(character = %prompt.character_name, "Empty response, nothing recorded");
            return Ok(None);
        }

        let id = self
            .repo
            .append_exchange(&prompt.character_id, &prompt.user_text, response)
            .await?;
        info!(
            exchange_id = %id,
            character = %prompt.character_name,
            response_chars = response.len(),
            "Exchange recorded"
        );
        Ok(Some(id))
    }
}
