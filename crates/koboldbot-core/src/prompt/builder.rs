//! Prompt assembly: selector parsing, character resolution, rendering.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use koboldbot_types::character::OwnerId;
use koboldbot_types::error::TurnError;
use koboldbot_types::prompt::Prompt;

use super::template::render_structure;
use crate::repository::character::CharacterRepository;

/// A leading `Name,` addressing a specific character.
static SELECTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+),\s*").expect("selector pattern is valid")
});

/// A message split into its optional character selector and the text that
/// will be sent and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressedMessage {
    pub selector: Option<String>,
    pub text: String,
}

/// Split an optional `Name,` selector off the start of a message.
///
/// The message is trimmed first. When a selector is present it is removed
/// together with the whitespace after the comma, and the first letter of the
/// remainder is capitalized. Without one, the trimmed message is kept as is.
pub fn parse_selector(message: &str) -> AddressedMessage {
    let message = message.trim();
    match SELECTOR.captures(message) {
        Some(caps) => {
            let matched = caps.get(0).map_or(0, |m| m.end());
            AddressedMessage {
                selector: caps.get(1).map(|m| m.as_str().to_string()),
                text: capitalize_first(&message[matched..]),
            }
        }
        None => AddressedMessage {
            selector: None,
            text: message.to_string(),
        },
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builds the backend prompt for a message from stored character state.
pub struct PromptBuilder<'a, R: CharacterRepository> {
    repo: &'a R,
}

impl<'a, R: CharacterRepository> PromptBuilder<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Resolve the addressed character and render the full prompt.
    ///
    /// `display_name` is the user's name as the chat surface shows it and
    /// replaces `{{user}}`. A failed lookup surfaces as
    /// [`TurnError::TalkTargetUnknown`] and no prompt is produced.
    pub async fn build(
        &self,
        message: &str,
        owner: &OwnerId,
        display_name: &str,
    ) -> Result<Prompt, TurnError> {
        let addressed = parse_selector(message);

        let character = self
            .repo
            .resolve_character(owner, addressed.selector.as_deref())
            .await?;
        let history = self.repo.list_history(&character.id).await?;

        debug!(
            owner = %owner,
            character = %character.name,
            explicit = addressed.selector.is_some(),
            examples = character.examples.len(),
            history = history.len(),
            "Assembling prompt"
        );

        let text = render_structure(
            &character.description,
            &character.persona_line,
            &character.examples,
            &history,
            &addressed.text,
        )
        .render(&character.name, display_name);

        Ok(Prompt {
            text,
            owner_id: owner.clone(),
            character_id: character.id,
            character_name: character.name,
            user_text: addressed.text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryCharacterRepository;
    use koboldbot_types::character::{CharacterDefinition, Turn};

    fn definition(owner: &OwnerId, name: &str) -> CharacterDefinition {
        CharacterDefinition {
            owner_id: owner.clone(),
            name: name.to_string(),
            description: format!("{{{{char}}}} is {name}."),
            persona_line: "kind".to_string(),
            examples: vec![Turn::new("{{char}}, hi.", "Hello {{user}}!")],
        }
    }

    #[test]
    fn test_selector_is_stripped_and_capitalized() {
        let addressed = parse_selector("  monica,   what's up?  ");
        assert_eq!(addressed.selector.as_deref(), Some("monica"));
        assert_eq!(addressed.text, "What's up?");
    }

    #[test]
    fn test_no_selector_keeps_trimmed_message() {
        let addressed = parse_selector("  hello there, friend ");
        assert_eq!(addressed.selector, None);
        assert_eq!(addressed.text, "hello there, friend");
    }

    #[test]
    fn test_selector_without_remainder() {
        let addressed = parse_selector("Monica,");
        assert_eq!(addressed.selector.as_deref(), Some("Monica"));
        assert_eq!(addressed.text, "");
    }

    #[test]
    fn test_selector_requires_leading_word() {
        assert_eq!(parse_selector("Hi Monica, how are you").selector, None);
        assert_eq!(parse_selector(", hi").selector, None);
    }

    #[tokio::test]
    async fn test_build_with_explicit_selector() {
        let repo = InMemoryCharacterRepository::new();
        let owner = OwnerId::new("42");
        let monica = repo.upsert_character(&definition(&owner, "Monica")).await.unwrap();
        repo.upsert_character(&definition(&owner, "Rex")).await.unwrap();

        let prompt = PromptBuilder::new(&repo)
            .build("Monica, hello", &owner, "alice")
            .await
            .unwrap();

        assert_eq!(prompt.character_id, monica);
        assert_eq!(prompt.character_name, "Monica");
        assert_eq!(prompt.user_text, "Hello");
        assert!(prompt.text.contains("Monica is Monica."));
        assert!(prompt.text.contains("alice: Monica, hi.\n\n### Response:\nMonica: Hello alice!"));
        assert!(prompt.text.ends_with("alice: Hello\n\n### Response:\nMonica:"));
    }

    #[tokio::test]
    async fn test_build_uses_most_recently_messaged() {
        let repo = InMemoryCharacterRepository::new();
        let owner = OwnerId::new("42");
        repo.upsert_character(&definition(&owner, "Monica")).await.unwrap();
        let rex = repo.upsert_character(&definition(&owner, "Rex")).await.unwrap();
        repo.append_exchange(&rex, "Sit.", "*sits*").await.unwrap();

        let prompt = PromptBuilder::new(&repo)
            .build("good boy", &owner, "alice")
            .await
            .unwrap();

        assert_eq!(prompt.character_name, "Rex");
        assert_eq!(prompt.user_text, "good boy");
        assert!(prompt.text.contains(
            "alice: Sit.\n\n### Response:\nRex: *sits*\n\n\n### Instruction:\nalice: good boy"
        ));
    }

    #[tokio::test]
    async fn test_unknown_selector_is_talk_target_unknown() {
        let repo = InMemoryCharacterRepository::new();
        let owner = OwnerId::new("42");
        repo.upsert_character(&definition(&owner, "Monica")).await.unwrap();

        let err = PromptBuilder::new(&repo)
            .build("Zed, hi", &owner, "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::TalkTargetUnknown(_)));
        assert_eq!(err.user_notice(), "Who are you talking to?");
    }

    #[tokio::test]
    async fn test_owner_without_characters_is_talk_target_unknown() {
        let repo = InMemoryCharacterRepository::new();
        let err = PromptBuilder::new(&repo)
            .build("hi", &OwnerId::new("nobody"), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::TalkTargetUnknown(_)));
    }

    #[tokio::test]
    async fn test_other_owners_characters_are_invisible() {
        let repo = InMemoryCharacterRepository::new();
        repo.upsert_character(&definition(&OwnerId::new("1"), "Monica"))
            .await
            .unwrap();

        let err = PromptBuilder::new(&repo)
            .build("Monica, hi", &OwnerId::new("2"), "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::TalkTargetUnknown(_)));
    }
}
