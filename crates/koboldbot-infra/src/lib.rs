//! Infrastructure layer for koboldbot.
//!
//! Implementations of the ports defined in `koboldbot-core`: SQLite storage
//! for characters and transcripts, the KoboldCpp streaming client, and the
//! configuration loader.

pub mod config;
pub mod kobold;
pub mod sqlite;

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures_util::{StreamExt, stream};

    use koboldbot_core::generation::backend::{GenerationBackend, TokenStream};
    use koboldbot_core::generation::box_backend::BoxGenerationBackend;
    use koboldbot_core::repository::character::CharacterRepository;
    use koboldbot_core::turn::registry::ActiveTurns;
    use koboldbot_core::turn::service::{TurnService, TurnUpdate};
    use koboldbot_types::character::{OwnerId, Turn};
    use koboldbot_types::config::BusyPolicy;
    use koboldbot_types::generation::{
        FinishReason, GenerateRequest, GenerationError, SamplingConfig,
    };
    use koboldbot_types::prompt::ConversationId;

    use crate::sqlite::character::SqliteCharacterRepository;
    use crate::sqlite::pool::{DatabasePool, database_url};

    /// Replays fixed tokens and remembers the prompt it was sent.
    struct ReplayBackend {
        tokens: Vec<&'static str>,
        prompt: Arc<Mutex<Option<String>>>,
    }

    impl GenerationBackend for ReplayBackend {
        fn name(&self) -> &str {
            "replay"
        }

        fn stream_tokens(&self, request: GenerateRequest) -> TokenStream {
            *self.prompt.lock().unwrap() = Some(request.prompt);
            let tokens: Vec<Result<String, GenerationError>> =
                self.tokens.iter().map(|t| Ok(t.to_string())).collect();
            stream::iter(tokens).boxed()
        }

        async fn probe_model(&self) -> Result<String, GenerationError> {
            Ok("replay/test".to_string())
        }
    }

    const DESCRIPTION: &str = "{{char}} is a phenomenal magician who is well versed in the fiery arts.";
    const PERSONA: &str = "appearance: cloak, wizard hat, staff, boots; personality: kind, wise, powerful";

    #[tokio::test]
    async fn monica_turn_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&database_url(&dir.path().join("kb.db")))
            .await
            .unwrap();
        let prompt = Arc::new(Mutex::new(None));
        let backend = ReplayBackend {
            tokens: vec!["Hi", " there", "!"],
            prompt: prompt.clone(),
        };
        let service = TurnService::new(
            SqliteCharacterRepository::new(pool.clone()),
            BoxGenerationBackend::new(backend),
            SamplingConfig::default(),
            ActiveTurns::new(BusyPolicy::Reject),
        );

        let owner = OwnerId::new("1001");
        let command = format!(
            "!add Monica\ndescription: {DESCRIPTION}\npline: {PERSONA}\nexamples:\n{{{{user}}}}: {{{{char}}}}, I'm cold.\n{{{{char}}}}: *casts fireball* There you go!"
        );
        let defined = service.define_character(&owner, &command).await.unwrap();
        assert_eq!(defined.name, "Monica");
        assert_eq!(defined.examples, 1);

        let updates: Vec<TurnUpdate> = service
            .run_turn(
                ConversationId::new("dm-1001"),
                owner.clone(),
                "Ann".to_string(),
                "Monica, hello".to_string(),
            )
            .map(|u| u.unwrap())
            .collect()
            .await;

        assert_eq!(updates.len(), 3);
        assert_eq!(
            updates[0],
            TurnUpdate::Started { character_name: "Monica".to_string() }
        );
        assert_eq!(updates[1], TurnUpdate::Progress("Hi there!".to_string()));
        match &updates[2] {
            TurnUpdate::Completed { text, exchange, reason } => {
                assert_eq!(text, "Hi there!");
                assert!(exchange.is_some());
                assert_eq!(*reason, FinishReason::BackendClosed);
            }
            other => panic!("unexpected update: {other:?}"),
        }

        let sent = prompt.lock().unwrap().clone().unwrap();
        assert!(sent.contains("Monica is a phenomenal magician who is well versed in the fiery arts."));
        assert!(sent.contains(PERSONA));
        assert!(sent.contains("Ann: Monica, I'm cold."));
        assert!(sent.trim_end().ends_with("Monica:"));
        assert!(sent.contains("Ann: Hello\n"));
        assert!(!sent.contains("Monica, hello"));

        let repo = service.repo();
        let monica = repo.resolve_character(&owner, None).await.unwrap();
        assert_eq!(
            repo.list_history(&monica.id).await.unwrap(),
            vec![Turn::new("Hello", "Hi there!")]
        );
        pool.close().await;
    }
}
