//! Turn service orchestrating one chat turn end to end.
//!
//! A turn claims the conversation slot, builds the prompt, streams the
//! generation and, on natural completion or token-budget cutoff, records the
//! exchange. Every failure ends the turn's stream with a [`TurnError`] and
//! leaves the transcript untouched.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use koboldbot_types::character::{CharacterId, ExchangeId, OwnerId};
use koboldbot_types::error::TurnError;
use koboldbot_types::generation::{
    FinishReason, GenerateRequest, GenerationError, GenerationEvent, SamplingConfig,
};
use koboldbot_types::prompt::ConversationId;

use crate::character::definition::parse_definition;
use crate::generation::box_backend::BoxGenerationBackend;
use crate::generation::stream::{GenerationEventStream, generate};
use crate::prompt::builder::PromptBuilder;
use crate::repository::character::CharacterRepository;
use crate::turn::recorder::ExchangeRecorder;
use crate::turn::registry::ActiveTurns;

/// Progress of one turn, in production order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnUpdate {
    /// The prompt was built; generation is starting.
    Started { character_name: String },
    /// Response text up to the latest sentence boundary.
    Progress(String),
    /// The generation finished. `exchange` is set when the response was
    /// recorded (it is not when the trimmed response is empty).
    Completed {
        text: String,
        exchange: Option<ExchangeId>,
        reason: FinishReason,
    },
}

/// Boxed stream of turn updates borrowed from a [`TurnService`].
pub type TurnStream<'a> = Pin<Box<dyn Stream<Item = Result<TurnUpdate, TurnError>> + Send + 'a>>;

/// A character stored by [`TurnService::define_character`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedCharacter {
    pub id: CharacterId,
    pub name: String,
    pub examples: usize,
}

/// Runs chat turns against a character repository and a generation backend.
///
/// Generic over `CharacterRepository` so koboldbot-core never depends on
/// koboldbot-infra.
pub struct TurnService<R: CharacterRepository> {
    repo: R,
    backend: BoxGenerationBackend,
    sampling: SamplingConfig,
    turns: ActiveTurns,
}

impl<R: CharacterRepository> TurnService<R> {
    pub fn new(
        repo: R,
        backend: BoxGenerationBackend,
        sampling: SamplingConfig,
        turns: ActiveTurns,
    ) -> Self {
        Self {
            repo,
            backend,
            sampling,
            turns,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn backend(&self) -> &BoxGenerationBackend {
        &self.backend
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    pub fn active_turns(&self) -> &ActiveTurns {
        &self.turns
    }

    /// Parse a definition command and upsert the character it describes.
    ///
    /// A rejected command mutates nothing.
    pub async fn define_character(
        &self,
        owner: &OwnerId,
        command: &str,
    ) -> Result<DefinedCharacter, TurnError> {
        let definition = parse_definition(owner, command)?;
        let id = self.repo.upsert_character(&definition).await?;

        info!(
            owner = %owner,
            character_id = %id,
            name = %definition.name,
            examples = definition.examples.len(),
            "Character defined"
        );

        Ok(DefinedCharacter {
            id,
            name: definition.name,
            examples: definition.examples.len(),
        })
    }

    /// Run one turn for `message` in `conversation`.
    ///
    /// Nothing happens until the stream is polled. Dropping the stream, or
    /// cancelling the conversation through [`ActiveTurns::cancel`], aborts
    /// the generation and closes the backend connection without recording
    /// anything.
    pub fn run_turn(
        &self,
        conversation: ConversationId,
        owner: OwnerId,
        display_name: String,
        message: String,
    ) -> TurnStream<'_> {
        Box::pin(async_stream::try_stream! {
            let guard = self.turns.acquire(&conversation)?;
            let cancel = guard.cancellation().clone();

            let prompt = PromptBuilder::new(&self.repo)
                .build(&message, &owner, &display_name)
                .await?;
            info!(
                conversation = %conversation,
                owner = %owner,
                character = %prompt.character_name,
                generation = guard.generation(),
                "Turn started"
            );
            yield TurnUpdate::Started {
                character_name: prompt.character_name.clone(),
            };

            let request = GenerateRequest::new(self.sampling.clone(), prompt.text.clone());
            let mut events = generate(&self.backend, request);

            let (text, reason) = loop {
                let next = next_event(&cancel, &mut events).await;
                if matches!(next, Err(TurnError::Cancelled)) {
                    info!(conversation = %conversation, "Turn cancelled");
                }
                match next? {
                    Some(GenerationEvent::Boundary(text)) => {
                        yield TurnUpdate::Progress(text);
                    }
                    Some(GenerationEvent::Finished { text, reason }) => break (text, reason),
                    None => {
                        warn!(conversation = %conversation, "Generation ended without completing");
                        Err::<(), _>(GenerationError::Stream("generation ended early".to_string()))?;
                    }
                }
            };
            drop(events);

            let exchange = ExchangeRecorder::new(&self.repo).record(&prompt, &text).await?;
            drop(guard);
            yield TurnUpdate::Completed { text, exchange, reason };
        })
    }
}

/// Next generation event, unless the turn is cancelled first.
async fn next_event(
    cancel: &CancellationToken,
    events: &mut GenerationEventStream,
) -> Result<Option<GenerationEvent>, TurnError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TurnError::Cancelled),
        event = events.next() => Ok(event.transpose()?),
    }
}
