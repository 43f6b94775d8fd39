//! Per-conversation registry of running generations.
//!
//! At most one generation is active per conversation. A second turn in the
//! same conversation is rejected or replaces the running one, depending on
//! the configured [`BusyPolicy`]. Slots are released by [`TurnGuard`] on
//! drop; a guard never clears a slot that a newer generation has taken.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use koboldbot_types::config::BusyPolicy;
use koboldbot_types::error::TurnError;
use koboldbot_types::prompt::ConversationId;

#[derive(Debug, Clone)]
struct ActiveTurn {
    generation: u64,
    cancellation: CancellationToken,
}

/// Shared table of active generations, keyed by conversation.
///
/// Cloning produces a shared view of the same table.
#[derive(Debug, Clone)]
pub struct ActiveTurns {
    inner: Arc<DashMap<ConversationId, ActiveTurn>>,
    next_generation: Arc<AtomicU64>,
    policy: BusyPolicy,
}

impl ActiveTurns {
    pub fn new(policy: BusyPolicy) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            next_generation: Arc::new(AtomicU64::new(1)),
            policy,
        }
    }

    pub fn policy(&self) -> BusyPolicy {
        self.policy
    }

    /// Claim the conversation's slot for a new generation.
    ///
    /// Fails with [`TurnError::Busy`] under [`BusyPolicy::Reject`] when a
    /// generation is already running. Under [`BusyPolicy::Replace`] the
    /// running generation is cancelled and the slot handed over.
    pub fn acquire(&self, conversation: &ConversationId) -> Result<TurnGuard, TurnError> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancellation = CancellationToken::new();
        let turn = ActiveTurn {
            generation,
            cancellation: cancellation.clone(),
        };

        match self.inner.entry(conversation.clone()) {
            Entry::Occupied(mut occupied) => {
                let running = occupied.get();
                if self.policy == BusyPolicy::Reject && !running.cancellation.is_cancelled() {
                    debug!(conversation = %conversation, "Turn rejected, generation in progress");
                    return Err(TurnError::Busy);
                }
                running.cancellation.cancel();
                info!(
                    conversation = %conversation,
                    replaced = running.generation,
                    generation,
                    "Replacing running generation"
                );
                occupied.insert(turn);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(turn);
            }
        }

        Ok(TurnGuard {
            turns: self.inner.clone(),
            conversation: conversation.clone(),
            generation,
            cancellation,
        })
    }

    /// Cancel the conversation's running generation, if any.
    ///
    /// Returns whether a generation was signalled. The slot itself is freed
    /// when the cancelled turn drops its guard.
    pub fn cancel(&self, conversation: &ConversationId) -> bool {
        match self.inner.get(conversation) {
            Some(turn) => {
                turn.cancellation.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, conversation: &ConversationId) -> bool {
        self.inner.contains_key(conversation)
    }

    /// Number of conversations with a running generation.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for ActiveTurns {
    fn default() -> Self {
        Self::new(BusyPolicy::default())
    }
}

/// Ownership of one conversation slot for the lifetime of a turn.
#[derive(Debug)]
pub struct TurnGuard {
    turns: Arc<DashMap<ConversationId, ActiveTurn>>,
    conversation: ConversationId,
    generation: u64,
    cancellation: CancellationToken,
}

impl TurnGuard {
    /// Token cancelled when this turn is replaced or explicitly cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        let generation = self.generation;
        self.turns
            .remove_if(&self.conversation, |_, turn| turn.generation == generation);
    }
}
