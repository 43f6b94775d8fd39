//! One chat turn, projected onto a single in-place-edited terminal message.
//!
//! Each progress update rewrites the character's reply where it stands, in
//! the order the updates arrive. When stdout is not a terminal only the
//! final reply is printed.

use std::io;

use anyhow::Result;
use console::{Term, measure_text_width, style};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};

use koboldbot_core::turn::service::TurnUpdate;
use koboldbot_types::character::OwnerId;
use koboldbot_types::error::TurnError;
use koboldbot_types::generation::FinishReason;
use koboldbot_types::prompt::ConversationId;

use crate::state::AppState;

/// How a turn ended, as seen by the terminal.
#[derive(Debug)]
pub enum TurnOutcome {
    Completed {
        character: String,
        text: String,
        recorded: bool,
        reason: FinishReason,
    },
    Failed(TurnError),
}

/// Conversation id for a terminal session of `owner`.
pub fn terminal_conversation(owner: &OwnerId) -> ConversationId {
    ConversationId::new(format!("terminal:{owner}"))
}

/// Run one turn from the command line.
pub async fn say(
    state: &AppState,
    owner: &str,
    display_name: &str,
    message: String,
    json: bool,
) -> Result<()> {
    let owner = OwnerId::new(owner);
    let conversation = terminal_conversation(&owner);
    let outcome = stream_turn(state, conversation, owner, display_name, message, !json).await?;

    if json {
        let value = match &outcome {
            TurnOutcome::Completed { character, text, recorded, reason } => serde_json::json!({
                "character": character,
                "response": text,
                "recorded": recorded,
                "finish_reason": reason.to_string(),
            }),
            TurnOutcome::Failed(err) => serde_json::json!({
                "error": err.to_string(),
                "notice": err.user_notice(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    if let TurnOutcome::Failed(err) = outcome {
        anyhow::bail!(err.user_notice());
    }
    Ok(())
}

/// Drive a turn to its end, drawing progress when `render` is set.
///
/// Turn failures are returned as [`TurnOutcome::Failed`] after the notice is
/// shown; only terminal I/O errors propagate.
pub async fn stream_turn(
    state: &AppState,
    conversation: ConversationId,
    owner: OwnerId,
    display_name: &str,
    message: String,
    render: bool,
) -> Result<TurnOutcome> {
    let service = &state.turn_service;
    let mut updates = service.run_turn(
        conversation.clone(),
        owner,
        display_name.to_string(),
        message,
    );

    let mut live = LiveMessage::new(Term::stdout(), render);
    let mut spinner: Option<ProgressBar> = None;
    let mut character = String::new();

    let outcome = loop {
        let next = tokio::select! {
            next = updates.next() => next,
            _ = tokio::signal::ctrl_c() => {
                service.active_turns().cancel(&conversation);
                continue;
            }
        };

        match next {
            Some(Ok(TurnUpdate::Started { character_name })) => {
                if render {
                    spinner = Some(thinking_spinner(&character_name));
                }
                live.set_prefix(format!("  {} ", style(format!("{character_name}:")).cyan().bold()));
                character = character_name;
            }
            Some(Ok(TurnUpdate::Progress(text))) => {
                if let Some(s) = spinner.take() {
                    s.finish_and_clear();
                }
                live.show(&text)?;
            }
            Some(Ok(TurnUpdate::Completed { text, exchange, reason })) => {
                if let Some(s) = spinner.take() {
                    s.finish_and_clear();
                }
                live.finish(&text)?;
                break TurnOutcome::Completed {
                    character,
                    text,
                    recorded: exchange.is_some(),
                    reason,
                };
            }
            Some(Err(err)) => {
                if let Some(s) = spinner.take() {
                    s.finish_and_clear();
                }
                tracing::warn!(conversation = %conversation, error = %err, "Turn failed");
                if render {
                    println!("  {} {}", style("!").yellow().bold(), err.user_notice());
                }
                break TurnOutcome::Failed(err);
            }
            None => {
                // The service always ends with Completed or an error.
                break TurnOutcome::Failed(TurnError::Cancelled);
            }
        }
    };

    Ok(outcome)
}

fn thinking_spinner(character: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("{character} is thinking..."));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// A reply that is rewritten in place as it grows.
struct LiveMessage {
    term: Term,
    interactive: bool,
    prefix: String,
    rows: usize,
    shown: String,
}

impl LiveMessage {
    fn new(term: Term, render: bool) -> Self {
        let interactive = render && term.is_term();
        Self {
            term,
            interactive,
            prefix: String::new(),
            rows: 0,
            shown: String::new(),
        }
    }

    fn set_prefix(&mut self, prefix: String) {
        self.prefix = prefix;
    }

    fn show(&mut self, text: &str) -> io::Result<()> {
        if !self.interactive || text == self.shown {
            return Ok(());
        }
        if self.rows > 0 {
            self.term.clear_last_lines(self.rows)?;
        }
        let line = format!("{}{}", self.prefix, text);
        self.term.write_line(&line)?;
        self.rows = rendered_rows(&line, self.term.size().1 as usize);
        self.shown = text.to_string();
        Ok(())
    }

    /// Draw the final text; non-interactive output prints it exactly once.
    fn finish(&mut self, text: &str) -> io::Result<()> {
        if self.interactive {
            if text.is_empty() && self.rows == 0 {
                self.term.write_line(&format!("{}{}", self.prefix, style("...").dim()))?;
                return Ok(());
            }
            return self.show(text);
        }
        if !self.prefix.is_empty() && !text.is_empty() {
            self.term.write_line(&format!("{}{}", self.prefix, text))?;
        }
        Ok(())
    }
}

/// Terminal rows `text` occupies at `width` columns.
fn rendered_rows(text: &str, width: usize) -> usize {
    text.split('\n')
        .map(|line| {
            let w = measure_text_width(line);
            if width == 0 || w == 0 { 1 } else { w.div_ceil(width) }
        })
        .sum()
}
