//! Interactive chat loop.
//!
//! Plain lines are chat messages (prefix `<Name>,` to address a character).
//! A line starting with `!add` opens a character definition that continues
//! until an empty line. Slash commands control the session.

use std::io::Write;

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use koboldbot_core::character::definition::is_definition_command;
use koboldbot_types::character::OwnerId;

use crate::state::AppState;

use super::turn::{stream_turn, terminal_conversation};

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// List the owner's characters.
    Characters,
    /// Show the transcript of a character (or the current one).
    History(Option<String>),
    /// Exit the chat session.
    Exit,
    /// Unknown command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.splitn(2, ' ');
    let cmd = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/characters" | "/chars" => Some(ChatCommand::Characters),
        "/history" => Some(ChatCommand::History(arg.map(str::to_string))),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

fn print_help() {
    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    println!("  {}          {}", style("/help").cyan(), "Show this help message");
    println!("  {}    {}", style("/characters").cyan(), "List your characters");
    println!("  {} {}  {}", style("/history").cyan(), style("[name]").dim(), "Show a transcript");
    println!("  {}          {}", style("/exit").cyan(), "End the chat session");
    println!();
    println!(
        "  {} Start a line with {} to talk to a specific character.",
        style("i").blue().bold(),
        style("Name,").yellow()
    );
    println!(
        "  {} Start with {} to define one; finish with an empty line.",
        style("i").blue().bold(),
        style("!add Name").yellow()
    );
    println!();
}

/// Read lines until an empty one (or EOF) and join them to `first`.
async fn read_definition(first: &str, lines: &mut Lines<BufReader<Stdin>>) -> Result<String> {
    let mut command = first.to_string();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            break;
        }
        command.push('\n');
        command.push_str(&line);
    }
    Ok(command)
}

fn print_prompt() -> Result<()> {
    print!("  {} ", style("You >").green().bold());
    std::io::stdout().flush()?;
    Ok(())
}

/// Run the interactive chat loop for `owner`.
pub async fn run_chat_loop(state: &AppState, owner: &str, display_name: &str) -> Result<()> {
    let owner_id = OwnerId::new(owner);
    let conversation = terminal_conversation(&owner_id);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!();
    println!(
        "  {} koboldbot chat as {} (owner {}). Type {} for commands.",
        style("⚡").bold(),
        style(display_name).green(),
        style(owner).dim(),
        style("/help").cyan()
    );
    println!();

    loop {
        print_prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\n  {}", style("Session ended.").dim());
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = parse(input) {
            match command {
                ChatCommand::Help => print_help(),
                ChatCommand::Characters => {
                    super::character::list_characters(state, owner, false).await?;
                }
                ChatCommand::History(name) => {
                    if let Err(e) =
                        super::history::show_history(state, owner, name.as_deref(), false).await
                    {
                        println!("  {} {e}", style("!").yellow().bold());
                    }
                }
                ChatCommand::Exit => {
                    println!("  {}", style("Session ended.").dim());
                    break;
                }
                ChatCommand::Unknown(cmd) => {
                    println!(
                        "  {} Unknown command {}. Type {} for help.",
                        style("?").yellow().bold(),
                        style(cmd).yellow(),
                        style("/help").cyan()
                    );
                }
            }
            continue;
        }

        if is_definition_command(input) {
            let command = read_definition(input, &mut lines).await?;
            match state.turn_service.define_character(&owner_id, &command).await {
                Ok(defined) => println!(
                    "  {} Added character {}.",
                    style("✓").green().bold(),
                    style(&defined.name).cyan()
                ),
                Err(err) => {
                    tracing::warn!(owner = %owner_id, error = %err, "Character definition rejected");
                    println!("  {} {}", style("!").yellow().bold(), err.definition_notice());
                }
            }
            continue;
        }

        stream_turn(
            state,
            conversation.clone(),
            owner_id.clone(),
            display_name,
            input.to_string(),
            true,
        )
        .await?;
        println!();
    }

    Ok(())
}
