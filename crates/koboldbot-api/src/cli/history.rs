//! Transcript display command.

use anyhow::Result;
use console::style;

use koboldbot_core::repository::character::CharacterRepository;
use koboldbot_types::character::OwnerId;

use crate::state::AppState;

/// Print a character's transcript, oldest first.
///
/// Without a name, shows the character the owner messaged most recently.
pub async fn show_history(
    state: &AppState,
    owner: &str,
    name: Option<&str>,
    json: bool,
) -> Result<()> {
    let owner = OwnerId::new(owner);
    let character = state.repo().resolve_character(&owner, name).await?;
    let history = state.repo().list_history(&character.id).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "character": character.name,
                "exchanges": history,
            }))?
        );
        return Ok(());
    }

    println!();
    if history.is_empty() {
        println!(
            "  {} No messages with {} yet.",
            style("i").blue().bold(),
            style(&character.name).cyan()
        );
        println!();
        return Ok(());
    }

    for turn in &history {
        println!("  {} {}", style("You:").green().bold(), turn.prompt);
        println!(
            "  {} {}",
            style(format!("{}:", character.name)).cyan().bold(),
            turn.response
        );
        println!();
    }
    println!(
        "  {} exchange{}",
        style(history.len()).bold(),
        if history.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
