//! Character CLI commands: add, list, show, delete.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use tokio::io::AsyncReadExt;

use koboldbot_core::repository::character::CharacterRepository;
use koboldbot_types::character::{Character, OwnerId};

use crate::state::AppState;

/// Read a definition command from `file` (or stdin) and upsert it.
///
/// # Examples
///
/// ```bash
/// kbot character add --owner 42 --file monica.txt
/// printf '!add Rex\ndescription: ...' | kbot character add --owner 42
/// ```
pub async fn add_character(
    state: &AppState,
    owner: &str,
    file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let command = match file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let owner = OwnerId::new(owner);
    let defined = match state.turn_service.define_character(&owner, &command).await {
        Ok(defined) => defined,
        Err(err) => {
            tracing::warn!(owner = %owner, error = %err, "Character definition rejected");
            anyhow::bail!(err.definition_notice());
        }
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "id": defined.id.to_string(),
                "name": defined.name,
                "examples": defined.examples,
            })
        );
    } else {
        println!(
            "  {} Added character {}.",
            style("✓").green().bold(),
            style(&defined.name).cyan()
        );
    }
    Ok(())
}

/// List an owner's characters, most recently messaged first.
pub async fn list_characters(state: &AppState, owner: &str, json: bool) -> Result<()> {
    let owner = OwnerId::new(owner);
    let characters = state.repo().list_characters(&owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&characters)?);
        return Ok(());
    }

    if characters.is_empty() {
        println!();
        println!(
            "  {} No characters found. Add one with: {}",
            style("i").blue().bold(),
            style("kbot character add").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Description").fg(Color::White),
        Cell::new("Examples").fg(Color::White),
        Cell::new("Exchanges").fg(Color::White),
        Cell::new("Last Messaged").fg(Color::White),
    ]);

    for character in &characters {
        let exchanges = state.repo().count_exchanges(&character.id).await?;
        let last = match &character.last_messaged_at {
            Some(dt) => format_relative_time(dt),
            None => "never".to_string(),
        };

        table.add_row(vec![
            Cell::new(&character.name).fg(Color::Cyan),
            Cell::new(truncate(&character.description, 50)),
            Cell::new(character.examples.len()),
            Cell::new(exchanges),
            Cell::new(last).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} character{}",
        style(characters.len()).bold(),
        if characters.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Show one character's full definition.
pub async fn show_character(state: &AppState, owner: &str, name: &str, json: bool) -> Result<()> {
    let owner = OwnerId::new(owner);
    let character = state.repo().resolve_character(&owner, Some(name)).await?;
    let exchanges = state.repo().count_exchanges(&character.id).await?;

    if json {
        let mut value = serde_json::to_value(&character)?;
        value["exchange_count"] = exchanges.into();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_character(&character, exchanges);
    Ok(())
}

fn print_character(character: &Character, exchanges: u64) {
    println!();
    println!("  {}", style(&character.name).cyan().bold());
    println!();
    println!("  {}", style("── Description ──").dim());
    for line in character.description.lines() {
        println!("  {line}");
    }
    println!();
    println!("  {}", style("── Persona ──").dim());
    println!("  [{}]", character.persona_line);
    println!();
    println!("  {}", style("── Examples ──").dim());
    for example in &character.examples {
        println!("  {} {}", style("{{user}}:").green(), example.prompt);
        println!("  {} {}", style("{{char}}:").cyan(), example.response);
    }
    println!();
    println!("  Exchanges:     {}", style(exchanges).bold());
    println!(
        "  Last messaged: {}",
        character
            .last_messaged_at
            .as_ref()
            .map(format_relative_time)
            .unwrap_or_else(|| "never".to_string())
    );
    println!("  Created:       {}", character.created_at.format("%Y-%m-%d %H:%M"));
    println!("  Updated:       {}", character.updated_at.format("%Y-%m-%d %H:%M"));
    println!();
}

/// Delete a character and its transcript, asking first unless `force`.
pub async fn delete_character(
    state: &AppState,
    owner: &str,
    name: &str,
    force: bool,
    json: bool,
) -> Result<()> {
    let owner = OwnerId::new(owner);
    let character = state.repo().resolve_character(&owner, Some(name)).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete '{}' and its transcript?",
                style(&character.name).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.repo().delete_character(&owner, &character.name).await?;

    if json {
        println!("{}", serde_json::json!({"deleted": true, "name": character.name}));
    } else {
        println!(
            "  {} Character '{}' deleted.",
            style("✓").red().bold(),
            character.name
        );
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > max_chars {
        let cut: String = first_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        first_line.to_string()
    }
}

pub(crate) fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let now = chrono::Utc::now();
    let diff = now - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 50), "short");
        let long = "é".repeat(60);
        let cut = truncate(&long, 50);
        assert_eq!(cut.chars().count(), 50);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_truncate_uses_first_line() {
        assert_eq!(truncate("line one\nline two", 50), "line one");
    }

    #[test]
    fn test_format_relative_time() {
        let now = chrono::Utc::now();
        assert_eq!(format_relative_time(&now), "just now");
        assert_eq!(format_relative_time(&(now - chrono::Duration::minutes(5))), "5m ago");
        assert_eq!(format_relative_time(&(now - chrono::Duration::hours(3))), "3h ago");
        assert_eq!(format_relative_time(&(now - chrono::Duration::days(2))), "2d ago");
    }
}
