//! System status command.

use std::time::Duration;

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// How long the backend reachability probe may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Display storage, backend and character counts.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let characters = state.repo().count_characters().await?;

    let backend = state.turn_service.backend();
    let probe = match tokio::time::timeout(PROBE_TIMEOUT, backend.probe_model()).await {
        Ok(Ok(model)) => Ok(model),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("no answer within {}s", PROBE_TIMEOUT.as_secs())),
    };

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "database": state.db_path.display().to_string(),
            "backend": {
                "name": backend.name(),
                "url": state.config.backend.base_url,
                "reachable": probe.is_ok(),
                "model": probe.as_ref().ok(),
                "error": probe.as_ref().err(),
            },
            "busy_policy": state.config.turns.busy_policy.to_string(),
            "max_length": state.config.sampling.max_length,
            "characters": characters,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} koboldbot v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Backend ──").dim());
    println!("  URL:     {}", style(&state.config.backend.base_url).cyan());
    match &probe {
        Ok(model) => println!("  Status:  {} ({model})", style("● reachable").green()),
        Err(e) => println!("  Status:  {} {}", style("○ unreachable").red(), style(e).dim()),
    }
    println!(
        "  Budget:  {} tokens per reply",
        state.config.sampling.max_length
    );
    println!("  Busy:    {}", state.config.turns.busy_policy);
    println!();

    println!("  {}", style("── Characters ──").dim());
    println!("  Stored:  {}", style(characters).bold());
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style(state.db_path.display()).dim());
    println!();

    Ok(())
}
