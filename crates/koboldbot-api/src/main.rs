//! koboldbot terminal entry point.
//!
//! Binary name: `kbot`
//!
//! Parses CLI arguments, initializes tracing, the database and the turn
//! service, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use koboldbot_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{CharacterCommand, Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions::from_verbosity(cli.verbose, cli.quiet);
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "kbot", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let result = dispatch(&state, cli).await;

    state.shutdown().await;
    shutdown_tracing();
    result
}

async fn dispatch(state: &AppState, cli: Cli) -> anyhow::Result<()> {
    let json = cli.json;

    match cli.command {
        Commands::Character { action } => match action {
            CharacterCommand::Add { owner, file } => {
                cli::character::add_character(state, &owner, file.as_deref(), json).await
            }
            CharacterCommand::List { owner } => {
                cli::character::list_characters(state, &owner, json).await
            }
            CharacterCommand::Show { owner, name } => {
                cli::character::show_character(state, &owner, &name, json).await
            }
            CharacterCommand::Delete { owner, name, force } => {
                cli::character::delete_character(state, &owner, &name, force, json).await
            }
        },

        Commands::History { owner, name } => {
            cli::history::show_history(state, &owner, name.as_deref(), json).await
        }

        Commands::Say {
            owner,
            display_name,
            message,
        } => {
            let message = message.join(" ");
            cli::turn::say(state, &owner, &display_name, message, json).await
        }

        Commands::Chat {
            owner,
            display_name,
        } => cli::chat::run_chat_loop(state, &owner, &display_name).await,

        Commands::Status => cli::status::status(state, json).await,

        Commands::Completions { .. } => unreachable!("handled above"),
    }
}
