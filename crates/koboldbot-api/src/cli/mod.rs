//! CLI command definitions for the `kbot` binary.
//!
//! Uses clap derive macros for argument parsing. Every command acts on
//! behalf of one owner, passed with `--owner` (or `KOBOLDBOT_OWNER`).

pub mod character;
pub mod chat;
pub mod history;
pub mod status;
pub mod turn;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Role-play with your own characters through a KoboldCpp backend.
#[derive(Parser)]
#[command(name = "kbot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage characters (add, list, show, delete).
    #[command(alias = "char")]
    Character {
        #[command(subcommand)]
        action: CharacterCommand,
    },

    /// Show a character's transcript.
    History {
        #[arg(long, env = "KOBOLDBOT_OWNER", default_value = "local")]
        owner: String,

        /// Character name (defaults to the most recently messaged one).
        name: Option<String>,
    },

    /// Send one message and stream the reply.
    Say {
        #[arg(long, env = "KOBOLDBOT_OWNER", default_value = "local")]
        owner: String,

        /// Name substituted for `{{user}}` in the prompt.
        #[arg(long, default_value = "User")]
        display_name: String,

        /// Message text; prefix with `<Name>,` to address a character.
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,
    },

    /// Start an interactive chat session.
    Chat {
        #[arg(long, env = "KOBOLDBOT_OWNER", default_value = "local")]
        owner: String,

        /// Name substituted for `{{user}}` in the prompt.
        #[arg(long, default_value = "User")]
        display_name: String,
    },

    /// Show system status (storage, backend reachability, counts).
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum CharacterCommand {
    /// Add or overwrite a character from a definition command.
    Add {
        #[arg(long, env = "KOBOLDBOT_OWNER", default_value = "local")]
        owner: String,

        /// Read the definition from a file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// List characters.
    #[command(alias = "ls")]
    List {
        #[arg(long, env = "KOBOLDBOT_OWNER", default_value = "local")]
        owner: String,
    },

    /// Show a character's definition.
    Show {
        #[arg(long, env = "KOBOLDBOT_OWNER", default_value = "local")]
        owner: String,

        name: String,
    },

    /// Delete a character and its transcript.
    #[command(alias = "rm")]
    Delete {
        #[arg(long, env = "KOBOLDBOT_OWNER", default_value = "local")]
        owner: String,

        name: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },
}
