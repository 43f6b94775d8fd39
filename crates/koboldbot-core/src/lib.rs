//! Prompt assembly, generation streaming and repository traits for koboldbot.
//!
//! This crate defines the "ports" (repository and backend traits) that the
//! infrastructure layer implements, plus the turn flow built on them. It
//! depends only on `koboldbot-types` -- never on `koboldbot-infra` or any
//! database/HTTP crate.

pub mod character;
pub mod generation;
pub mod prompt;
pub mod repository;
pub mod turn;
