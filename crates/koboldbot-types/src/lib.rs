//! Shared domain types for koboldbot.
//!
//! Characters, exchanges, assembled prompts, generation request/stream
//! types, configuration, and the error kinds surfaced at the turn boundary.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod character;
pub mod config;
pub mod error;
pub mod generation;
pub mod prompt;
