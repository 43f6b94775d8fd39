//! Prompt assembly for koboldbot.
//!
//! - `template`: the fixed role-play template and its two rendering stages
//! - `builder`: `PromptBuilder`, which resolves the addressed character and
//!   renders its description, examples and transcript into a prompt

pub mod builder;
pub mod template;
