//! Generation backend request/response types.
//!
//! These model the KoboldCpp-style streaming contract: a POST body made of
//! the sampling configuration merged with the rendered `prompt`, answered by
//! a stream of events whose payload carries one `token` each.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sampling configuration sent with every generation request.
///
/// Every field has a default, so a partial override (from `config.toml` or
/// a JSON value) only replaces the fields it names. Unknown fields are kept
/// in `extra` and forwarded to the backend verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub use_story: bool,
    pub use_memory: bool,
    pub use_authors_note: bool,
    pub use_world_info: bool,
    pub max_context_length: u32,
    /// Maximum number of tokens to generate. Also the client-side budget.
    pub max_length: u32,
    pub rep_pen: f64,
    pub rep_pen_range: u32,
    pub rep_pen_slope: f64,
    pub temperature: f64,
    pub tfs: f64,
    pub top_a: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub min_p: f64,
    pub typical: f64,
    pub sampler_order: Vec<u32>,
    pub singleline: bool,
    pub use_default_badwordsids: bool,
    pub mirostat: u32,
    pub mirostat_eta: f64,
    pub mirostat_tau: f64,
    pub grammar: String,
    pub stop_sequence: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            use_story: false,
            use_memory: false,
            use_authors_note: false,
            use_world_info: false,
            max_context_length: 8192,
            max_length: 100,
            rep_pen: 1.2,
            rep_pen_range: 2048,
            rep_pen_slope: 0.0,
            temperature: 0.51,
            tfs: 0.99,
            top_a: 0.0,
            top_k: 0,
            top_p: 1.0,
            min_p: 0.0,
            typical: 1.0,
            sampler_order: vec![6, 0, 1, 3, 4, 2, 5],
            singleline: false,
            use_default_badwordsids: false,
            mirostat: 0,
            mirostat_eta: 0.1,
            mirostat_tau: 5.0,
            grammar: String::new(),
            stop_sequence: vec![
                "\n".to_string(),
                "\n### Instruction:".to_string(),
                "\n### Response:".to_string(),
            ],
            extra: serde_json::Map::new(),
        }
    }
}

/// Body of a streaming generation request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub sampling: SamplingConfig,
    pub prompt: String,
}

impl GenerateRequest {
    pub fn new(sampling: SamplingConfig, prompt: impl Into<String>) -> Self {
        Self {
            sampling,
            prompt: prompt.into(),
        }
    }

    /// Client-side token budget for this request.
    pub fn token_budget(&self) -> u32 {
        self.sampling.max_length
    }
}

/// Payload of one streamed backend event.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPayload {
    pub token: String,
}

/// Why a generation stream ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The backend closed the event stream.
    BackendClosed,
    /// The client-side token budget was reached first.
    TokenBudget,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::BackendClosed => write!(f, "backend_closed"),
            FinishReason::TokenBudget => write!(f, "token_budget"),
        }
    }
}

/// Events surfaced by a generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Accumulated response text up to the latest sentence boundary.
    Boundary(String),
    /// The stream completed; `text` is the trimmed accumulated response.
    Finished { text: String, reason: FinishReason },
}

/// Errors from generation backend operations.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("stream error: {0}")]
    Stream(String),
}
