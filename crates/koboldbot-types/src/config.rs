//! Global configuration types for koboldbot.
//!
//! `GlobalConfig` represents the top-level `config.toml` that selects the
//! generation backend, overrides sampling parameters, and controls how
//! concurrent turns in one conversation are handled.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::generation::SamplingConfig;

/// Top-level configuration.
///
/// Loaded from `~/.koboldbot/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    /// Sampling parameters merged into every generation request.
    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub turns: TurnsConfig,

    /// Database file; defaults to `koboldbot.db` inside the data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Where the generation backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the KoboldCpp API, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000/api".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Per-conversation turn handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnsConfig {
    #[serde(default)]
    pub busy_policy: BusyPolicy,
}

/// What happens when a message arrives while a generation is still running
/// in the same conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Refuse the new turn; the running one continues.
    #[default]
    Reject,
    /// Cancel the running turn and start the new one.
    Replace,
}

impl fmt::Display for BusyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusyPolicy::Reject => write!(f, "reject"),
            BusyPolicy::Replace => write!(f, "replace"),
        }
    }
}

impl FromStr for BusyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(BusyPolicy::Reject),
            "replace" => Ok(BusyPolicy::Replace),
            other => Err(format!("invalid busy policy: '{other}'")),
        }
    }
}
