//! Global configuration loader for koboldbot.
//!
//! Reads `config.toml` from the data directory (`~/.koboldbot/` in
//! production) into [`GlobalConfig`], then applies environment overrides.
//! Falls back to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use koboldbot_types::config::GlobalConfig;
use koboldbot_types::generation::SamplingConfig;

use crate::sqlite::pool::DATABASE_FILE;

/// Backend base URL override.
pub const ENV_KOBOLD_HOST: &str = "KOBOLD_HOST";
/// JSON object replacing the whole sampling configuration.
pub const ENV_PROMPT_BASE: &str = "PROMPT_BASE";
/// Database file override.
pub const ENV_DB_PATH: &str = "DB_PATH";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `KOBOLDBOT_DATA_DIR` environment variable
/// 2. `~/.koboldbot`
/// 3. `.koboldbot` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("KOBOLDBOT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".koboldbot");
    }

    PathBuf::from(".koboldbot")
}

/// Load global configuration from `{data_dir}/config.toml`, then apply
/// environment overrides.
///
/// - If the file does not exist, starts from [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and starts from the default.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let mut config = read_config_file(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

async fn read_config_file(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// Apply `KOBOLD_HOST`, `PROMPT_BASE` and `DB_PATH` on top of `config`.
///
/// `lookup` stands in for `std::env::var` so overrides can be exercised
/// without touching the process environment. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut GlobalConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(host) = lookup(ENV_KOBOLD_HOST) {
        config.backend.base_url = host.trim_end_matches('/').to_string();
    }

    if let Some(raw) = lookup(ENV_PROMPT_BASE) {
        match serde_json::from_str::<SamplingConfig>(&raw) {
            Ok(sampling) => config.sampling = sampling,
            Err(err) => {
                tracing::warn!("Ignoring malformed {ENV_PROMPT_BASE}: {err}");
            }
        }
    }

    if let Some(path) = lookup(ENV_DB_PATH) {
        config.database_path = Some(PathBuf::from(path));
    }
}

/// Database file to open: the configured path, else `koboldbot.db` in the
/// data directory.
pub fn database_path(config: &GlobalConfig, data_dir: &Path) -> PathBuf {
    config
        .database_path
        .clone()
        .unwrap_or_else(|| data_dir.join(DATABASE_FILE))
}
