//! Configuration loader for the `building-pulse` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Nothing else in the crate reads `env::var` for
//! service settings.
//!
use std::{env, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};

/// Parse an optional environment variable of type `$ty` with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable with a default value.
macro_rules! string_env {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Credential for the text-generation service.
    pub api_key: String,

    /// Base URL of the chat-completions API (no trailing path).
    pub api_base_url: String,

    /// Model name sent with every completion request.
    pub model: String,

    /// Upper bound on a single remote completion call.
    pub llm_timeout: Duration,

    /// Site identifier stamped on every snapshot.
    pub site_id: String,

    /// Location of the persisted history file.
    pub history_file: PathBuf,

    /// Maximum number of history entries kept.
    pub history_max: usize,

    /// Pause between publisher cycles.
    pub cycle_interval: Duration,

    /// Optional client directory (`[{code, site}]`).
    pub clients_file: Option<PathBuf>,

    /// Listening port for the read-only HTTP layer.
    pub port: u16,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `OPENAI_API_KEY` – text-generation credential
///
/// Optional:
/// - `OPENAI_BASE_URL` – API base (default: `https://api.openai.com/v1`)
/// - `OPENAI_MODEL` – model name (default: `gpt-4o`)
/// - `LLM_TIMEOUT_SECS` – remote call timeout (default: 30)
/// - `SITE_ID` – site identifier (default: `Demo Tower`)
/// - `HISTORY_FILE` – history path (default: `history.json`)
/// - `HISTORY_MAX` – history cap (default: 50)
/// - `CYCLE_INTERVAL_SECS` – seconds between cycles (default: 60)
/// - `CLIENTS_FILE` – client directory path (default: none)
/// - `PORT` – HTTP port (default: 10000)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let api_key = require_env!("OPENAI_API_KEY");
    let api_base_url = string_env!("OPENAI_BASE_URL", "https://api.openai.com/v1");
    let model = string_env!("OPENAI_MODEL", "gpt-4o");
    let llm_timeout_secs = parse_env!("LLM_TIMEOUT_SECS", u64, 30);
    let site_id = string_env!("SITE_ID", "Demo Tower");
    let history_file = PathBuf::from(string_env!("HISTORY_FILE", "history.json"));
    let history_max = parse_env!("HISTORY_MAX", usize, 50);
    let cycle_interval_secs = parse_env!("CYCLE_INTERVAL_SECS", u64, 60);
    let clients_file = env::var("CLIENTS_FILE").ok().map(PathBuf::from);
    let port = parse_env!("PORT", u16, 10000);

    if history_max == 0 {
        return Err(anyhow!("Invalid HISTORY_MAX: must be at least 1"));
    }

    Ok(Config {
        api_key,
        api_base_url: api_base_url.trim_end_matches('/').to_string(),
        model,
        llm_timeout: Duration::from_secs(llm_timeout_secs),
        site_id,
        history_file,
        history_max,
        cycle_interval: Duration::from_secs(cycle_interval_secs),
        clients_file,
        port,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the API key while showing all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        let clients = self
            .clients_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  OPENAI_API_KEY      : {}", mask_secret(&self.api_key));
        tracing::info!("  OPENAI_BASE_URL     : {}", self.api_base_url);
        tracing::info!("  OPENAI_MODEL        : {}", self.model);
        tracing::info!("  LLM_TIMEOUT_SECS    : {}", self.llm_timeout.as_secs());
        tracing::info!("  SITE_ID             : {}", self.site_id);
        tracing::info!("  HISTORY_FILE        : {}", self.history_file.display());
        tracing::info!("  HISTORY_MAX         : {}", self.history_max);
        tracing::info!("  CYCLE_INTERVAL_SECS : {}", self.cycle_interval.as_secs());
        tracing::info!("  CLIENTS_FILE        : {}", clients);
        tracing::info!("  PORT                : {}", self.port);
    }
}

/// Keep only the last four characters of a secret visible.
fn mask_secret(secret: &str) -> String {
    // ---
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_mask_secret_keeps_tail() {
        assert_eq!(mask_secret("sk-abcdef123456"), "****3456");
    }

    #[test]
    fn test_mask_secret_hides_short_values() {
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret(""), "****");
    }
}
