mod defaults;
mod sender;


pub use sender::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::DisparoError;
use defaults::*;

/// Top-level Disparo configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sender: SenderConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// WAHA gateway access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    /// API key sent as `X-Api-Key`. Empty = not configured.
    #[serde(default)]
    pub api_key: String,
    /// WAHA session name the messages are sent through.
    #[serde(default = "default_gateway_session")]
    pub session: String,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            api_key: String::new(),
            session: default_gateway_session(),
            timeout_secs: default_gateway_timeout(),
        }
    }
}

/// Batch store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Create the data directory layout: `data/`, `logs/`, `snapshots/`.
///
/// Idempotent; creation failures surface later when the subdirectory is used.
pub fn ensure_layout(data_dir: &str) {
    let dir = shellexpand(data_dir);
    let base = Path::new(&dir);
    for sub in &["data", "logs", "snapshots"] {
        let _ = std::fs::create_dir_all(base.join(sub));
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Interval bounds and the
/// retry limit are clamped to sane minimums after parsing.
pub fn load(path: &str) -> Result<Config, DisparoError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| DisparoError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let mut config: Config = toml::from_str(&content)
        .map_err(|e| DisparoError::Config(format!("failed to parse config: {}", e)))?;

    config.sender.normalize();
    Ok(config)
}
