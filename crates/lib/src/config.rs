//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.cardrelay/config.json`) and environment.
//! Values are not validated at startup — a missing tracker or webhook URL simply
//! produces malformed outbound requests, mirroring the upstream deployment contract.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Inbound HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Ticket-tracker settings (base URL, card path, credentials).
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Remote log collector settings.
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Chat-bot notifier settings.
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Server bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the webhook endpoint (default 15180).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    15180
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

/// Ticket-tracker config: base domain, per-deployment card creation path, credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Tracker base URL, e.g. "https://tracker.example.com".
    #[serde(default)]
    pub base_url: String,

    /// Card creation path appended to the base URL, e.g. "/api/v1/view/<view-id>/vu".
    #[serde(default)]
    pub card_path: String,

    /// Login username. Overridden by CARDRELAY_TRACKER_USERNAME env when set.
    pub username: Option<String>,

    /// Login password. Overridden by CARDRELAY_TRACKER_PASSWORD env when set.
    pub password: Option<String>,
}

/// Remote log collector config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorConfig {
    /// Endpoint that accepts raw-text POST log lines.
    #[serde(default)]
    pub url: String,
}

/// Chat-bot notifier config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifierConfig {
    /// Chat-bot incoming webhook URL.
    #[serde(default)]
    pub webhook_url: String,
}

fn nonempty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the tracker username: env CARDRELAY_TRACKER_USERNAME overrides config. Empty when neither is set.
pub fn resolve_tracker_username(config: &Config) -> String {
    nonempty_env("CARDRELAY_TRACKER_USERNAME")
        .or_else(|| {
            config
                .tracker
                .username
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default()
}

/// Resolve the tracker password: env CARDRELAY_TRACKER_PASSWORD overrides config. Empty when neither is set.
pub fn resolve_tracker_password(config: &Config) -> String {
    nonempty_env("CARDRELAY_TRACKER_PASSWORD")
        .or_else(|| {
            config
                .tracker
                .password
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("CARDRELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".cardrelay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or CARDRELAY_CONFIG_PATH). Missing file => default config.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok(config)
}
