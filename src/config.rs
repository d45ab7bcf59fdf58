//! Configuration loading for Mission Deck.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Environment variable that overrides the home directory.
pub const HOME_ENV: &str = "MISSION_DECK_HOME";

/// Get the Mission Deck home directory (`~/.mission-deck` unless overridden).
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".mission-deck"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from the home directory.
pub fn load_settings() -> Result<Settings> {
    let path = get_settings_path()?;

    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or return defaults if not found or unreadable.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        Settings::default()
    })
}

/// Save settings atomically.
pub fn save_settings(settings: &Settings) -> Result<()> {
    let path = get_settings_path()?;
    let content = serde_json::to_string_pretty(settings)?;
    crate::persist::write_atomic(&path, content.as_bytes())?;
    tracing::info!("Saved settings to {}", path.display());
    Ok(())
}

fn validate_settings(settings: &Settings) -> Result<()> {
    if let Some(active) = settings.channels.active.as_deref() {
        if crate::telegram::Channel::parse(active).is_none() {
            return Err(Error::Config(format!(
                "channels.active '{}' is not a known channel",
                active
            )));
        }
    }
    if settings.budget.token_budget == 0 {
        return Err(Error::Config("budget.token_budget must be positive".to_string()));
    }
    Ok(())
}

/// Workspace configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Workspace {
    pub path: Option<PathBuf>,
}

impl Workspace {
    /// Workspace root, falling back to `<home>/workspace`.
    pub fn resolve(&self) -> PathBuf {
        self.path
            .clone()
            .or_else(|| get_home_dir().ok().map(|h| h.join("workspace")))
            .unwrap_or_else(|| PathBuf::from("./workspace"))
    }
}

/// Web server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    3333
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

/// External status provider configuration.
///
/// `command` takes precedence over `url`; with neither set the synthesizer
/// runs on configured agents only.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StatusConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub url: Option<String>,
    #[serde(default = "default_status_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_status_timeout_ms() -> u64 {
    4000
}

fn default_refresh_interval_secs() -> u64 {
    15
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            url: None,
            timeout_ms: default_status_timeout_ms(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

/// Chat configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatConfig {
    pub responder_command: Option<String>,
    #[serde(default)]
    pub responder_args: Vec<String>,
    #[serde(default = "default_chat_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_chat_retention")]
    pub retention: usize,
}

fn default_chat_timeout_ms() -> u64 {
    20_000
}

fn default_chat_retention() -> usize {
    300
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            responder_command: None,
            responder_args: Vec::new(),
            timeout_ms: default_chat_timeout_ms(),
            retention: default_chat_retention(),
        }
    }
}

/// Telegram channel configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<i64>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_relay_timeout_ms() -> u64 {
    8000
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            poll_interval_secs: default_poll_interval_secs(),
            timeout_ms: default_relay_timeout_ms(),
        }
    }
}

/// Channels configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Channels {
    /// Active relay channel; `None` means "telegram if configured".
    pub active: Option<String>,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Token budget configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Budget {
    #[serde(default = "default_token_budget")]
    pub token_budget: u64,
    #[serde(default = "default_cost_per_1k")]
    pub cost_per_1k_tokens: f64,
}

fn default_token_budget() -> u64 {
    250_000
}

fn default_cost_per_1k() -> f64 {
    0.01
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            cost_per_1k_tokens: default_cost_per_1k(),
        }
    }
}

/// Mission state persistence.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StateConfig {
    #[serde(default)]
    pub persist: bool,
}

/// Mission Deck settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub workspace: Workspace,

    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub channels: Channels,

    #[serde(default)]
    pub budget: Budget,

    #[serde(default)]
    pub state: StateConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.web.port, 3333);
        assert_eq!(settings.chat.retention, 300);
        assert_eq!(settings.budget.token_budget, 250_000);
        assert_eq!(settings.status.timeout_ms, 4000);
        assert!(!settings.state.persist);
    }

    #[test]
    fn unknown_active_channel_is_rejected() {
        let mut settings = Settings::default();
        settings.channels.active = Some("carrier-pigeon".to_string());
        assert!(validate_settings(&settings).is_err());

        settings.channels.active = Some("telegram".to_string());
        assert!(validate_settings(&settings).is_ok());
    }
}
