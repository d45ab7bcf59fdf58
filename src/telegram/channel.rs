//! Active relay channel selection.

use std::sync::RwLock;

use crate::config::{load_settings_or_default, save_settings, Settings};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Telegram,
    None,
}

impl Channel {
    pub const AVAILABLE: [Channel; 2] = [Channel::Telegram, Channel::None];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Some(Channel::Telegram),
            "none" | "off" => Some(Channel::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Telegram => "telegram",
            Channel::None => "none",
        }
    }

    pub fn available() -> Vec<String> {
        Self::AVAILABLE.iter().map(|c| c.as_str().to_string()).collect()
    }

    /// Channel implied by settings: the explicit choice if any, otherwise
    /// Telegram when a bot token and chat id are both configured.
    pub fn from_settings(settings: &Settings) -> Self {
        if let Some(active) = settings.channels.active.as_deref().and_then(Channel::parse) {
            return active;
        }
        let tg = &settings.channels.telegram;
        if tg.bot_token.is_some() && tg.chat_id.is_some() {
            Channel::Telegram
        } else {
            Channel::None
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime-switchable active channel. Switching only touches settings on
/// disk when explicitly saved.
pub struct ChannelSelector {
    active: RwLock<Channel>,
}

impl ChannelSelector {
    pub fn new(initial: Channel) -> Self {
        Self {
            active: RwLock::new(initial),
        }
    }

    pub fn active(&self) -> Channel {
        *self.active.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Active channel name, or `None` when relaying is off.
    pub fn active_name(&self) -> Option<&'static str> {
        match self.active() {
            Channel::None => None,
            other => Some(other.as_str()),
        }
    }

    /// Switch by name. Returns the previous channel.
    pub fn switch(&self, name: &str) -> Result<Channel> {
        let next = Channel::parse(name).ok_or_else(|| {
            Error::invalid(format!(
                "Unknown channel '{}'. Expected one of: {}",
                name.trim(),
                Channel::available().join(", ")
            ))
        })?;
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        let previous = *active;
        *active = next;
        if previous != next {
            tracing::info!("Relay channel switched from {} to {}", previous, next);
        }
        Ok(previous)
    }

    /// Write the current channel to the settings file.
    pub fn save(&self) -> Result<()> {
        let mut settings = load_settings_or_default();
        settings.channels.active = Some(self.active().as_str().to_string());
        save_settings(&settings)
    }
}

impl Default for ChannelSelector {
    fn default() -> Self {
        Self::new(Channel::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_rejects_unknown_channels() {
        let selector = ChannelSelector::default();
        assert!(matches!(selector.switch("pager"), Err(Error::InvalidInput { .. })));
        assert_eq!(selector.active(), Channel::None);

        assert_eq!(selector.switch(" Telegram ").unwrap(), Channel::None);
        assert_eq!(selector.active_name(), Some("telegram"));
    }

    #[test]
    fn settings_imply_telegram_when_fully_configured() {
        let mut settings = Settings::default();
        assert_eq!(Channel::from_settings(&settings), Channel::None);

        settings.channels.telegram.bot_token = Some("123:abc".into());
        settings.channels.telegram.chat_id = Some(42);
        assert_eq!(Channel::from_settings(&settings), Channel::Telegram);

        settings.channels.active = Some("none".into());
        assert_eq!(Channel::from_settings(&settings), Channel::None);
    }
}
