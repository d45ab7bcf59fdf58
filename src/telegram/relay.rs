//! Telegram relay: outbound notifications and inbound chat polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::UpdateKind;

use super::channel::{Channel, ChannelSelector};
use super::format::{format_notification, TELEGRAM_SOURCE};
use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use crate::mission::{ChatMessage, ChatRole};
use crate::realtime::{RealtimeEvent, RelaySink};

pub struct TelegramRelay {
    bot: Bot,
    chat_id: ChatId,
    channels: Arc<ChannelSelector>,
    timeout: Duration,
}

impl TelegramRelay {
    /// Build a relay when both a bot token and a chat id are configured.
    pub fn from_config(config: &TelegramConfig, channels: Arc<ChannelSelector>) -> Option<Self> {
        let token = config.bot_token.as_deref().filter(|t| !t.trim().is_empty())?;
        let chat_id = config.chat_id?;
        Some(Self {
            bot: Bot::new(token),
            chat_id: ChatId(chat_id),
            channels,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    fn enabled(&self) -> bool {
        self.channels.active() == Channel::Telegram
    }

    /// Fetch pending updates once, advancing `offset` past everything seen.
    /// Only text messages from the configured chat are returned.
    pub async fn poll_once(&self, offset: &mut i32) -> Result<Vec<ChatMessage>> {
        if !self.enabled() {
            return Ok(Vec::new());
        }

        let request = self.bot.get_updates().offset(*offset).timeout(0);
        let updates = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| Error::UpstreamUnavailable("telegram getUpdates timed out".to_string()))?
            .map_err(|e| Error::Telegram(e.to_string()))?;

        let mut messages = Vec::new();
        for update in updates {
            *offset = (*offset).max(update.id.0 as i32 + 1);
            let UpdateKind::Message(msg) = update.kind else {
                continue;
            };
            if msg.chat.id != self.chat_id {
                tracing::debug!("Ignoring Telegram message from chat {}", msg.chat.id);
                continue;
            }
            let Some(text) = msg.text() else {
                continue;
            };
            let author = msg
                .from
                .as_ref()
                .map(|u| u.full_name())
                .unwrap_or_else(|| "Telegram".to_string());
            messages.push(inbound_message(msg.chat.id.0, msg.id.0, &author, text, msg.date));
        }

        if !messages.is_empty() {
            tracing::info!("Received {} Telegram message(s)", messages.len());
        }
        Ok(messages)
    }
}

/// Chat message for an inbound Telegram text. The id is derived from the
/// Telegram chat and message ids, so re-polling the same update is a no-op
/// under the chat merge.
pub fn inbound_message(
    chat_id: i64,
    message_id: i32,
    author: &str,
    text: &str,
    date: DateTime<Utc>,
) -> ChatMessage {
    ChatMessage {
        time: date.format("%H:%M").to_string(),
        ..ChatMessage::new(ChatRole::User, author, text.trim())
            .with_id(format!("tg-{}-{}", chat_id, message_id))
            .with_source(TELEGRAM_SOURCE)
    }
}

#[async_trait]
impl RelaySink for TelegramRelay {
    fn name(&self) -> &str {
        "telegram"
    }

    fn render(&self, event: &RealtimeEvent) -> Option<String> {
        if !self.enabled() {
            return None;
        }
        format_notification(event, Utc::now())
    }

    async fn deliver(&self, text: &str) -> Result<()> {
        tokio::time::timeout(self.timeout, self.bot.send_message(self.chat_id, text))
            .await
            .map_err(|_| Error::UpstreamUnavailable("telegram sendMessage timed out".to_string()))?
            .map_err(|e| Error::Telegram(e.to_string()))?;
        Ok(())
    }
}
