//! Outbound notification text.

use chrono::{DateTime, Utc};

use crate::mission::EMERGENCY_KIND;
use crate::realtime::{MissionEvent, RealtimeEvent};

/// Telegram rejects messages above 4096 characters.
const MAX_CHARS: usize = 4000;

/// Source tag of chat messages that arrived through Telegram.
pub const TELEGRAM_SOURCE: &str = "telegram";

/// Notification for an event: an icon prefix, the body, and a UTC timestamp
/// suffix. `None` for events that are not relayed, including chat messages
/// that came from Telegram in the first place.
pub fn format_notification(event: &RealtimeEvent, now: DateTime<Utc>) -> Option<String> {
    let body = match event.decode() {
        Ok(MissionEvent::ChatAppend(msg)) => {
            if msg.source.as_deref() == Some(TELEGRAM_SOURCE) {
                return None;
            }
            format!("💬 {}: {}", msg.author, msg.message)
        }
        Ok(MissionEvent::TimelineAppend(item)) => {
            // Emergencies are already announced by their own event.
            if item.kind == EMERGENCY_KIND {
                return None;
            }
            if item.detail.is_empty() {
                format!("🕒 {}", item.title)
            } else {
                format!("🕒 {}: {}", item.title, item.detail)
            }
        }
        Ok(MissionEvent::Emergency(action)) => format!("🚨 Emergency: {}", action),
        Ok(MissionEvent::ChannelChanged(channel)) => format!("📡 Relay channel is now {}", channel),
        Ok(_) => return None,
        Err(e) => {
            tracing::debug!("Not relaying malformed {} event: {}", event.kind, e);
            return None;
        }
    };

    let body: String = body.chars().take(MAX_CHARS).collect();
    Some(format!("{}\n\n{}", body, now.format("%Y-%m-%d %H:%M:%S UTC")))
}
