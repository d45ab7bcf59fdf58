//! Messaging relay over Telegram.

pub mod channel;
pub mod format;
pub mod relay;

pub use channel::{Channel, ChannelSelector};
pub use format::format_notification;
pub use relay::TelegramRelay;
