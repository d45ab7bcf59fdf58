//! Mission Deck library root.

pub mod chat;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod mission;
pub mod persist;
pub mod realtime;
pub mod status;
pub mod telegram;
pub mod web;
pub mod workspace;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use error::{Error, Result};
pub use mission::{MissionSnapshot, MissionStore, SnapshotSynthesizer};
pub use realtime::{Broadcaster, RealtimeClient, RealtimeEvent};
pub use web::{create_app_router, AppState};
