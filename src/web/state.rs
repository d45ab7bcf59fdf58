//! Shared handler state and its construction from settings.

use std::path::Path;
use std::sync::Arc;

use crate::chat::{ChatResponder, CommandResponder};
use crate::config::Settings;
use crate::error::Result;
use crate::mission::{AgentRegistry, MissionStore, SnapshotSynthesizer};
use crate::realtime::Broadcaster;
use crate::status::create_status_provider;
use crate::telegram::{Channel, ChannelSelector, TelegramRelay};

/// Name of the persisted mission state file under the home directory.
pub const STATE_FILE: &str = "mission-state.json";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MissionStore>,
    pub registry: Arc<AgentRegistry>,
    pub synth: Arc<SnapshotSynthesizer>,
    pub channels: Arc<ChannelSelector>,
    pub responder: Option<Arc<dyn ChatResponder>>,
}

impl AppState {
    pub fn broadcaster(&self) -> &Broadcaster {
        self.store.broadcaster()
    }

    /// Wire every component from settings. `home` holds the agent registry
    /// files and, when enabled, the persisted mission state.
    ///
    /// Returns the Telegram relay as well when one is configured; it is
    /// already attached to the broadcaster.
    pub fn from_settings(settings: &Settings, home: &Path) -> Result<(Self, Option<Arc<TelegramRelay>>)> {
        let broadcaster = Broadcaster::new();
        let store = if settings.state.persist {
            MissionStore::open(broadcaster.clone(), home.join(STATE_FILE))?
        } else {
            MissionStore::new(broadcaster.clone())
        };
        let store = Arc::new(store.with_chat_cap(settings.chat.retention));

        let registry = Arc::new(AgentRegistry::open(home)?);
        let channels = Arc::new(ChannelSelector::new(Channel::from_settings(settings)));

        let relay = TelegramRelay::from_config(&settings.channels.telegram, Arc::clone(&channels)).map(Arc::new);
        if let Some(relay) = &relay {
            broadcaster.attach_relay(relay.clone());
        }

        let synth = Arc::new(SnapshotSynthesizer::from_settings(
            settings,
            Arc::clone(&store),
            Arc::clone(&registry),
            create_status_provider(settings),
            Arc::clone(&channels),
        ));

        let responder = CommandResponder::from_config(&settings.chat)
            .map(|r| Arc::new(r) as Arc<dyn ChatResponder>);

        Ok((
            Self {
                store,
                registry,
                synth,
                channels,
                responder,
            },
            relay,
        ))
    }
}
