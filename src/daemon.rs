//! Background loops: periodic status refresh and Telegram inbound polling.
//!
//! Every loop watches one shutdown channel and exits promptly when it flips,
//! including while waiting on the network.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::mission::{LocalFile, MissionStore, SnapshotSynthesizer};
use crate::realtime::RealtimeEvent;
use crate::telegram::TelegramRelay;

pub struct BackgroundTasks {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Rebuild the snapshot every `interval`, push it to subscribers, and
    /// announce workspace listing changes.
    pub fn spawn_status_refresh(&mut self, synth: Arc<SnapshotSynthesizer>, interval: Duration) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_files: Option<Vec<LocalFile>> = None;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }

                let snapshot = tokio::select! {
                    snapshot = synth.build_snapshot() => snapshot,
                    _ = shutdown.changed() => break,
                };

                let broadcaster = synth.store().broadcaster();
                if let Some(previous) = &last_files {
                    if *previous != snapshot.local_files {
                        tracing::info!("Workspace changed ({} files)", snapshot.local_files.len());
                        broadcaster.broadcast(RealtimeEvent::files_changed(&snapshot.local_files));
                    }
                }
                last_files = Some(snapshot.local_files.clone());

                if broadcaster.subscriber_count() > 0 {
                    broadcaster.broadcast(RealtimeEvent::snapshot(&snapshot));
                }
            }
            tracing::debug!("Status refresh loop stopped");
        });
        self.handles.push(("status-refresh", handle));
    }

    /// Poll Telegram every `interval` and merge inbound messages into chat.
    pub fn spawn_relay_poll(&mut self, relay: Arc<TelegramRelay>, store: Arc<MissionStore>, interval: Duration) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut offset: i32 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }

                let polled = tokio::select! {
                    polled = relay.poll_once(&mut offset) => polled,
                    _ = shutdown.changed() => break,
                };

                match polled {
                    Ok(messages) if !messages.is_empty() => {
                        let inserted = store.merge_chat(messages);
                        tracing::debug!("Merged {} inbound message(s)", inserted.len());
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Telegram poll failed: {}", e),
                }
            }
            tracing::debug!("Telegram poll loop stopped");
        });
        self.handles.push(("telegram-poll", handle));
    }

    /// Signal every loop to stop and wait for them to exit.
    pub async fn shutdown(self) {
        self.shutdown_tx.send_replace(true);
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!("Background task {} ended abnormally: {}", name, e);
            }
        }
        tracing::info!("Background tasks stopped");
    }
}

/// Resolve on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::AgentRegistry;
    use crate::realtime::{event, Broadcaster};
    use tempfile::TempDir;

    #[tokio::test]
    async fn refresh_loop_pushes_snapshots_and_stops_on_shutdown() {
        crate::logging::init_test();
        let dir = TempDir::new().unwrap();
        let workspace = dir.path().join("ws");
        std::fs::create_dir_all(&workspace).unwrap();

        let bus = Broadcaster::new();
        let mut rx = bus.subscribe();
        let store = Arc::new(MissionStore::new(bus));
        let registry = Arc::new(AgentRegistry::open(dir.path()).unwrap());
        let synth = Arc::new(SnapshotSynthesizer::new(store, registry, &workspace));

        let mut tasks = BackgroundTasks::new();
        tasks.spawn_status_refresh(Arc::clone(&synth), Duration::from_millis(20));

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.kind, event::SNAPSHOT);

        std::fs::write(workspace.join("new.md"), "x").unwrap();
        let changed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let e = rx.recv().await.unwrap();
                if e.kind == event::FILES_CHANGED {
                    break e;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(changed.payload["files"][0]["name"], "new.md");

        tokio::time::timeout(Duration::from_secs(2), tasks.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn relay_poll_loop_stops_on_shutdown() {
        use crate::config::TelegramConfig;
        use crate::telegram::ChannelSelector;

        let config = TelegramConfig {
            bot_token: Some("123456:test-token".to_string()),
            chat_id: Some(42),
            ..TelegramConfig::default()
        };
        // Channel `none` keeps the poll path off the network.
        let channels = Arc::new(ChannelSelector::default());
        let relay = Arc::new(TelegramRelay::from_config(&config, channels).unwrap());
        let store = Arc::new(MissionStore::new(Broadcaster::new()));

        let mut tasks = BackgroundTasks::new();
        tasks.spawn_relay_poll(relay, Arc::clone(&store), Duration::from_millis(10));
        assert_eq!(tasks.len(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::time::timeout(Duration::from_secs(2), tasks.shutdown()).await.unwrap();
        assert!(store.chat_messages().is_empty());
    }
}
