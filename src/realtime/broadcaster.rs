//! Fan-out of realtime events to WebSocket subscribers and the messaging relay.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::event::RealtimeEvent;
use crate::error::Result;

/// Default subscriber buffer. Slow subscribers that fall further behind than
/// this skip ahead rather than block the sender.
const CHANNEL_CAPACITY: usize = 256;

/// Outbound side of a messaging relay.
#[async_trait]
pub trait RelaySink: Send + Sync {
    fn name(&self) -> &str;

    /// Notification text for an event, or `None` if the event is not relayed.
    fn render(&self, event: &RealtimeEvent) -> Option<String>;

    async fn deliver(&self, text: &str) -> Result<()>;
}

/// Cloneable handle to the event bus.
///
/// `broadcast` never blocks and never fails from the caller's point of view.
/// Each WebSocket subscriber drains its own receiver, so a broken socket only
/// ends its own forwarding task.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<RealtimeEvent>,
    relay: Arc<RwLock<Option<Arc<dyn RelaySink>>>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            relay: Arc::new(RwLock::new(None)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn attach_relay(&self, sink: Arc<dyn RelaySink>) {
        tracing::info!("Relay attached: {}", sink.name());
        let mut slot = self.relay.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(sink);
    }

    pub fn detach_relay(&self) {
        let mut slot = self.relay.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    /// Publish an event to every subscriber and hand it to the relay.
    pub fn broadcast(&self, event: RealtimeEvent) {
        match self.tx.send(event.clone()) {
            Ok(count) => tracing::debug!("Broadcast {} to {} subscriber(s)", event.kind, count),
            Err(_) => tracing::debug!("Broadcast {} with no subscribers", event.kind),
        }
        self.relay(&event);
    }

    fn relay(&self, event: &RealtimeEvent) {
        let sink = self
            .relay
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(sink) = sink else {
            return;
        };
        let Some(text) = sink.render(event) else {
            return;
        };

        let kind = event.kind.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.deliver(&text).await {
                        tracing::warn!("Relay {} failed to deliver {}: {}", sink.name(), kind, e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!("No async runtime, dropping relay notification for {}", kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct RecordingSink {
        tx: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl RelaySink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn render(&self, event: &RealtimeEvent) -> Option<String> {
            (event.kind != "skip").then(|| event.kind.clone())
        }

        async fn deliver(&self, text: &str) -> Result<()> {
            let _ = self.tx.send(text.to_string());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl RelaySink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn render(&self, event: &RealtimeEvent) -> Option<String> {
            Some(event.kind.clone())
        }

        async fn deliver(&self, _text: &str) -> Result<()> {
            Err(Error::Telegram("network down".into()))
        }
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_block_others() {
        let bus = Broadcaster::new();
        let dropped = bus.subscribe();
        let mut live = bus.subscribe();
        drop(dropped);

        bus.broadcast(RealtimeEvent::new("mission.test", json!({})));

        let got = live.recv().await.unwrap();
        assert_eq!(got.kind, "mission.test");
    }

    #[test]
    fn broadcast_without_subscribers_or_runtime_is_silent() {
        let bus = Broadcaster::new();
        bus.attach_relay(Arc::new(FailingSink));
        bus.broadcast(RealtimeEvent::new("mission.test", json!({})));
    }

    #[tokio::test]
    async fn relay_receives_rendered_events_only() {
        let bus = Broadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.attach_relay(Arc::new(RecordingSink { tx }));

        bus.broadcast(RealtimeEvent::new("skip", json!({})));
        bus.broadcast(RealtimeEvent::new("mission.emergency", json!({})));

        let text = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(text, "mission.emergency");
    }

    #[tokio::test]
    async fn relay_failure_does_not_affect_subscribers() {
        let bus = Broadcaster::new();
        bus.attach_relay(Arc::new(FailingSink));
        let mut rx = bus.subscribe();

        bus.broadcast(RealtimeEvent::new("mission.a", json!({})));
        bus.broadcast(RealtimeEvent::new("mission.b", json!({})));

        assert_eq!(rx.recv().await.unwrap().kind, "mission.a");
        assert_eq!(rx.recv().await.unwrap().kind, "mission.b");
    }
}
