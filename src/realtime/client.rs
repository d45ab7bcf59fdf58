//! Realtime client: keeps a WebSocket connection to the broadcaster alive
//! and folds incoming events into a [`MissionView`].
//!
//! One background task owns the connection, so reconnect attempts can never
//! stack. A manual [`RealtimeClient::disconnect`] cancels a pending retry and
//! stops the task for good.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::event::RealtimeEvent;
use super::view::MissionView;
use crate::error::{Error, Result};
use crate::mission::MissionSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started, or stopped by a manual disconnect.
    Disabled,
    Connecting,
    Connected,
    Disconnected,
    Reconnecting { attempt: u32, delay: Duration },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disabled => f.write_str("disabled"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Reconnecting { attempt, delay } => {
                write!(f, "reconnecting (attempt {}, in {}ms)", attempt, delay.as_millis())
            }
        }
    }
}

/// Exponential reconnect backoff: `min(base * 2^k, cap)` for `k`
/// consecutive failures.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    failures: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(30))
    }
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            failures: 0,
        }
    }

    pub fn delay_for(&self, failures: u32) -> Duration {
        match 2u32.checked_pow(failures) {
            Some(factor) => self.base.saturating_mul(factor).min(self.cap),
            None => self.cap,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn current_delay(&self) -> Duration {
        self.delay_for(self.failures)
    }

    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current_delay()
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }
}

pub struct RealtimeClient {
    url: String,
    backoff: Backoff,
    view: Arc<Mutex<MissionView>>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    errors: Option<mpsc::UnboundedSender<String>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeClient {
    pub fn new(url: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disabled);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            url: url.into(),
            backoff: Backoff::default(),
            view: Arc::new(Mutex::new(MissionView::new())),
            state_tx,
            shutdown_tx,
            errors: None,
            task: Mutex::new(None),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Receive a description of every event that could not be applied.
    /// Such errors never close the connection.
    pub fn with_error_sink(mut self, errors: mpsc::UnboundedSender<String>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn lock_view(&self) -> MutexGuard<'_, MissionView> {
        self.view.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn view(&self) -> MissionView {
        self.lock_view().clone()
    }

    /// Fold a REST-polled snapshot into the view.
    pub fn apply_snapshot(&self, snapshot: MissionSnapshot) {
        self.lock_view().apply_snapshot(snapshot);
    }

    /// GET a snapshot over REST and merge it into the view.
    pub async fn poll(&self, snapshot_url: &str) -> Result<()> {
        let snapshot: MissionSnapshot = reqwest::get(snapshot_url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;
        self.apply_snapshot(snapshot);
        Ok(())
    }

    /// Start the connection task. Calling this while the task is running
    /// does nothing.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        self.shutdown_tx.send_replace(false);
        let worker = Worker {
            url: self.url.clone(),
            backoff: self.backoff.clone(),
            view: Arc::clone(&self.view),
            state_tx: self.state_tx.clone(),
            shutdown_rx: self.shutdown_tx.subscribe(),
            errors: self.errors.clone(),
        };
        *task = Some(tokio::spawn(worker.run()));
    }

    /// Stop for good: close the socket, cancel any pending retry, and wait
    /// for the task to exit.
    pub async fn disconnect(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Realtime client task ended abnormally: {}", e);
            }
        }
        self.state_tx.send_replace(ConnectionState::Disabled);
    }
}

struct Worker {
    url: String,
    backoff: Backoff,
    view: Arc<Mutex<MissionView>>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_rx: watch::Receiver<bool>,
    errors: Option<mpsc::UnboundedSender<String>>,
}

impl Worker {
    fn set(&self, state: ConnectionState) {
        tracing::debug!("Realtime client {}", state);
        self.state_tx.send_replace(state);
    }

    async fn run(mut self) {
        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            self.set(ConnectionState::Connecting);
            let connect = tokio::select! {
                result = connect_async(self.url.as_str()) => result,
                _ = self.shutdown_rx.changed() => break,
            };

            match connect {
                Ok((mut ws, _)) => {
                    self.backoff.record_success();
                    self.set(ConnectionState::Connected);
                    tracing::info!("Connected to {}", self.url);

                    let stopped = loop {
                        tokio::select! {
                            msg = ws.next() => match msg {
                                Some(Ok(Message::Text(text))) => self.handle_text(&text),
                                Some(Ok(Message::Close(_))) | None => break false,
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    tracing::warn!("Realtime connection error: {}", e);
                                    break false;
                                }
                            },
                            _ = self.shutdown_rx.changed() => break true,
                        }
                    };

                    if stopped {
                        let _ = ws.close(None).await;
                        break;
                    }
                    self.set(ConnectionState::Disconnected);
                }
                Err(e) => {
                    let delay = self.backoff.record_failure();
                    tracing::warn!("Connect to {} failed: {}, retrying in {}ms", self.url, e, delay.as_millis());
                    self.set(ConnectionState::Disconnected);
                }
            }

            let delay = self.backoff.current_delay();
            self.set(ConnectionState::Reconnecting {
                attempt: self.backoff.failures() + 1,
                delay,
            });
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_rx.changed() => break,
            }
        }
        self.set(ConnectionState::Disabled);
    }

    fn handle_text(&self, text: &str) {
        let result = serde_json::from_str::<RealtimeEvent>(text).and_then(|event| {
            self.view
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .apply_event(&event)
        });
        if let Err(e) = result {
            tracing::warn!("Dropping malformed realtime event: {}", e);
            if let Some(errors) = &self.errors {
                let _ = errors.send(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_follows_min_of_doubling_and_cap() {
        let backoff = Backoff::default();
        for k in 0..40u32 {
            let expected = Duration::from_secs(2u64.saturating_mul(1u64 << k.min(40))).min(Duration::from_secs(30));
            assert_eq!(backoff.delay_for(k), expected, "k = {k}");
        }
        assert_eq!(backoff.delay_for(0), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(16));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(30));
    }

    #[test]
    fn success_resets_failures() {
        let mut backoff = Backoff::default();
        assert_eq!(backoff.record_failure(), Duration::from_secs(4));
        assert_eq!(backoff.record_failure(), Duration::from_secs(8));
        backoff.record_success();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.current_delay(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn unreachable_server_reconnects_until_disconnect() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = RealtimeClient::new(format!("ws://127.0.0.1:{port}/ws"))
            .with_backoff(Backoff::new(Duration::from_millis(5), Duration::from_millis(20)));
        let mut states = client.subscribe_state();
        client.start();
        client.start();

        let reached = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                states.changed().await.unwrap();
                if let ConnectionState::Reconnecting { attempt, .. } = *states.borrow() {
                    if attempt >= 3 {
                        break;
                    }
                }
            }
        })
        .await;
        assert!(reached.is_ok());

        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disabled);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(client.state(), ConnectionState::Disabled);
    }
}
