//! WebSocket endpoint: one snapshot on connect, then every broadcast event.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    sink::{Sink, SinkExt},
    stream::StreamExt,
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use super::state::AppState;
use crate::mission::SnapshotSynthesizer;
use crate::realtime::RealtimeEvent;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before building the snapshot so nothing emitted in between is lost.
    let events = BroadcastStream::new(state.broadcaster().subscribe());
    if send_snapshot(&mut sender, &state.synth).await.is_err() {
        return;
    }
    tracing::debug!("WebSocket client connected");

    let synth = state.synth.clone();
    let mut send_task = tokio::spawn(async move {
        forward_events(events, &synth, &mut sender).await;
    });

    // Clients only listen; inbound frames matter for close detection.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }
    tracing::debug!("WebSocket client disconnected");
}

async fn send_snapshot<S>(sink: &mut S, synth: &SnapshotSynthesizer) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    let snapshot = synth.build_snapshot().await;
    sink.send(Message::Text(RealtimeEvent::snapshot(&snapshot).to_json()))
        .await
}

/// Forward events until the sink closes. A subscriber that lagged behind
/// the bus is resynced with a fresh snapshot in place of the skipped events.
async fn forward_events<S>(mut events: BroadcastStream<RealtimeEvent>, synth: &SnapshotSynthesizer, sink: &mut S)
where
    S: Sink<Message> + Unpin,
{
    while let Some(event) = events.next().await {
        let sent = match event {
            Ok(event) => sink.send(Message::Text(event.to_json())).await,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!("WebSocket client lagged, {} event(s) skipped, resending snapshot", skipped);
                send_snapshot(sink, synth).await
            }
        };
        if sent.is_err() {
            break;
        }
    }
}
