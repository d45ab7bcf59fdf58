//! Realtime client against a live gateway on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;

use mission_deck::mission::{AgentRegistry, Column, MissionStore, SnapshotSynthesizer, Task};
use mission_deck::realtime::{event, Backoff, Broadcaster, ConnectionState, MissionView, RealtimeClient, RealtimeEvent};
use mission_deck::telegram::ChannelSelector;
use mission_deck::web::{create_app_router, AppState};

fn task(id: &str, column: Column) -> Task {
    Task {
        id: id.to_string(),
        column,
        title: format!("Task {id}"),
        description: String::new(),
        time: String::new(),
        assignee: None,
        assignee_initial: None,
    }
}

async fn serve(dir: &TempDir) -> (AppState, String) {
    let workspace = dir.path().join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();

    let store = Arc::new(
        MissionStore::new(Broadcaster::new())
            .with_tasks(vec![task("task-1", Column::Inbox), task("task-3", Column::Review)]),
    );
    let registry = Arc::new(AgentRegistry::open(dir.path()).unwrap());
    let synth = Arc::new(SnapshotSynthesizer::new(Arc::clone(&store), Arc::clone(&registry), workspace));
    let state = AppState {
        store,
        registry,
        synth,
        channels: Arc::new(ChannelSelector::default()),
        responder: None,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_app_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (state, format!("ws://{addr}/ws"))
}

async fn wait_for<F>(client: &RealtimeClient, mut check: F)
where
    F: FnMut(&MissionView) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if check(&client.view()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("view never reached the expected state");
}

fn column_of(view: &MissionView, id: &str) -> Option<Column> {
    view.snapshot.tasks.iter().find(|t| t.id == id).map(|t| t.column)
}

#[tokio::test]
async fn client_follows_snapshot_and_task_moves() {
    let dir = TempDir::new().unwrap();
    let (state, url) = serve(&dir).await;

    let client = RealtimeClient::new(url);
    client.start();

    wait_for(&client, |v| v.snapshot.tasks.len() == 2).await;
    assert_eq!(client.state(), ConnectionState::Connected);

    state.store.move_task("task-3", "assigned").unwrap();
    wait_for(&client, |v| column_of(v, "task-3") == Some(Column::Assigned)).await;

    state.store.move_task("task-3", "inbox").unwrap();
    wait_for(&client, |v| column_of(v, "task-3") == Some(Column::Inbox)).await;
    let view = client.view();
    assert_eq!(view.snapshot.tasks.iter().filter(|t| t.id == "task-3").count(), 1);

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disabled);
}

#[tokio::test]
async fn malformed_event_is_reported_without_disconnecting() {
    let dir = TempDir::new().unwrap();
    let (state, url) = serve(&dir).await;

    let (errors_tx, mut errors_rx) = mpsc::unbounded_channel();
    let client = RealtimeClient::new(url)
        .with_backoff(Backoff::new(Duration::from_millis(10), Duration::from_millis(50)))
        .with_error_sink(errors_tx);
    client.start();
    wait_for(&client, |v| v.snapshot.tasks.len() == 2).await;

    state
        .broadcaster()
        .broadcast(RealtimeEvent::new(event::TASKS_REPLACE, json!({ "tasks": "not-a-list" })));

    let error = tokio::time::timeout(Duration::from_secs(5), errors_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!error.is_empty());
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.view().snapshot.tasks.len(), 2);

    state.store.move_task("task-1", "progress").unwrap();
    wait_for(&client, |v| column_of(v, "task-1") == Some(Column::Progress)).await;

    client.disconnect().await;
}

#[tokio::test]
async fn rest_poll_and_push_converge() {
    let dir = TempDir::new().unwrap();
    let (state, url) = serve(&dir).await;
    let snapshot_url = url.replace("ws://", "http://").replace("/ws", "/snapshot");

    let client = RealtimeClient::new(url);
    client.start();
    wait_for(&client, |v| v.snapshot.tasks.len() == 2).await;

    state.store.move_task("task-1", "review").unwrap();
    client.poll(&snapshot_url).await.unwrap();
    wait_for(&client, |v| column_of(v, "task-1") == Some(Column::Review)).await;

    let view = client.view();
    assert_eq!(view.snapshot.tasks.len(), 2);

    client.disconnect().await;
}
