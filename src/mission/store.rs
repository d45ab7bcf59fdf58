//! Mission State Store: the authoritative task, chat and timeline state.
//!
//! Every mutation runs to completion under one lock with no await point,
//! and emits its realtime events before the lock is released so that event
//! order always matches mutation order.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::merge::{self, TaskPatch};
use super::types::{ChatMessage, Column, Task, TimelineItem};
use crate::error::{Error, Result};
use crate::realtime::{Broadcaster, RealtimeEvent};

/// Default chat retention.
pub const CHAT_CAP: usize = 300;

/// Timeline retention.
pub const TIMELINE_CAP: usize = 100;

fn placeholder_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^auto-([0-9A-HJKMNP-TV-Z]{26})-\d+$").ok())
        .as_ref()
}

/// Id for the `n`th placeholder task generated by run `run_id`.
pub fn placeholder_id(run_id: &str, n: usize) -> String {
    format!("auto-{}-{}", run_id, n)
}

/// True for placeholder ids generated by a run other than `run_id`.
pub fn is_stale_placeholder(id: &str, run_id: &str) -> bool {
    placeholder_re()
        .and_then(|re| re.captures(id.trim()))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str() != run_id)
        .unwrap_or(false)
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    chat: Vec<ChatMessage>,
    #[serde(default)]
    timeline: Vec<TimelineItem>,
}

#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    chat: Vec<ChatMessage>,
    timeline: Vec<TimelineItem>,
    initialized: bool,
}

pub struct MissionStore {
    state: Mutex<StoreState>,
    broadcaster: Broadcaster,
    persist_path: Option<PathBuf>,
    chat_cap: usize,
}

impl MissionStore {
    /// Empty, uninitialised, in-memory store.
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            broadcaster,
            persist_path: None,
            chat_cap: CHAT_CAP,
        }
    }

    /// File-backed store. Existing state at `path` is loaded and counts as
    /// initialised.
    pub fn open(broadcaster: Broadcaster, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = Self::new(broadcaster);

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let persisted: PersistedState = serde_json::from_str(&content)?;
            let state = store.state.get_mut().unwrap_or_else(|e| e.into_inner());
            state.tasks = merge::dedupe_tasks(persisted.tasks);
            merge::merge_chat(&mut state.chat, persisted.chat, CHAT_CAP);
            state.timeline = persisted.timeline;
            state.initialized = true;
            tracing::info!(
                "Loaded mission state from {} ({} tasks, {} messages)",
                path.display(),
                state.tasks.len(),
                state.chat.len()
            );
        }

        store.persist_path = Some(path);
        Ok(store)
    }

    /// Set the chat retention cap, trimming already-loaded chat to it.
    pub fn with_chat_cap(mut self, cap: usize) -> Self {
        let cap = cap.max(1);
        self.chat_cap = cap;
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if state.chat.len() > cap {
            let excess = state.chat.len() - cap;
            state.chat.drain(..excess);
        }
        self
    }

    /// Seed the task list directly; the store counts as initialised.
    pub fn with_tasks(self, tasks: Vec<Task>) -> Self {
        {
            let mut state = self.lock();
            state.tasks = merge::dedupe_tasks(tasks);
            state.initialized = true;
        }
        self
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clear all state and return to the uninitialised condition.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = StoreState::default();
        self.persist(&state);
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.lock().chat.clone()
    }

    pub fn timeline(&self) -> Vec<TimelineItem> {
        self.lock().timeline.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Task list for a snapshot build.
    ///
    /// The first call on an uninitialised store seeds it from `seed`. Later
    /// calls reuse the stored tasks after pruning placeholders left by a
    /// previous run.
    pub fn tasks_for_snapshot<F>(&self, run_id: &str, seed: F) -> Vec<Task>
    where
        F: FnOnce() -> Vec<Task>,
    {
        let mut state = self.lock();
        if !state.initialized {
            state.tasks = merge::dedupe_tasks(seed());
            state.initialized = true;
            tracing::info!("Seeded {} placeholder task(s)", state.tasks.len());
            self.persist(&state);
            return state.tasks.clone();
        }

        let before = state.tasks.len();
        state.tasks.retain(|t| !is_stale_placeholder(&t.id, run_id));
        if state.tasks.len() != before {
            tracing::info!("Pruned {} stale placeholder task(s)", before - state.tasks.len());
            self.persist(&state);
        }
        state.tasks.clone()
    }

    /// Move a task to another lane. Moving to the current lane is a no-op.
    pub fn move_task(&self, id: &str, column: &str) -> Result<Vec<Task>> {
        let column = Column::parse(column).ok_or_else(|| Error::invalid_column(column))?;

        let mut state = self.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| merge::ids_match(&t.id, id))
            .ok_or_else(|| Error::task_not_found(id))?;

        if task.column == column {
            return Ok(state.tasks.clone());
        }

        task.column = column;
        let item = TimelineItem::new(
            "task",
            format!("Task moved to {}", column.label()),
            task.title.clone(),
        );

        self.broadcaster.broadcast(RealtimeEvent::tasks_replace(&state.tasks));
        self.record_timeline(&mut state, item);
        self.persist(&state);
        Ok(state.tasks.clone())
    }

    /// Apply a whitelisted partial update. The id never changes; an invalid
    /// column rejects the whole update.
    pub fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let mut state = self.lock();
        let index = state
            .tasks
            .iter()
            .position(|t| merge::ids_match(&t.id, id))
            .ok_or_else(|| Error::task_not_found(id))?;

        let updated = merge::apply_task_patch(&state.tasks[index], patch)?;
        if updated == state.tasks[index] {
            return Ok(updated);
        }
        state.tasks[index] = updated.clone();

        self.broadcaster.broadcast(RealtimeEvent::tasks_replace(&state.tasks));
        self.record_timeline(
            &mut state,
            TimelineItem::new("task", "Task updated", updated.title.clone()),
        );
        self.persist(&state);
        Ok(updated)
    }

    /// Delete a task. A missing id is `NotFound`.
    pub fn delete_task(&self, id: &str) -> Result<Vec<Task>> {
        let mut state = self.lock();
        let index = state
            .tasks
            .iter()
            .position(|t| merge::ids_match(&t.id, id))
            .ok_or_else(|| Error::task_not_found(id))?;

        let removed = state.tasks.remove(index);

        self.broadcaster.broadcast(RealtimeEvent::tasks_replace(&state.tasks));
        self.record_timeline(
            &mut state,
            TimelineItem::new("task", "Task deleted", removed.title),
        );
        self.persist(&state);
        Ok(state.tasks.clone())
    }

    /// Append one chat message. Returns `None` if its id was already present.
    pub fn append_chat(&self, message: ChatMessage) -> Option<ChatMessage> {
        self.merge_chat(vec![message]).into_iter().next()
    }

    /// Merge a batch of chat messages, broadcasting each one inserted.
    pub fn merge_chat(&self, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let mut state = self.lock();
        let inserted = merge::merge_chat(&mut state.chat, messages, self.chat_cap);
        if inserted.is_empty() {
            return inserted;
        }
        for message in &inserted {
            self.broadcaster.broadcast(RealtimeEvent::chat_append(message));
        }
        self.persist(&state);
        inserted
    }

    pub fn push_timeline(&self, item: TimelineItem) {
        let mut state = self.lock();
        self.record_timeline(&mut state, item);
        self.persist(&state);
    }

    fn record_timeline(&self, state: &mut StoreState, item: TimelineItem) {
        self.broadcaster.broadcast(RealtimeEvent::timeline_append(&item));
        state.timeline.push(item);
        if state.timeline.len() > TIMELINE_CAP {
            let excess = state.timeline.len() - TIMELINE_CAP;
            state.timeline.drain(..excess);
        }
    }

    fn persist(&self, state: &StoreState) {
        let Some(path) = &self.persist_path else {
            return;
        };
        let persisted = PersistedState {
            tasks: state.tasks.clone(),
            chat: state.chat.clone(),
            timeline: state.timeline.clone(),
        };
        let result = serde_json::to_vec_pretty(&persisted)
            .map_err(Error::from)
            .and_then(|bytes| crate::persist::write_atomic(path, &bytes));
        if let Err(e) = result {
            tracing::warn!("Failed to persist mission state to {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::types::ChatRole;
    use crate::realtime::event;
    use std::sync::Arc;

    fn task(id: &str, column: Column) -> Task {
        Task {
            id: id.to_string(),
            column,
            title: format!("Task {id}"),
            description: String::new(),
            time: "09:00".to_string(),
            assignee: None,
            assignee_initial: None,
        }
    }

    fn seeded() -> MissionStore {
        MissionStore::new(Broadcaster::new()).with_tasks(vec![
            task("task-1", Column::Inbox),
            task("task-2", Column::Progress),
            task("task-3", Column::Review),
        ])
    }

    #[test]
    fn move_task_changes_only_the_column() {
        let store = seeded();
        let tasks = store.move_task("task-3", "assigned").unwrap();
        let moved = tasks.iter().find(|t| t.id == "task-3").unwrap();
        assert_eq!(moved.column, Column::Assigned);
        assert_eq!(moved.title, "Task task-3");
    }

    #[test]
    fn move_task_matches_trimmed_ids() {
        let store = seeded();
        assert!(store.move_task(" task-1 ", "review").is_ok());
        assert_eq!(store.tasks()[0].column, Column::Review);
    }

    #[test]
    fn move_task_rejects_bad_input() {
        let store = seeded();
        assert!(matches!(store.move_task("task-9", "inbox"), Err(Error::NotFound(_))));
        assert!(matches!(store.move_task("task-1", "done"), Err(Error::InvalidInput { .. })));
        assert_eq!(store.tasks()[0].column, Column::Inbox);
    }

    #[test]
    fn column_stays_in_set_after_mixed_updates() {
        let store = seeded();
        let attempts = ["review", "bogus", " PROGRESS ", "", "inbox", "archive"];
        for (i, col) in attempts.iter().enumerate() {
            let _ = store.move_task("task-2", col);
            let patch = TaskPatch {
                column: Some(attempts[(i + 1) % attempts.len()].to_string()),
                ..TaskPatch::default()
            };
            let _ = store.update_task("task-2", &patch);
        }
        for t in store.tasks() {
            assert!(Column::ALL.contains(&t.column));
        }
    }

    #[test]
    fn update_task_never_changes_id() {
        let store = seeded();
        let patch: TaskPatch =
            serde_json::from_value(serde_json::json!({"id": "task-77", "title": "New"})).unwrap();
        let updated = store.update_task("task-1", &patch).unwrap();
        assert_eq!(updated.id, "task-1");
        assert!(store.tasks().iter().all(|t| t.id != "task-77"));
    }

    #[test]
    fn update_with_invalid_column_keeps_previous_state() {
        let store = seeded();
        let patch = TaskPatch {
            title: Some("Changed".into()),
            column: Some("done".into()),
            ..TaskPatch::default()
        };
        assert!(store.update_task("task-2", &patch).is_err());
        let t = store.tasks().into_iter().find(|t| t.id == "task-2").unwrap();
        assert_eq!(t.column, Column::Progress);
        assert_eq!(t.title, "Task task-2");
    }

    #[test]
    fn delete_missing_task_is_not_found() {
        let store = seeded();
        assert_eq!(store.delete_task("task-2").unwrap().len(), 2);
        assert!(matches!(store.delete_task("task-2"), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn mutations_broadcast_in_order() {
        let store = seeded();
        let mut rx = store.broadcaster().subscribe();

        store.move_task("task-1", "assigned").unwrap();
        store.move_task("task-1", "assigned").unwrap();
        store.delete_task("task-3").unwrap();

        let kinds: Vec<String> = (0..4).map(|_| rx.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            vec![
                event::TASKS_REPLACE,
                event::TIMELINE_APPEND,
                event::TASKS_REPLACE,
                event::TIMELINE_APPEND
            ]
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn chat_append_is_at_most_once() {
        let store = MissionStore::new(Broadcaster::new());
        let msg = ChatMessage::new(ChatRole::User, "op", "hello").with_id("m-1");
        assert!(store.append_chat(msg.clone()).is_some());
        assert!(store.append_chat(msg).is_none());
        assert_eq!(store.chat_messages().len(), 1);
    }

    #[test]
    fn chat_is_trimmed_to_cap() {
        let store = MissionStore::new(Broadcaster::new()).with_chat_cap(2);
        for i in 0..4 {
            store.append_chat(ChatMessage::new(ChatRole::User, "op", format!("{i}")));
        }
        let chat = store.chat_messages();
        assert_eq!(chat.len(), 2);
        assert_eq!(chat[0].message, "2");
    }

    #[test]
    fn first_snapshot_seeds_and_later_ones_prune_stale_placeholders() {
        let store = MissionStore::new(Broadcaster::new());
        let old_run = ulid::Ulid::new().to_string();
        let new_run = ulid::Ulid::new().to_string();

        let seeded = store.tasks_for_snapshot(&old_run, || {
            vec![task(&placeholder_id(&old_run, 0), Column::Inbox), task("user-1", Column::Review)]
        });
        assert_eq!(seeded.len(), 2);

        let again = store.tasks_for_snapshot(&old_run, || panic!("must not reseed"));
        assert_eq!(again.len(), 2);

        let next_run = store.tasks_for_snapshot(&new_run, || panic!("must not reseed"));
        assert_eq!(next_run.len(), 1);
        assert_eq!(next_run[0].id, "user-1");
    }

    #[test]
    fn stale_placeholder_detection() {
        let run = ulid::Ulid::new().to_string();
        let other = ulid::Ulid::new().to_string();
        assert!(!is_stale_placeholder(&placeholder_id(&run, 2), &run));
        assert!(is_stale_placeholder(&placeholder_id(&other, 2), &run));
        assert!(!is_stale_placeholder("task-3", &run));
        assert!(!is_stale_placeholder("auto-short-1", &run));
    }

    #[test]
    fn persisted_state_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mission-state.json");

        let store = MissionStore::open(Broadcaster::new(), &path).unwrap().with_tasks(vec![task("task-1", Column::Inbox)]);
        store.move_task("task-1", "review").unwrap();
        store.append_chat(ChatMessage::new(ChatRole::User, "op", "persist me").with_id("c1"));

        let reopened = MissionStore::open(Broadcaster::new(), &path).unwrap();
        assert!(reopened.is_initialized());
        assert_eq!(reopened.tasks()[0].column, Column::Review);
        assert_eq!(reopened.chat_messages()[0].id, "c1");
        assert_eq!(reopened.timeline().len(), 1);
    }

    #[test]
    fn reopened_chat_respects_configured_cap() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mission-state.json");

        let store = MissionStore::open(Broadcaster::new(), &path).unwrap();
        for i in 0..5 {
            store.append_chat(ChatMessage::new(ChatRole::User, "op", format!("{i}")).with_id(format!("c{i}")));
        }

        let reopened = MissionStore::open(Broadcaster::new(), &path).unwrap().with_chat_cap(2);
        let ids: Vec<String> = reopened.chat_messages().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["c3", "c4"]);
    }

    #[test]
    fn concurrent_moves_keep_a_single_copy_of_each_task() {
        let store = Arc::new(seeded());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let col = Column::ALL[(i + j) % 4].as_str();
                        store.move_task("task-3", col).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let tasks = store.tasks();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks.iter().filter(|t| t.id == "task-3").count(), 1);
    }
}
