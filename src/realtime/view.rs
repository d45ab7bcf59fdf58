//! Client-side view of mission state.
//!
//! Fed by both realtime events and REST polls. Both paths go through the
//! same merge rules as the server, so the view converges regardless of which
//! path delivers a change first.

use super::event::{MissionEvent, RealtimeEvent};
use crate::mission::merge;
use crate::mission::store::{CHAT_CAP, TIMELINE_CAP};
use crate::mission::{ChatMessage, MissionSnapshot};

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Changed,
    /// Event understood but already reflected, e.g. a duplicate chat id.
    Unchanged,
    /// Unknown kind, ignored.
    Ignored(String),
}

#[derive(Debug, Clone)]
pub struct MissionView {
    pub snapshot: MissionSnapshot,
    pub active_channel: Option<String>,
    pub last_emergency: Option<String>,
    chat_cap: usize,
}

impl Default for MissionView {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionView {
    pub fn new() -> Self {
        Self {
            snapshot: MissionSnapshot::default(),
            active_channel: None,
            last_emergency: None,
            chat_cap: CHAT_CAP,
        }
    }

    pub fn with_chat_cap(mut self, cap: usize) -> Self {
        self.chat_cap = cap.max(1);
        self
    }

    /// Replace every derived slice from a full snapshot.
    ///
    /// Chat follows the snapshot, plus any local messages that arrived after
    /// the newest one the snapshot shares with the view. Local messages older
    /// than that point were trimmed by the server and stay dropped.
    pub fn apply_snapshot(&mut self, snapshot: MissionSnapshot) {
        let previous_chat = std::mem::take(&mut self.snapshot.chat_messages);
        let mut chat = Vec::new();
        merge::merge_chat(&mut chat, snapshot.chat_messages, self.chat_cap);
        let local_newer = newer_than_snapshot(previous_chat, &chat);
        merge::merge_chat(&mut chat, local_newer, self.chat_cap);

        self.snapshot = MissionSnapshot {
            tasks: merge::dedupe_tasks(snapshot.tasks),
            agents: merge::dedupe_agents(snapshot.agents),
            chat_messages: chat,
            ..snapshot
        };
    }

    /// Apply one realtime event. A payload that does not decode is an error
    /// and leaves the view untouched.
    pub fn apply_event(&mut self, event: &RealtimeEvent) -> Result<Applied, serde_json::Error> {
        let applied = match event.decode()? {
            MissionEvent::Snapshot(snapshot) => {
                self.apply_snapshot(*snapshot);
                Applied::Changed
            }
            MissionEvent::TasksReplace(tasks) => {
                self.snapshot.tasks = merge::dedupe_tasks(tasks);
                Applied::Changed
            }
            MissionEvent::AgentsReplace(agents) => {
                self.snapshot.agents = merge::dedupe_agents(agents);
                Applied::Changed
            }
            MissionEvent::ChatAppend(message) => {
                let inserted =
                    merge::merge_chat(&mut self.snapshot.chat_messages, [message], self.chat_cap);
                if inserted.is_empty() {
                    Applied::Unchanged
                } else {
                    Applied::Changed
                }
            }
            MissionEvent::TimelineAppend(item) => {
                let timeline = &mut self.snapshot.timeline_items;
                if timeline.iter().any(|t| merge::ids_match(&t.id, &item.id)) {
                    Applied::Unchanged
                } else {
                    timeline.push(item);
                    if timeline.len() > TIMELINE_CAP {
                        let excess = timeline.len() - TIMELINE_CAP;
                        timeline.drain(..excess);
                    }
                    Applied::Changed
                }
            }
            MissionEvent::FilesChanged(files) => {
                self.snapshot.local_files = files;
                Applied::Changed
            }
            MissionEvent::ChannelChanged(channel) => {
                self.active_channel = Some(channel);
                Applied::Changed
            }
            MissionEvent::Emergency(action) => {
                self.last_emergency = Some(action);
                Applied::Changed
            }
            MissionEvent::Unknown(kind) => {
                tracing::debug!("Ignoring unknown realtime event {}", kind);
                Applied::Ignored(kind)
            }
        };
        Ok(applied)
    }
}

/// Messages of `previous` after the last one also present in `snapshot`.
/// With no overlap every previous message counts as newer.
fn newer_than_snapshot(previous: Vec<ChatMessage>, snapshot: &[ChatMessage]) -> Vec<ChatMessage> {
    let last_shared = previous
        .iter()
        .rposition(|m| snapshot.iter().any(|s| merge::ids_match(&s.id, &m.id)));
    match last_shared {
        Some(index) => previous.into_iter().skip(index + 1).collect(),
        None => previous,
    }
}
