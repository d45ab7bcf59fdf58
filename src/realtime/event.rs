//! Realtime event taxonomy.
//!
//! Events are namespaced (`mission.*`) and carry the minimal payload needed
//! to apply them without a refetch. New kinds are additive: consumers decode
//! unknown kinds to [`MissionEvent::Unknown`] and ignore them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mission::{Agent, ChatMessage, LocalFile, MissionSnapshot, Task, TimelineItem};

pub const SNAPSHOT: &str = "mission.snapshot";
pub const TASKS_REPLACE: &str = "mission.tasks.replace";
pub const AGENTS_REPLACE: &str = "mission.agents.replace";
pub const CHAT_APPEND: &str = "mission.chat.append";
pub const TIMELINE_APPEND: &str = "mission.timeline.append";
pub const FILES_CHANGED: &str = "mission.files.changed";
pub const CHANNEL_CHANGED: &str = "mission.channel.changed";
pub const EMERGENCY: &str = "mission.emergency";

/// Wire-level event: `{ "type": "...", "payload": {...} }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl RealtimeEvent {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn snapshot(snapshot: &MissionSnapshot) -> Self {
        Self::new(SNAPSHOT, to_value(snapshot))
    }

    pub fn tasks_replace(tasks: &[Task]) -> Self {
        Self::new(TASKS_REPLACE, json!({ "tasks": tasks }))
    }

    pub fn agents_replace(agents: &[Agent]) -> Self {
        Self::new(AGENTS_REPLACE, json!({ "agents": agents }))
    }

    pub fn chat_append(message: &ChatMessage) -> Self {
        Self::new(CHAT_APPEND, json!({ "message": message }))
    }

    pub fn timeline_append(item: &TimelineItem) -> Self {
        Self::new(TIMELINE_APPEND, json!({ "item": item }))
    }

    pub fn files_changed(files: &[LocalFile]) -> Self {
        Self::new(FILES_CHANGED, json!({ "files": files }))
    }

    pub fn channel_changed(channel: &str) -> Self {
        Self::new(CHANNEL_CHANGED, json!({ "channel": channel }))
    }

    pub fn emergency(action: &str, time: &str) -> Self {
        Self::new(EMERGENCY, json!({ "action": action, "time": time }))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize event {}: {}", self.kind, e);
            String::from("{}")
        })
    }

    /// Decode the payload into a typed event. Unknown kinds are not an error.
    pub fn decode(&self) -> Result<MissionEvent, serde_json::Error> {
        let event = match self.kind.as_str() {
            SNAPSHOT => MissionEvent::Snapshot(Box::new(serde_json::from_value(self.payload.clone())?)),
            TASKS_REPLACE => {
                let p: TasksPayload = serde_json::from_value(self.payload.clone())?;
                MissionEvent::TasksReplace(p.tasks)
            }
            AGENTS_REPLACE => {
                let p: AgentsPayload = serde_json::from_value(self.payload.clone())?;
                MissionEvent::AgentsReplace(p.agents)
            }
            CHAT_APPEND => {
                let p: ChatPayload = serde_json::from_value(self.payload.clone())?;
                MissionEvent::ChatAppend(p.message)
            }
            TIMELINE_APPEND => {
                let p: TimelinePayload = serde_json::from_value(self.payload.clone())?;
                MissionEvent::TimelineAppend(p.item)
            }
            FILES_CHANGED => {
                let p: FilesPayload = serde_json::from_value(self.payload.clone())?;
                MissionEvent::FilesChanged(p.files)
            }
            CHANNEL_CHANGED => {
                let p: ChannelPayload = serde_json::from_value(self.payload.clone())?;
                MissionEvent::ChannelChanged(p.channel)
            }
            EMERGENCY => {
                let p: EmergencyPayload = serde_json::from_value(self.payload.clone())?;
                MissionEvent::Emergency(p.action)
            }
            other => MissionEvent::Unknown(other.to_string()),
        };
        Ok(event)
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize event payload: {}", e);
        Value::Null
    })
}

/// Typed view of a [`RealtimeEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum MissionEvent {
    Snapshot(Box<MissionSnapshot>),
    TasksReplace(Vec<Task>),
    AgentsReplace(Vec<Agent>),
    ChatAppend(ChatMessage),
    TimelineAppend(TimelineItem),
    FilesChanged(Vec<LocalFile>),
    ChannelChanged(String),
    Emergency(String),
    Unknown(String),
}

#[derive(Deserialize)]
struct TasksPayload {
    tasks: Vec<Task>,
}

#[derive(Deserialize)]
struct AgentsPayload {
    agents: Vec<Agent>,
}

#[derive(Deserialize)]
struct ChatPayload {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct TimelinePayload {
    item: TimelineItem,
}

#[derive(Deserialize)]
struct FilesPayload {
    files: Vec<LocalFile>,
}

#[derive(Deserialize)]
struct ChannelPayload {
    channel: String,
}

#[derive(Deserialize)]
struct EmergencyPayload {
    action: String,
}
