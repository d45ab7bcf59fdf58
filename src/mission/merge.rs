//! Merge rules shared by the server-side store and the client-side view.
//!
//! Both sides apply the same functions so that a change arriving through a
//! realtime event and through a REST poll converges to the same state.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::{initial_of, Agent, ChatMessage, Column, Task};
use crate::error::{Error, Result};

/// Compare two ids after trimming both sides.
pub fn ids_match(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

/// Normalise an id that may arrive as a JSON string or number.
pub fn id_from_value(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Case-insensitive agent name comparison.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Give a message a locally-unique id if it has none.
pub fn ensure_chat_id(mut message: ChatMessage) -> ChatMessage {
    if message.id.trim().is_empty() {
        message.id = format!("local-{}", ulid::Ulid::new());
    } else {
        message.id = message.id.trim().to_string();
    }
    message
}

/// Append `incoming` to `existing`, dropping any message whose id is already
/// present, then trim the oldest entries beyond `cap`.
///
/// Returns the messages that were actually inserted, in order.
pub fn merge_chat<I>(existing: &mut Vec<ChatMessage>, incoming: I, cap: usize) -> Vec<ChatMessage>
where
    I: IntoIterator<Item = ChatMessage>,
{
    let mut inserted = Vec::new();
    for message in incoming {
        let message = ensure_chat_id(message);
        if existing.iter().any(|m| ids_match(&m.id, &message.id)) {
            continue;
        }
        existing.push(message.clone());
        inserted.push(message);
    }

    if cap > 0 && existing.len() > cap {
        let excess = existing.len() - cap;
        existing.drain(..excess);
    }
    inserted
}

/// Drop tasks whose id repeats an earlier one. Ids are stored trimmed.
pub fn dedupe_tasks(tasks: Vec<Task>) -> Vec<Task> {
    let mut out: Vec<Task> = Vec::with_capacity(tasks.len());
    for mut task in tasks {
        task.id = task.id.trim().to_string();
        if !out.iter().any(|t| t.id == task.id) {
            out.push(task);
        }
    }
    out
}

/// Drop agents whose name repeats an earlier one (case-insensitive).
pub fn dedupe_agents(agents: Vec<Agent>) -> Vec<Agent> {
    let mut out: Vec<Agent> = Vec::with_capacity(agents.len());
    for agent in agents {
        if !out.iter().any(|a| names_match(&a.name, &agent.name)) {
            out.push(agent);
        }
    }
    out
}

/// Merge runtime-discovered agents with configured agents.
///
/// Name is the natural key. A configured agent absorbs a same-named runtime
/// agent: its id, name, role and model win, and the status is whichever of
/// the two is more awake.
pub fn merge_agents(runtime: Vec<Agent>, configured: Vec<Agent>) -> Vec<Agent> {
    let mut merged = dedupe_agents(runtime);

    for cfg in dedupe_agents(configured) {
        match merged.iter_mut().find(|a| names_match(&a.name, &cfg.name)) {
            Some(existing) => {
                let status = cfg.status.more_awake(existing.status);
                let model = cfg.model.clone().or_else(|| existing.model.take());
                *existing = Agent {
                    status,
                    model,
                    initial: initial_of(&cfg.name),
                    is_config_managed: true,
                    ..cfg
                };
            }
            None => merged.push(Agent {
                is_config_managed: true,
                ..cfg
            }),
        }
    }
    merged
}

fn double_option<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Whitelisted partial task update. Unknown fields, `id` included, are
/// ignored on deserialisation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time: Option<String>,
    /// `Some(None)` clears the assignee; absent leaves it unchanged.
    #[serde(default, deserialize_with = "double_option")]
    pub assignee: Option<Option<String>>,
    pub column: Option<String>,
}

/// Apply a patch to a task, validating every provided field first. On error
/// nothing is applied.
pub fn apply_task_patch(task: &Task, patch: &TaskPatch) -> Result<Task> {
    let mut violations = Vec::new();

    let column = match patch.column.as_deref() {
        Some(raw) => match Column::parse(raw) {
            Some(c) => c,
            None => return Err(Error::invalid_column(raw)),
        },
        None => task.column,
    };

    if let Some(title) = &patch.title {
        if title.trim().is_empty() {
            violations.push("title cannot be empty".to_string());
        }
    }
    if !violations.is_empty() {
        return Err(Error::invalid_all(violations));
    }

    let mut updated = task.clone();
    updated.column = column;
    if let Some(title) = &patch.title {
        updated.title = title.trim().to_string();
    }
    if let Some(description) = &patch.description {
        updated.description = description.clone();
    }
    if let Some(time) = &patch.time {
        updated.time = time.clone();
    }
    if let Some(assignee) = &patch.assignee {
        let assignee = assignee
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(ToString::to_string);
        updated.assignee_initial = assignee.as_deref().map(|a| initial_of(a).to_string());
        updated.assignee = assignee;
    }
    Ok(updated)
}
