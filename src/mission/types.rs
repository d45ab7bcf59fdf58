//! Mission data model: tasks, agents, chat, and the snapshot document.

use serde::{Deserialize, Serialize};

/// Kanban lane a task occupies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Inbox,
    Assigned,
    Progress,
    Review,
}

impl Column {
    pub const ALL: [Column; 4] = [
        Column::Inbox,
        Column::Assigned,
        Column::Progress,
        Column::Review,
    ];

    /// Parse a lane name. Surrounding whitespace and case are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbox" => Some(Column::Inbox),
            "assigned" => Some(Column::Assigned),
            "progress" => Some(Column::Progress),
            "review" => Some(Column::Review),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Inbox => "inbox",
            Column::Assigned => "assigned",
            Column::Progress => "progress",
            Column::Review => "review",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Column::Inbox => "Inbox",
            Column::Assigned => "Assigned",
            Column::Progress => "In Progress",
            Column::Review => "Review",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub column: Column,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Display label, not a timestamp.
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub assignee_initial: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Awake,
    Idle,
    Working,
}

impl AgentStatus {
    /// Ordering used when two sources disagree about the same agent.
    pub fn rank(&self) -> u8 {
        match self {
            AgentStatus::Idle => 0,
            AgentStatus::Awake => 1,
            AgentStatus::Working => 2,
        }
    }

    /// Whichever status is more awake.
    pub fn more_awake(self, other: AgentStatus) -> AgentStatus {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AgentStatus::Awake | AgentStatus::Working)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub status: AgentStatus,
    pub initial: char,
    #[serde(default)]
    pub is_config_managed: bool,
}

/// First alphanumeric character of a name, uppercased; `?` when there is none.
pub fn initial_of(name: &str) -> char {
    name.chars()
        .find(|c| c.is_alphanumeric())
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('?')
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub role: ChatRole,
    #[serde(default)]
    pub author: String,
    pub message: String,
    #[serde(default)]
    pub time: String,
    /// Origin channel, e.g. `telegram`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            role,
            author: author.into(),
            message: message.into(),
            time: chrono::Utc::now().format("%H:%M").to_string(),
            source: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalFile {
    pub name: String,
    pub description: String,
    pub icon: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub last_modified: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub icon: String,
    pub title: String,
    pub detail: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    pub id: String,
    pub time: String,
    pub title: String,
    pub detail: String,
    pub kind: String,
}

/// Timeline kind recorded for emergency actions.
pub const EMERGENCY_KIND: &str = "emergency";

impl TimelineItem {
    pub fn new(kind: &str, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: format!("tl-{}", ulid::Ulid::new()),
            time: chrono::Utc::now().format("%H:%M").to_string(),
            title: title.into(),
            detail: detail.into(),
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkillIntegration {
    pub id: String,
    pub name: String,
    pub status: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemorySpace {
    pub id: String,
    pub name: String,
    pub entries: u64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryGraphLink {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigCheck {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationValidator {
    pub status: String,
    pub score: u32,
    pub checks: Vec<ConfigCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentTokenUsage {
    pub agent: String,
    pub tokens: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub estimated_cost: f64,
    pub budget: u64,
    pub budget_used_percent: f64,
    pub by_agent: Vec<AgentTokenUsage>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FindingSummary {
    #[serde(default)]
    pub critical: u32,
    #[serde(default)]
    pub warn: u32,
    #[serde(default)]
    pub info: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAlert {
    pub id: String,
    pub severity: String,
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityActivity {
    pub id: String,
    pub severity: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    pub score: u32,
    pub summary: FindingSummary,
    pub alerts: Vec<SecurityAlert>,
    pub recent_activity: Vec<SecurityActivity>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    #[default]
    Idle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentHealth {
    pub agent: String,
    pub state: HealthState,
    pub last_active_age_ms: Option<u64>,
    pub response_time_ms: u64,
    pub success_rate: f64,
    pub cpu_usage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GatewayHealth {
    pub reachable: bool,
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub overall: HealthState,
    pub gateway: GatewayHealth,
    pub agents: Vec<AgentHealth>,
}

/// Fully derived point-in-time view of all mission data.
///
/// Every key is always present; sections that could not be derived hold
/// empty arrays or zeroed values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MissionSnapshot {
    pub agents: Vec<Agent>,
    pub local_files: Vec<LocalFile>,
    pub tasks: Vec<Task>,
    pub feed_items: Vec<FeedItem>,
    pub timeline_items: Vec<TimelineItem>,
    pub chat_messages: Vec<ChatMessage>,
    pub skill_integrations: Vec<SkillIntegration>,
    pub memory_spaces: Vec<MemorySpace>,
    pub memory_graph_links: Vec<MemoryGraphLink>,
    pub configuration_validator: ConfigurationValidator,
    pub token_usage: TokenUsage,
    pub security: Security,
    pub health: Health,
}
