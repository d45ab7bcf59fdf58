//! Deterministic snapshot sections.
//!
//! Every number here is a function of its inputs. Nothing reads the clock
//! except through the `now` argument, and nothing is random.

use chrono::{DateTime, Utc};

use super::merge::names_match;
use super::store::placeholder_id;
use super::types::*;
use crate::config::Budget;
use crate::status::report::{SecurityAudit, StatusReport};

/// Token total shown while no session data is available.
pub const FALLBACK_TOKENS: u64 = 48_000;

/// Placeholder tasks seeded from the workspace on first build.
pub const PLACEHOLDER_CAP: usize = 6;

pub const ALERT_CAP: usize = 4;
pub const ACTIVITY_CAP: usize = 6;

const WORKING_WINDOW_MS: u64 = 2 * 60 * 1000;
const AWAKE_WINDOW_MS: u64 = 30 * 60 * 1000;
const HEALTHY_WINDOW_MS: u64 = 120_000;

/// Status implied by how long ago an agent was last active.
pub fn runtime_status(last_active_age_ms: Option<u64>) -> AgentStatus {
    match last_active_age_ms {
        Some(age) if age <= WORKING_WINDOW_MS => AgentStatus::Working,
        Some(age) if age <= AWAKE_WINDOW_MS => AgentStatus::Awake,
        _ => AgentStatus::Idle,
    }
}

/// Agents reported by the status provider.
pub fn runtime_agents(report: &StatusReport) -> Vec<Agent> {
    report
        .agents
        .agents
        .iter()
        .filter(|a| !a.id.trim().is_empty())
        .map(|a| {
            let name = a
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(a.id.trim())
                .to_string();
            let model = report
                .sessions
                .recent
                .iter()
                .chain(report.sessions.by_agent.iter().flat_map(|b| b.recent.iter()))
                .filter(|s| s.agent_id == a.id)
                .find_map(|s| s.model.clone());
            Agent {
                id: a.id.trim().to_string(),
                initial: initial_of(&name),
                name,
                role: "Runtime agent".to_string(),
                model,
                status: runtime_status(a.last_active_age_ms),
                is_config_managed: false,
            }
        })
        .collect()
}

/// Last-active age of an agent, looked up by id or name.
pub fn last_active_age(report: Option<&StatusReport>, agent: &Agent) -> Option<u64> {
    report?
        .agents
        .agents
        .iter()
        .find(|r| {
            names_match(&r.id, &agent.id)
                || names_match(&r.id, &agent.name)
                || r.name.as_deref().is_some_and(|n| names_match(n, &agent.name))
        })
        .and_then(|r| r.last_active_age_ms)
}

/// Tasks seeded from the workspace listing. Lanes cycle through the board
/// and assignees rotate through `agents`.
pub fn placeholder_tasks(run_id: &str, files: &[LocalFile], agents: &[Agent]) -> Vec<Task> {
    files
        .iter()
        .filter(|f| f.kind != "folder")
        .take(PLACEHOLDER_CAP)
        .enumerate()
        .map(|(i, file)| {
            let assignee = (!agents.is_empty()).then(|| agents[i % agents.len()].name.clone());
            Task {
                id: placeholder_id(run_id, i + 1),
                column: Column::ALL[i % Column::ALL.len()],
                title: format!("Review {}", file.name),
                description: file.description.clone(),
                time: file.last_modified.clone(),
                assignee_initial: assignee.as_deref().map(|a| initial_of(a).to_string()),
                assignee,
            }
        })
        .collect()
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn token_usage(report: Option<&StatusReport>, budget: &Budget) -> TokenUsage {
    let rate = budget.cost_per_1k_tokens;
    let cost_of = |tokens: u64| round_to(tokens as f64 / 1000.0 * rate, 4);

    let by_agent: Vec<AgentTokenUsage> = report
        .map(|r| {
            r.sessions
                .by_agent
                .iter()
                .map(|a| (a.agent_id.clone(), a.tokens()))
                .filter(|(_, tokens)| *tokens > 0)
                .map(|(agent, tokens)| AgentTokenUsage {
                    agent,
                    tokens,
                    cost: cost_of(tokens),
                })
                .collect()
        })
        .unwrap_or_default();

    let counted = by_agent.iter().map(|a| a.tokens).fold(0u64, u64::saturating_add);
    let total_tokens = if counted == 0 { FALLBACK_TOKENS } else { counted };

    let percent = if budget.token_budget == 0 {
        0.0
    } else {
        round_to(total_tokens as f64 / budget.token_budget as f64 * 100.0, 1)
    };

    let suggestion = if percent > 85.0 {
        "Switch lower-priority agents to a cheaper model tier"
    } else if percent > 60.0 {
        "Review long-running sessions before the budget tightens"
    } else {
        "Token usage is within budget"
    };

    TokenUsage {
        total_tokens,
        estimated_cost: cost_of(total_tokens),
        budget: budget.token_budget,
        budget_used_percent: percent,
        by_agent,
        suggestions: vec![suggestion.to_string()],
    }
}

/// `100 - 22c - 8w - 3i`, clamped to `[30, 100]`.
pub fn security_score(summary: &FindingSummary) -> u32 {
    let penalty =
        22 * i64::from(summary.critical) + 8 * i64::from(summary.warn) + 3 * i64::from(summary.info);
    (100 - penalty).clamp(30, 100) as u32
}

fn alert_severity(finding: &str) -> Option<&'static str> {
    match finding.trim().to_ascii_lowercase().as_str() {
        "critical" => Some("high"),
        "warn" | "warning" => Some("medium"),
        _ => None,
    }
}

pub fn security(audit: Option<&SecurityAudit>) -> Security {
    let Some(audit) = audit else {
        return Security {
            score: security_score(&FindingSummary::default()),
            ..Security::default()
        };
    };

    let mut summary = audit.summary;
    if summary == FindingSummary::default() {
        for f in &audit.findings {
            match f.severity.trim().to_ascii_lowercase().as_str() {
                "critical" => summary.critical += 1,
                "warn" | "warning" => summary.warn += 1,
                _ => summary.info += 1,
            }
        }
    }

    let alerts = audit
        .findings
        .iter()
        .enumerate()
        .filter_map(|(i, f)| {
            alert_severity(&f.severity).map(|severity| SecurityAlert {
                id: f.check_id.clone().unwrap_or_else(|| format!("alert-{}", i + 1)),
                severity: severity.to_string(),
                title: f.title.clone(),
                detail: f.detail.clone(),
            })
        })
        .take(ALERT_CAP)
        .collect();

    let recent_activity = audit
        .findings
        .iter()
        .enumerate()
        .take(ACTIVITY_CAP)
        .map(|(i, f)| SecurityActivity {
            id: format!("activity-{}", i + 1),
            severity: alert_severity(&f.severity).unwrap_or("low").to_string(),
            message: if f.detail.is_empty() {
                f.title.clone()
            } else {
                format!("{}: {}", f.title, f.detail)
            },
        })
        .collect();

    Security {
        score: security_score(&summary),
        summary,
        alerts,
        recent_activity,
    }
}

/// Health of one agent. Metrics degrade monotonically with age; an unknown
/// age is reported as idle with age-zero metrics.
pub fn agent_health(name: &str, status: AgentStatus, age_ms: Option<u64>) -> AgentHealth {
    let s = age_ms.unwrap_or(0) / 1000;
    let state = match age_ms {
        Some(age) if status.is_active() && age <= HEALTHY_WINDOW_MS => HealthState::Healthy,
        Some(_) if status.is_active() => HealthState::Degraded,
        _ => HealthState::Idle,
    };
    AgentHealth {
        agent: name.to_string(),
        state,
        last_active_age_ms: age_ms,
        response_time_ms: (120 + 3 * s).min(5000),
        success_rate: (995 - (15 * (s / 60)).min(495)) as f64 / 10.0,
        cpu_usage: (15 + s / 10).min(95) as u32,
    }
}

pub fn health(agents: &[Agent], report: Option<&StatusReport>) -> Health {
    let agents: Vec<AgentHealth> = agents
        .iter()
        .map(|a| agent_health(&a.name, a.status, last_active_age(report, a)))
        .collect();

    let overall = if agents.iter().any(|h| h.state == HealthState::Degraded) {
        HealthState::Degraded
    } else if agents.iter().any(|h| h.state == HealthState::Healthy) {
        HealthState::Healthy
    } else {
        HealthState::Idle
    };

    let gateway = report
        .map(|r| GatewayHealth {
            reachable: r.gateway.reachable,
            latency_ms: r.gateway.connect_latency_ms,
        })
        .unwrap_or_default();

    Health {
        overall,
        gateway,
        agents,
    }
}

fn count_in(tasks: &[Task], column: Column) -> usize {
    tasks.iter().filter(|t| t.column == column).count()
}

pub fn feed_items(
    agents: &[Agent],
    tasks: &[Task],
    files: &[LocalFile],
    security: &Security,
    tokens: &TokenUsage,
    now: DateTime<Utc>,
) -> Vec<FeedItem> {
    let time = now.format("%H:%M").to_string();
    let active = agents.iter().filter(|a| a.status.is_active()).count();
    let item = |id: &str, icon: &str, title: String, detail: String| FeedItem {
        id: id.to_string(),
        icon: icon.to_string(),
        title,
        detail,
        time: time.clone(),
    };

    vec![
        item(
            "feed-agents",
            "🤖",
            format!("{}/{} agents active", active, agents.len()),
            format!("{} configured", agents.iter().filter(|a| a.is_config_managed).count()),
        ),
        item(
            "feed-tasks",
            "📋",
            format!("{} tasks on the board", tasks.len()),
            format!(
                "{} inbox, {} assigned, {} in progress, {} in review",
                count_in(tasks, Column::Inbox),
                count_in(tasks, Column::Assigned),
                count_in(tasks, Column::Progress),
                count_in(tasks, Column::Review)
            ),
        ),
        item(
            "feed-security",
            "🛡️",
            format!("Security score {}", security.score),
            format!(
                "{} critical, {} warn, {} info",
                security.summary.critical, security.summary.warn, security.summary.info
            ),
        ),
        item(
            "feed-files",
            "📁",
            format!("{} workspace files", files.len()),
            files
                .first()
                .map(|f| format!("Latest: {}", f.name))
                .unwrap_or_else(|| "Workspace is empty".to_string()),
        ),
        item(
            "feed-tokens",
            "🪙",
            format!("{} tokens used", tokens.total_tokens),
            format!("{}% of budget", tokens.budget_used_percent),
        ),
    ]
}

/// Recorded timeline, preceded by the most recent workspace file changes.
pub fn timeline_items(files: &[LocalFile], recorded: &[TimelineItem]) -> Vec<TimelineItem> {
    files
        .iter()
        .take(5)
        .map(|f| TimelineItem {
            id: format!("tl-file-{}", f.name),
            time: f.last_modified.clone(),
            title: "File updated".to_string(),
            detail: f.name.clone(),
            kind: "file".to_string(),
        })
        .chain(recorded.iter().cloned())
        .collect()
}

pub fn skill_integrations(
    report: Option<&StatusReport>,
    provider_configured: bool,
    relay_channel: Option<&str>,
    files: &[LocalFile],
) -> Vec<SkillIntegration> {
    let skill = |id: &str, name: &str, status: &str, detail: String| SkillIntegration {
        id: id.to_string(),
        name: name.to_string(),
        status: status.to_string(),
        detail,
    };

    let mut skills = vec![
        match (provider_configured, report) {
            (false, _) => skill("status", "Status provider", "disabled", "Not configured".to_string()),
            (true, None) => skill("status", "Status provider", "offline", "Unavailable".to_string()),
            (true, Some(r)) => skill(
                "status",
                "Status provider",
                "connected",
                format!("{} agents, {} sessions", r.agents.agents.len(), r.sessions.count),
            ),
        },
        match relay_channel {
            Some(channel) => skill("relay", "Messaging relay", "connected", format!("Active channel: {}", channel)),
            None => skill("relay", "Messaging relay", "disabled", "No active channel".to_string()),
        },
        skill("workspace", "Workspace", "connected", format!("{} files", files.len())),
    ];

    if let Some(r) = report {
        skills.extend(r.channel_summary.iter().enumerate().map(|(i, line)| {
            skill(&format!("channel-{}", i + 1), line, "reported", "From gateway channel summary".to_string())
        }));
    }
    skills
}

pub fn memory_spaces(
    files: &[LocalFile],
    tasks: &[Task],
    chat: &[ChatMessage],
    report: Option<&StatusReport>,
) -> Vec<MemorySpace> {
    let space = |id: &str, name: &str, entries: usize, description: &str| MemorySpace {
        id: id.to_string(),
        name: name.to_string(),
        entries: entries as u64,
        description: description.to_string(),
    };
    vec![
        space("workspace", "Workspace", files.len(), "Files in the agent workspace"),
        space("tasks", "Task board", tasks.len(), "Tasks across all lanes"),
        space("chat", "Conversation", chat.len(), "Retained chat messages"),
        MemorySpace {
            entries: report.map(|r| r.sessions.count).unwrap_or(0),
            ..space("sessions", "Sessions", 0, "Sessions reported by the gateway")
        },
    ]
}

/// Links from each agent to the spaces it touches, weighted by how often.
/// Zero-weight links are omitted.
pub fn memory_graph_links(agents: &[Agent], tasks: &[Task], chat: &[ChatMessage]) -> Vec<MemoryGraphLink> {
    let mut links = Vec::new();
    for agent in agents {
        let assigned = tasks
            .iter()
            .filter(|t| t.assignee.as_deref().is_some_and(|a| names_match(a, &agent.name)))
            .count() as u64;
        let messages = chat.iter().filter(|m| names_match(&m.author, &agent.name)).count() as u64;

        for (target, weight) in [("tasks", assigned), ("chat", messages)] {
            if weight > 0 {
                links.push(MemoryGraphLink {
                    source: agent.name.clone(),
                    target: target.to_string(),
                    weight,
                });
            }
        }
    }
    links
}

pub struct ValidatorInputs<'a> {
    pub configured_agents: usize,
    pub provider_configured: bool,
    pub report_present: bool,
    pub files: usize,
    pub relay_channel: Option<&'a str>,
    pub tokens: &'a TokenUsage,
}

pub fn configuration_validator(inputs: &ValidatorInputs<'_>) -> ConfigurationValidator {
    let check = |name: &str, ok: bool, detail: String| ConfigCheck {
        name: name.to_string(),
        ok,
        detail,
    };

    let checks = vec![
        check(
            "Configured agents",
            inputs.configured_agents > 0,
            format!("{} configured", inputs.configured_agents),
        ),
        check(
            "Status provider",
            inputs.report_present,
            match (inputs.provider_configured, inputs.report_present) {
                (false, _) => "Not configured".to_string(),
                (true, false) => "Unavailable".to_string(),
                (true, true) => "Reachable".to_string(),
            },
        ),
        check("Workspace", inputs.files > 0, format!("{} files", inputs.files)),
        check(
            "Messaging relay",
            inputs.relay_channel.is_some(),
            inputs
                .relay_channel
                .map(|c| format!("Active channel: {}", c))
                .unwrap_or_else(|| "No active channel".to_string()),
        ),
        check(
            "Token budget",
            inputs.tokens.budget_used_percent <= 85.0,
            format!("{}% used", inputs.tokens.budget_used_percent),
        ),
    ];

    let passed = checks.iter().filter(|c| c.ok).count() as u32;
    let score = passed * 100 / checks.len() as u32;
    let status = match score {
        100 => "valid",
        60..=99 => "warning",
        _ => "error",
    };

    ConfigurationValidator {
        status: status.to_string(),
        score,
        checks,
    }
}
