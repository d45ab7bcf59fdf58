//! Shape of the point-in-time report returned by the external status provider.
//!
//! Every field defaults, so partial or older reports still parse.

use serde::{Deserialize, Serialize};

use crate::mission::FindingSummary;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    #[serde(default)]
    pub agents: AgentsSection,
    #[serde(default)]
    pub sessions: Sessions,
    #[serde(default)]
    pub security_audit: SecurityAudit,
    #[serde(default)]
    pub gateway: Gateway,
    #[serde(default)]
    pub channel_summary: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentsSection {
    #[serde(default)]
    pub agents: Vec<RuntimeAgent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeAgent {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_active_age_ms: Option<u64>,
    #[serde(default)]
    pub workspace_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sessions {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub recent: Vec<SessionInfo>,
    #[serde(default)]
    pub by_agent: Vec<AgentSessions>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub age_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSessions {
    pub agent_id: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub recent: Vec<SessionInfo>,
}

impl AgentSessions {
    /// Token total for this agent: the reported total, else the sum of its
    /// recent sessions.
    pub fn tokens(&self) -> u64 {
        self.total_tokens
            .unwrap_or_else(|| {
                self.recent
                    .iter()
                    .filter_map(|s| s.total_tokens)
                    .fold(0u64, u64::saturating_add)
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAudit {
    #[serde(default)]
    pub summary: FindingSummary,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(default)]
    pub check_id: Option<String>,
    /// `critical`, `warn` or `info`.
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    #[serde(default)]
    pub reachable: bool,
    #[serde(default)]
    pub connect_latency_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_report() {
        let report: StatusReport = serde_json::from_str(
            r#"{
                "agents": {"agents": [{"id": "main", "lastActiveAgeMs": 5000, "workspaceDir": "/w"}]},
                "sessions": {"count": 2, "byAgent": [{"agentId": "main", "recent": [{"totalTokens": 700}, {"totalTokens": 300}]}]},
                "securityAudit": {"summary": {"critical": 1}},
                "extra": true
            }"#,
        )
        .unwrap();

        assert_eq!(report.agents.agents[0].last_active_age_ms, Some(5000));
        assert_eq!(report.sessions.by_agent[0].tokens(), 1000);
        assert_eq!(report.security_audit.summary.critical, 1);
        assert!(!report.gateway.reachable);
    }

    #[test]
    fn recent_session_tokens_saturate() {
        let sessions = AgentSessions {
            agent_id: "main".into(),
            recent: vec![
                SessionInfo {
                    total_tokens: Some(u64::MAX),
                    ..SessionInfo::default()
                },
                SessionInfo {
                    total_tokens: Some(5),
                    ..SessionInfo::default()
                },
            ],
            ..AgentSessions::default()
        };
        assert_eq!(sessions.tokens(), u64::MAX);
    }
}
