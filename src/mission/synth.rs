//! Snapshot Synthesizer.
//!
//! Builds a [`MissionSnapshot`] from the store, the configured agents, the
//! workspace listing and (when reachable) the external status report. The
//! public entry point never fails: an upstream outage degrades to
//! configured-agents-only data, and any other failure degrades to a minimal
//! snapshot with zeroed analytics.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::analytics::{self, ValidatorInputs};
use super::merge;
use super::registry::AgentRegistry;
use super::store::MissionStore;
use super::types::MissionSnapshot;
use crate::config::{Budget, Settings};
use crate::error::Result;
use crate::status::{fetch_or_absent, StatusProvider, StatusReport};
use crate::telegram::ChannelSelector;

pub struct SnapshotSynthesizer {
    store: Arc<MissionStore>,
    registry: Arc<AgentRegistry>,
    provider: Option<Arc<dyn StatusProvider>>,
    status_timeout: Duration,
    workspace: PathBuf,
    budget: Budget,
    channels: Arc<ChannelSelector>,
    run_id: String,
}

impl SnapshotSynthesizer {
    pub fn new(store: Arc<MissionStore>, registry: Arc<AgentRegistry>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            store,
            registry,
            provider: None,
            status_timeout: Duration::from_millis(4000),
            workspace: workspace.into(),
            budget: Budget::default(),
            channels: Arc::new(ChannelSelector::default()),
            run_id: ulid::Ulid::new().to_string(),
        }
    }

    /// Synthesizer wired from settings.
    pub fn from_settings(
        settings: &Settings,
        store: Arc<MissionStore>,
        registry: Arc<AgentRegistry>,
        provider: Option<Arc<dyn StatusProvider>>,
        channels: Arc<ChannelSelector>,
    ) -> Self {
        let mut synth = Self::new(store, registry, settings.workspace.resolve())
            .with_budget(settings.budget.clone())
            .with_channels(channels);
        synth.provider = provider;
        synth.status_timeout = Duration::from_millis(settings.status.timeout_ms);
        synth
    }

    pub fn with_provider(mut self, provider: Arc<dyn StatusProvider>, timeout: Duration) -> Self {
        self.provider = Some(provider);
        self.status_timeout = timeout;
        self
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_channels(mut self, channels: Arc<ChannelSelector>) -> Self {
        self.channels = channels;
        self
    }

    /// Identifier of this process's placeholder tasks.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn store(&self) -> &Arc<MissionStore> {
        &self.store
    }

    /// Fetch the external report, resolving errors and timeouts to `None`.
    pub async fn fetch_status(&self) -> Option<StatusReport> {
        let provider = self.provider.as_ref()?;
        fetch_or_absent(provider, self.status_timeout).await
    }

    pub async fn build_snapshot(&self) -> MissionSnapshot {
        let report = self.fetch_status().await;
        self.assemble_or_fallback(report.as_ref(), Utc::now())
    }

    /// Assemble a snapshot from an already-fetched report, falling back to
    /// the minimal snapshot on failure.
    pub fn assemble_or_fallback(&self, report: Option<&StatusReport>, now: DateTime<Utc>) -> MissionSnapshot {
        match self.assemble(report, now) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Snapshot synthesis failed, serving minimal snapshot: {}", e);
                self.fallback_snapshot()
            }
        }
    }

    fn assemble(&self, report: Option<&StatusReport>, now: DateTime<Utc>) -> Result<MissionSnapshot> {
        let configured = self.registry.snapshot_agents();
        let configured_count = configured.len();
        let agents = match report {
            Some(r) => merge::merge_agents(analytics::runtime_agents(r), configured),
            None => merge::dedupe_agents(configured),
        };

        let local_files = crate::workspace::list_files(&self.workspace)?;

        let tasks = self.store.tasks_for_snapshot(&self.run_id, || {
            analytics::placeholder_tasks(&self.run_id, &local_files, &agents)
        });
        let chat_messages = self.store.chat_messages();
        let recorded = self.store.timeline();

        let token_usage = analytics::token_usage(report, &self.budget);
        let security = analytics::security(report.map(|r| &r.security_audit));
        let health = analytics::health(&agents, report);
        let relay_channel = self.channels.active_name();

        let configuration_validator = analytics::configuration_validator(&ValidatorInputs {
            configured_agents: configured_count,
            provider_configured: self.provider.is_some(),
            report_present: report.is_some(),
            files: local_files.len(),
            relay_channel,
            tokens: &token_usage,
        });

        Ok(MissionSnapshot {
            feed_items: analytics::feed_items(&agents, &tasks, &local_files, &security, &token_usage, now),
            timeline_items: analytics::timeline_items(&local_files, &recorded),
            skill_integrations: analytics::skill_integrations(
                report,
                self.provider.is_some(),
                relay_channel,
                &local_files,
            ),
            memory_spaces: analytics::memory_spaces(&local_files, &tasks, &chat_messages, report),
            memory_graph_links: analytics::memory_graph_links(&agents, &tasks, &chat_messages),
            configuration_validator,
            token_usage,
            security,
            health,
            agents,
            local_files,
            tasks,
            chat_messages,
        })
    }

    /// Store contents and configured agents only; every analytics section
    /// is empty or zero.
    pub fn fallback_snapshot(&self) -> MissionSnapshot {
        MissionSnapshot {
            agents: merge::dedupe_agents(self.registry.snapshot_agents()),
            tasks: self.store.tasks(),
            chat_messages: self.store.chat_messages(),
            timeline_items: self.store.timeline(),
            ..MissionSnapshot::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::registry::AgentDraft;
    use crate::mission::types::{AgentStatus, HealthState};
    use crate::realtime::Broadcaster;
    use crate::status::report::{AgentSessions, RuntimeAgent};
    use crate::status::StaticStatusProvider;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        synth: SnapshotSynthesizer,
    }

    fn fixture(provider: Option<StatusReport>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path().join("workspace");
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::write(workspace.join("plan.md"), "plan").unwrap();
        std::fs::write(workspace.join("data.csv"), "a,b").unwrap();

        let registry = Arc::new(AgentRegistry::open(dir.path()).unwrap());
        registry
            .create(&AgentDraft {
                name: "Jarvis".into(),
                role: "Coordinator".into(),
                model: "gpt-4o".into(),
                api_key: None,
            })
            .unwrap();

        let store = Arc::new(MissionStore::new(Broadcaster::new()));
        let synth = SnapshotSynthesizer::new(store, registry, workspace).with_provider(
            Arc::new(StaticStatusProvider::new(provider)),
            Duration::from_millis(200),
        );
        Fixture { _dir: dir, synth }
    }

    #[tokio::test]
    async fn failing_provider_still_yields_complete_snapshot() {
        let f = fixture(None);
        let snapshot = f.synth.build_snapshot().await;

        assert_eq!(snapshot.agents.len(), 1);
        assert_eq!(snapshot.agents[0].name, "Jarvis");
        assert_eq!(snapshot.local_files.len(), 2);
        assert_eq!(snapshot.tasks.len(), 2);
        assert_eq!(snapshot.token_usage.total_tokens, analytics::FALLBACK_TOKENS);
        assert_eq!(snapshot.security.score, 100);
        assert!(!snapshot.health.gateway.reachable);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 13);
    }

    #[tokio::test]
    async fn runtime_agents_merge_with_configured() {
        let mut report = StatusReport::default();
        report.agents.agents = vec![
            RuntimeAgent {
                id: "jarvis".into(),
                last_active_age_ms: Some(5_000),
                ..RuntimeAgent::default()
            },
            RuntimeAgent {
                id: "scout".into(),
                last_active_age_ms: Some(3_600_000),
                ..RuntimeAgent::default()
            },
        ];
        let f = fixture(Some(report));
        let snapshot = f.synth.build_snapshot().await;

        assert_eq!(snapshot.agents.len(), 2);
        let jarvis = snapshot.agents.iter().find(|a| a.name == "Jarvis").unwrap();
        assert_eq!(jarvis.role, "Coordinator");
        assert_eq!(jarvis.status, AgentStatus::Working);
        assert!(jarvis.is_config_managed);

        let jarvis_health = snapshot.health.agents.iter().find(|h| h.agent == "Jarvis").unwrap();
        assert_eq!(jarvis_health.state, HealthState::Healthy);
    }

    #[tokio::test]
    async fn oversized_provider_token_counts_do_not_abort_synthesis() {
        let mut report = StatusReport::default();
        report.sessions.by_agent = ["jarvis", "scout"]
            .iter()
            .map(|id| AgentSessions {
                agent_id: id.to_string(),
                total_tokens: Some(u64::MAX / 2 + 1),
                ..AgentSessions::default()
            })
            .collect();
        let f = fixture(Some(report));

        let snapshot = f.synth.build_snapshot().await;
        assert_eq!(snapshot.token_usage.total_tokens, u64::MAX);
        assert_eq!(snapshot.local_files.len(), 2);
    }

    #[tokio::test]
    async fn placeholders_are_seeded_once_per_store() {
        let f = fixture(None);
        let first = f.synth.build_snapshot().await;
        f.synth.store().move_task(&first.tasks[0].id, "review").unwrap();

        let second = f.synth.build_snapshot().await;
        assert_eq!(second.tasks.len(), first.tasks.len());
        assert_eq!(second.tasks[0].column, crate::mission::Column::Review);
    }

    #[tokio::test]
    async fn unreadable_workspace_degrades_to_minimal_snapshot() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("file.txt");
        std::fs::write(&not_a_dir, "x").unwrap();

        let registry = Arc::new(AgentRegistry::open(dir.path()).unwrap());
        let store = Arc::new(MissionStore::new(Broadcaster::new()));
        let synth = SnapshotSynthesizer::new(store, registry, not_a_dir);

        let snapshot = synth.build_snapshot().await;
        assert!(snapshot.local_files.is_empty());
        assert_eq!(snapshot.security.score, 0);
        assert_eq!(snapshot.token_usage.total_tokens, 0);
        assert!(serde_json::to_value(&snapshot).unwrap()["health"]["agents"].is_array());
    }
}
