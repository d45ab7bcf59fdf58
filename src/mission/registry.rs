//! Configured agents: agents created through the REST surface and persisted
//! to `agents.json`, with API keys kept apart in `secrets.json`.
//!
//! The two files are always written as a pair. A failed write restores both,
//! so neither file ever references an entry the other lacks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::merge::names_match;
use super::types::{initial_of, Agent, AgentStatus};
use crate::error::{Error, Result};
use crate::persist::write_all_or_rollback;

pub const AGENTS_FILE: &str = "agents.json";
pub const SECRETS_FILE: &str = "secrets.json";

const NAME_MAX_LEN: usize = 40;

fn name_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9 _.-]+$").ok()).as_ref()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguredAgent {
    pub id: String,
    pub name: String,
    pub role: String,
    pub model: String,
    #[serde(default)]
    pub created_at: String,
}

impl ConfiguredAgent {
    /// View of this entry as a snapshot agent. Status starts idle; runtime
    /// data may raise it during the merge.
    pub fn to_agent(&self) -> Agent {
        Agent {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
            model: Some(self.model.clone()),
            status: AgentStatus::Idle,
            initial: initial_of(&self.name),
            is_config_managed: true,
        }
    }
}

/// Create/update request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl AgentDraft {
    /// Every violation in the draft, in field order.
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        let name = self.name.trim();
        if name.is_empty() {
            out.push("Agent name is required.".to_string());
        } else {
            if name.chars().count() > NAME_MAX_LEN {
                out.push(format!("Agent name must be at most {} characters.", NAME_MAX_LEN));
            }
            if !name_re().map(|re| re.is_match(name)).unwrap_or(false) {
                out.push(
                    "Agent name may only contain letters, numbers, spaces, '.', '_' and '-'."
                        .to_string(),
                );
            }
        }
        if self.role.trim().is_empty() {
            out.push("Agent role is required.".to_string());
        }
        if self.model.trim().is_empty() {
            out.push("Agent model is required.".to_string());
        }
        out
    }
}

type Secrets = BTreeMap<String, String>;

pub struct AgentRegistry {
    dir: PathBuf,
    agents: Mutex<Vec<ConfiguredAgent>>,
}

impl AgentRegistry {
    /// Load the registry from `dir`. Missing files mean no configured agents.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let agents_path = dir.join(AGENTS_FILE);
        let agents: Vec<ConfiguredAgent> = if agents_path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&agents_path)?)?
        } else {
            Vec::new()
        };
        tracing::debug!("Loaded {} configured agent(s) from {}", agents.len(), dir.display());
        Ok(Self {
            dir,
            agents: Mutex::new(agents),
        })
    }

    pub fn agents_path(&self) -> PathBuf {
        self.dir.join(AGENTS_FILE)
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.dir.join(SECRETS_FILE)
    }

    /// Paths of the files a mutation writes.
    pub fn config_files(&self) -> Vec<String> {
        [self.agents_path(), self.secrets_path()]
            .iter()
            .map(|p| p.display().to_string())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConfiguredAgent>> {
        self.agents.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn list(&self) -> Vec<ConfiguredAgent> {
        self.lock().clone()
    }

    /// Configured agents as snapshot agents.
    pub fn snapshot_agents(&self) -> Vec<Agent> {
        self.lock().iter().map(ConfiguredAgent::to_agent).collect()
    }

    pub fn get(&self, id: &str) -> Option<ConfiguredAgent> {
        self.lock().iter().find(|a| a.id == id.trim()).cloned()
    }

    pub fn create(&self, draft: &AgentDraft) -> Result<ConfiguredAgent> {
        check(draft)?;

        let mut agents = self.lock();
        let name = draft.name.trim();
        if agents.iter().any(|a| names_match(&a.name, name)) {
            return Err(Error::Conflict("Agent name already exists in config.".to_string()));
        }

        let agent = ConfiguredAgent {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            role: draft.role.trim().to_string(),
            model: draft.model.trim().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let mut next = agents.clone();
        next.push(agent.clone());
        let mut secrets = self.read_secrets()?;
        if let Some(key) = api_key(draft) {
            secrets.insert(agent.id.clone(), key);
        }

        self.write_pair(&next, &secrets)?;
        *agents = next;
        tracing::info!("Created configured agent {} ({})", agent.name, agent.id);
        Ok(agent)
    }

    /// Replace name, role and model. A missing or blank `apiKey` keeps the
    /// stored key.
    pub fn update(&self, id: &str, draft: &AgentDraft) -> Result<ConfiguredAgent> {
        check(draft)?;

        let mut agents = self.lock();
        let index = agents
            .iter()
            .position(|a| a.id == id.trim())
            .ok_or_else(|| Error::NotFound(format!("Agent not found: {}", id)))?;

        let name = draft.name.trim();
        if agents
            .iter()
            .enumerate()
            .any(|(i, a)| i != index && names_match(&a.name, name))
        {
            return Err(Error::Conflict("Agent name already exists in config.".to_string()));
        }

        let mut next = agents.clone();
        let agent = &mut next[index];
        agent.name = name.to_string();
        agent.role = draft.role.trim().to_string();
        agent.model = draft.model.trim().to_string();
        let updated = agent.clone();

        let mut secrets = self.read_secrets()?;
        if let Some(key) = api_key(draft) {
            secrets.insert(updated.id.clone(), key);
        }

        self.write_pair(&next, &secrets)?;
        *agents = next;
        tracing::info!("Updated configured agent {} ({})", updated.name, updated.id);
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> Result<ConfiguredAgent> {
        let mut agents = self.lock();
        let index = agents
            .iter()
            .position(|a| a.id == id.trim())
            .ok_or_else(|| Error::NotFound(format!("Agent not found: {}", id)))?;

        let mut next = agents.clone();
        let removed = next.remove(index);
        let mut secrets = self.read_secrets()?;
        secrets.remove(&removed.id);

        self.write_pair(&next, &secrets)?;
        *agents = next;
        tracing::info!("Deleted configured agent {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    fn read_secrets(&self) -> Result<Secrets> {
        read_secrets(&self.secrets_path())
    }

    fn write_pair(&self, agents: &[ConfiguredAgent], secrets: &Secrets) -> Result<()> {
        let agents_path = self.agents_path();
        let secrets_path = self.secrets_path();
        write_all_or_rollback(&[
            (agents_path.as_path(), serde_json::to_vec_pretty(agents)?),
            (secrets_path.as_path(), serde_json::to_vec_pretty(secrets)?),
        ])
    }
}

fn check(draft: &AgentDraft) -> Result<()> {
    let violations = draft.violations();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::invalid_all(violations))
    }
}

fn api_key(draft: &AgentDraft) -> Option<String> {
    draft
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ToString::to_string)
}

fn read_secrets(path: &Path) -> Result<Secrets> {
    if !path.exists() {
        return Ok(Secrets::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Persistence(format!("could not read {}: {}", SECRETS_FILE, e)))?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn draft(name: &str) -> AgentDraft {
        AgentDraft {
            name: name.to_string(),
            role: "Research".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: Some("sk-test".to_string()),
        }
    }

    #[test]
    fn duplicate_name_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::open(dir.path()).unwrap();

        registry.create(&draft("Jarvis")).unwrap();
        let err = registry.create(&draft("jarvis")).unwrap_err();
        assert!(matches!(&err, Error::Conflict(m) if m == "Agent name already exists in config."));
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn validation_reports_every_violation() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::open(dir.path()).unwrap();
        let bad = AgentDraft {
            name: "bad/name".to_string(),
            ..AgentDraft::default()
        };
        match registry.create(&bad).unwrap_err() {
            Error::InvalidInput { message, details } => {
                assert!(message.contains("may only contain"));
                assert_eq!(details.len(), 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!registry.agents_path().exists());
    }

    #[test]
    fn create_writes_config_and_secret_pair() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::open(dir.path()).unwrap();
        let agent = registry.create(&draft("Friday")).unwrap();

        let secrets = read_secrets(&registry.secrets_path()).unwrap();
        assert_eq!(secrets.get(&agent.id).map(String::as_str), Some("sk-test"));

        let config = std::fs::read_to_string(registry.agents_path()).unwrap();
        assert!(!config.contains("sk-test"));

        let reopened = AgentRegistry::open(dir.path()).unwrap();
        assert_eq!(reopened.list(), vec![agent]);
    }

    #[test]
    fn update_allows_keeping_own_name_and_keeps_key() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::open(dir.path()).unwrap();
        let a = registry.create(&draft("Friday")).unwrap();
        registry.create(&draft("Edith")).unwrap();

        let mut change = draft("FRIDAY");
        change.api_key = None;
        change.role = "Ops".to_string();
        let updated = registry.update(&a.id, &change).unwrap();
        assert_eq!(updated.role, "Ops");
        assert_eq!(updated.id, a.id);

        let secrets = read_secrets(&registry.secrets_path()).unwrap();
        assert_eq!(secrets.get(&a.id).map(String::as_str), Some("sk-test"));

        assert!(matches!(registry.update(&a.id, &draft("edith")), Err(Error::Conflict(_))));
        assert!(matches!(registry.update("missing", &draft("Nova")), Err(Error::NotFound(_))));
    }

    #[test]
    fn delete_removes_the_secret_too() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::open(dir.path()).unwrap();
        let a = registry.create(&draft("Friday")).unwrap();

        registry.delete(&a.id).unwrap();
        assert!(registry.list().is_empty());
        assert!(read_secrets(&registry.secrets_path()).unwrap().is_empty());
        assert!(matches!(registry.delete(&a.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn failed_write_leaves_registry_unchanged() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::open(dir.path()).unwrap();
        registry.create(&draft("Friday")).unwrap();
        let before = std::fs::read(registry.agents_path()).unwrap();

        std::fs::remove_file(registry.secrets_path()).unwrap();
        std::fs::create_dir(registry.secrets_path()).unwrap();

        assert!(registry.create(&draft("Edith")).is_err());
        assert_eq!(registry.list().len(), 1);
        assert_eq!(std::fs::read(registry.agents_path()).unwrap(), before);
    }
}
