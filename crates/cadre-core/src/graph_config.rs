//! Declarative topology document: workers, supervisor, and the edges between them.
//!
//! Loaded once at startup from JSON and immutable afterwards. [`GraphConfig::validate`]
//! rejects any edge that names a node which was never declared, so a graph is
//! either built whole or not at all.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CadreError, Result};
use crate::types::FINISH;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Per-worker invocation ceiling for one session.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    pub agents: BTreeMap<String, AgentSpec>,
    pub supervisor: SupervisorSpec,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default)]
    pub conditional_edges: Vec<ConditionalEdgeSpec>,
}

fn default_max_turns() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    #[serde(default)]
    pub tools: Vec<String>,
    /// System prompt override. `None` selects the built-in prompt for the worker.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Shown to the supervisor when it picks the next worker.
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorSpec {
    pub name: String,
    pub prompt: String,
}

/// Unconditional transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub sender: String,
    pub receiver: String,
    #[serde(default)]
    pub edge_type: EdgeType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    #[default]
    Edge,
}

/// Router-driven branch point. Only the keys of `receivers` are meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalEdgeSpec {
    pub sender: String,
    pub receivers: BTreeMap<String, serde_json::Value>,
}

impl GraphConfig {
    /// Parse a topology document from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CadreError::Config(e.to_string()))
    }

    /// Load a topology document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = crate::config::read_config_file(path)?;
        Self::from_json(&content)
    }

    /// Worker names in a stable order.
    pub fn worker_names(&self) -> Vec<&str> {
        self.agents.keys().map(|k| k.as_str()).collect()
    }

    /// `(name, description)` for every worker, in the same order as [`Self::worker_names`].
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        self.agents
            .iter()
            .map(|(name, spec)| (name.as_str(), spec.description.as_str()))
            .collect()
    }

    fn is_node(&self, name: &str) -> bool {
        name == self.supervisor.name || self.agents.contains_key(name)
    }

    /// Check that every referenced node exists and each sender has one way out.
    pub fn validate(&self) -> Result<()> {
        let supervisor = self.supervisor.name.trim();
        if supervisor.is_empty() {
            return Err(CadreError::Config("supervisor.name must not be empty".into()));
        }
        if supervisor == FINISH {
            return Err(CadreError::Config(format!(
                "supervisor.name must not be the reserved name {}",
                FINISH
            )));
        }

        for name in self.agents.keys() {
            if name.trim().is_empty() {
                return Err(CadreError::Config("agent names must not be empty".into()));
            }
            if name == FINISH {
                return Err(CadreError::Config(format!(
                    "agent name {} is reserved",
                    FINISH
                )));
            }
            if *name == self.supervisor.name {
                return Err(CadreError::Config(format!(
                    "agent '{}' has the same name as the supervisor",
                    name
                )));
            }
        }

        let mut unconditional: HashMap<&str, &str> = HashMap::new();
        for relation in &self.relations {
            for end in [&relation.sender, &relation.receiver] {
                if !self.is_node(end) {
                    return Err(CadreError::Config(format!(
                        "relation {} -> {} references unknown node '{}'",
                        relation.sender, relation.receiver, end
                    )));
                }
            }
            if let Some(existing) = unconditional.insert(&relation.sender, &relation.receiver) {
                return Err(CadreError::Config(format!(
                    "node '{}' has more than one unconditional edge ({} and {})",
                    relation.sender, existing, relation.receiver
                )));
            }
        }

        let mut branching: HashSet<&str> = HashSet::new();
        for edge in &self.conditional_edges {
            if !self.is_node(&edge.sender) {
                return Err(CadreError::Config(format!(
                    "conditional edge references unknown sender '{}'",
                    edge.sender
                )));
            }
            for receiver in edge.receivers.keys() {
                if receiver != FINISH && !self.is_node(receiver) {
                    return Err(CadreError::Config(format!(
                        "conditional edge from '{}' references unknown receiver '{}'",
                        edge.sender, receiver
                    )));
                }
            }
            if unconditional.contains_key(edge.sender.as_str()) {
                return Err(CadreError::Config(format!(
                    "node '{}' has both an unconditional and a conditional edge",
                    edge.sender
                )));
            }
            if !branching.insert(&edge.sender) {
                return Err(CadreError::Config(format!(
                    "node '{}' has more than one conditional edge",
                    edge.sender
                )));
            }
        }

        Ok(())
    }
}
