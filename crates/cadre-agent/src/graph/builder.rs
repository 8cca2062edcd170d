use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use cadre_core::config::{GraphSettings, ModelConfig, WorkerSettings};
use cadre_core::error::{CadreError, Result};
use cadre_core::event::EventBus;
use cadre_core::graph_config::GraphConfig;
use cadre_core::traits::{DecisionMaker, LlmClient, WorkerCapability};
use cadre_core::types::WorkerProfile;
use cadre_tools::ToolRegistry;

use super::compiled::CompiledGraph;
use super::edge::{ConditionalRoute, Transition};
use super::node::Node;
use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore, SessionLocks};
use crate::prompts;
use crate::react::ReactCapability;
use crate::supervisor::{LlmDecisionMaker, RouteSchema, SupervisorRouter};
use crate::worker::WorkerNode;

/// Assembles a [`CompiledGraph`] from a topology document.
///
/// Workers get a [`ReactCapability`] over the shared LLM unless an override
/// is registered for their name; the supervisor uses an [`LlmDecisionMaker`]
/// unless one is supplied.
pub struct GraphBuilder {
    config: GraphConfig,
    llm: Option<(Arc<dyn LlmClient>, ModelConfig)>,
    tools: Arc<ToolRegistry>,
    capabilities: HashMap<String, Arc<dyn WorkerCapability>>,
    decider: Option<Arc<dyn DecisionMaker>>,
    store: Option<Arc<dyn CheckpointStore>>,
    event_bus: Option<Arc<EventBus>>,
    graph_settings: GraphSettings,
    worker_settings: WorkerSettings,
}

impl GraphBuilder {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            llm: None,
            tools: Arc::new(ToolRegistry::new()),
            capabilities: HashMap::new(),
            decider: None,
            store: None,
            event_bus: None,
            graph_settings: GraphSettings::default(),
            worker_settings: WorkerSettings::default(),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        self.llm = Some((llm, model));
        self
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Use `capability` for the worker called `name` instead of an LLM loop.
    pub fn with_capability(
        mut self,
        name: impl Into<String>,
        capability: Arc<dyn WorkerCapability>,
    ) -> Self {
        self.capabilities.insert(name.into(), capability);
        self
    }

    pub fn with_decision_maker(mut self, decider: Arc<dyn DecisionMaker>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn with_checkpointer(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn with_settings(mut self, graph: GraphSettings, worker: WorkerSettings) -> Self {
        self.graph_settings = graph;
        self.worker_settings = worker;
        self
    }

    /// Validate the document and build every node and edge. Either the whole
    /// graph is returned or nothing is.
    pub fn build(mut self) -> Result<CompiledGraph> {
        self.config.validate()?;

        let supervisor_name = self.config.supervisor.name.clone();
        let max_turns = self.config.max_turns;
        let mut nodes: HashMap<String, Node> = HashMap::new();

        for (name, spec) in &self.config.agents {
            let (tools, missing) = self.tools.resolve(&spec.tools);
            if !missing.is_empty() {
                if self.graph_settings.strict_tools {
                    return Err(CadreError::Config(format!(
                        "worker '{}' references unknown tools: {}",
                        name,
                        missing.join(", ")
                    )));
                }
                warn!(worker = %name, missing = ?missing, "Dropping unknown tools");
            }

            let capability: Arc<dyn WorkerCapability> = match self.capabilities.remove(name) {
                Some(capability) => capability,
                None => {
                    let (llm, model) = self.llm.as_ref().ok_or_else(|| {
                        CadreError::Config(format!(
                            "worker '{}' has no capability: configure an LLM or register one",
                            name
                        ))
                    })?;
                    let prompt =
                        prompts::resolve(name, spec.prompt.as_deref(), &spec.description);
                    Arc::new(ReactCapability::new(
                        name.clone(),
                        Arc::clone(llm),
                        model.clone(),
                        prompt,
                        tools,
                        self.worker_settings.max_iterations,
                    ))
                }
            };

            let mut worker = WorkerNode::new(name.clone(), &supervisor_name, max_turns, capability);
            if self.worker_settings.timeout_secs > 0 {
                worker = worker.with_timeout(Duration::from_secs(self.worker_settings.timeout_secs));
            }
            debug!(worker = %name, "Registered worker node");
            nodes.insert(name.clone(), Node::Worker(worker));
        }

        for unused in self.capabilities.keys() {
            warn!(worker = %unused, "Capability registered for a worker that is not configured");
        }

        let decider: Arc<dyn DecisionMaker> = match self.decider.take() {
            Some(decider) => decider,
            None => {
                let (llm, model) = self.llm.as_ref().ok_or_else(|| {
                    CadreError::Config(
                        "supervisor has no decision-maker: configure an LLM or register one".into(),
                    )
                })?;
                let schema = RouteSchema::new(&self.config.worker_names());
                Arc::new(LlmDecisionMaker::new(
                    Arc::clone(llm),
                    model.clone(),
                    self.config.supervisor.prompt.clone(),
                    &schema,
                ))
            }
        };

        let profiles: Vec<WorkerProfile> = self
            .config
            .descriptions()
            .into_iter()
            .map(|(name, description)| WorkerProfile {
                name: name.to_string(),
                description: description.to_string(),
            })
            .collect();
        let router = SupervisorRouter::new(&supervisor_name, profiles, max_turns, decider);
        nodes.insert(supervisor_name.clone(), Node::Supervisor(router));

        let mut transitions: HashMap<String, Transition> = HashMap::new();
        for relation in &self.config.relations {
            transitions.insert(
                relation.sender.clone(),
                Transition::Direct(relation.receiver.clone()),
            );
        }
        for edge in &self.config.conditional_edges {
            let receivers: Vec<&String> = edge.receivers.keys().collect();
            transitions.insert(
                edge.sender.clone(),
                Transition::Conditional(ConditionalRoute::new(edge.sender.clone(), &receivers)),
            );
        }

        let workers = self.config.agents.len();
        let recursion_limit = self
            .graph_settings
            .recursion_limit
            .unwrap_or_else(|| default_recursion_limit(workers, max_turns));

        info!(
            workers,
            max_turns,
            edges = transitions.len(),
            recursion_limit,
            "Graph built"
        );

        Ok(CompiledGraph {
            nodes,
            transitions,
            entry: supervisor_name,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryCheckpointStore::new())),
            event_bus: self.event_bus.unwrap_or_default(),
            recursion_limit,
            locks: SessionLocks::default(),
        })
    }
}

/// Enough steps for every worker to use its budget plus the turn-limit call,
/// each preceded by a supervisor step.
pub(crate) fn default_recursion_limit(workers: usize, max_turns: usize) -> usize {
    (2 * workers * (max_turns + 1) + 2).max(25)
}
