use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use cadre_core::error::{CadreError, Result};
use cadre_core::event::EventBus;
use cadre_core::types::{GraphEvent, Message, SessionId, FINISH};

use super::edge::{Target, Transition};
use super::node::{Node, StepKind};
use crate::checkpoint::{CheckpointStore, SessionLocks};
use crate::state::ConversationState;
use crate::supervisor::RouteDecision;

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// The supervisor answered `FINISH`, or a corrected answer became one.
    Routed,
    /// Every worker was out of turns.
    Exhausted,
    /// A worker was scheduled past its budget.
    TurnLimit { worker: String },
    /// The last node had no way out.
    NoOutgoingEdge { node: String },
}

/// Result of one invocation.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub session_id: SessionId,
    /// State as checkpointed after the last step.
    pub state: ConversationState,
    /// Messages appended during this invocation, user inputs included.
    pub new_messages: Vec<Message>,
    pub steps: usize,
    pub finish: FinishReason,
}

/// A built, immutable graph. Cheap to share behind an `Arc`; every method
/// takes `&self`.
pub struct CompiledGraph {
    pub(super) nodes: HashMap<String, Node>,
    pub(super) transitions: HashMap<String, Transition>,
    pub(super) entry: String,
    pub(super) store: Arc<dyn CheckpointStore>,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) recursion_limit: usize,
    pub(super) locks: SessionLocks,
}

impl CompiledGraph {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Node names, sorted.
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// One line per outgoing transition, sorted by sender.
    pub fn describe_edges(&self) -> Vec<String> {
        let mut senders: Vec<&String> = self.transitions.keys().collect();
        senders.sort();
        senders
            .into_iter()
            .map(|s| self.transitions[s].describe(s))
            .collect()
    }

    /// Answers the entry supervisor accepts, `FINISH` first.
    pub fn route_options(&self) -> &[String] {
        match self.nodes.get(&self.entry) {
            Some(Node::Supervisor(router)) => router.schema().options(),
            _ => &[],
        }
    }

    /// Latest checkpoint for a session.
    pub async fn state(&self, session: &SessionId) -> Result<Option<ConversationState>> {
        self.store.get(session).await
    }

    pub async fn invoke(&self, session: &SessionId, inputs: Vec<Message>) -> Result<RunSummary> {
        self.invoke_with_cancel(session, inputs, &CancellationToken::new())
            .await
    }

    /// Append `inputs` to the session and run from the entry node until the
    /// terminal is reached. Cancellation is observed between steps only.
    pub async fn invoke_with_cancel(
        &self,
        session: &SessionId,
        inputs: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let lock = self
            .locks
            .lock_for(session)
            .map_err(|e| self.fail(session, e))?;
        let _guard = lock.lock().await;

        let mut state = match self.store.get(session).await {
            Ok(saved) => saved.unwrap_or_default(),
            Err(e) => return Err(self.fail(session, e)),
        };
        let start_len = state.messages.len();
        state.messages.extend(inputs);
        if let Err(e) = self.store.put(session, &state).await {
            return Err(self.fail(session, e));
        }

        info!(session = %session, history = state.messages.len(), "Run started");
        self.event_bus.publish(GraphEvent::RunStarted {
            session_id: session.clone(),
        });

        let mut current = self.entry.clone();
        let mut steps = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(self.fail(session, CadreError::Cancelled));
            }
            if steps >= self.recursion_limit {
                return Err(self.fail(session, CadreError::RecursionLimit(self.recursion_limit)));
            }

            let Some(node) = self.nodes.get(&current) else {
                return Err(self.fail(
                    session,
                    CadreError::Config(format!("node '{}' is not part of the graph", current)),
                ));
            };

            debug!(session = %session, node = %node.name(), step = steps, "Running node");
            let outcome = match node.run(&state).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.fail(session, e)),
            };
            steps += 1;

            state.apply(outcome.delta);
            if let Err(e) = self.store.put(session, &state).await {
                return Err(self.fail(session, e));
            }
            self.publish_step(session, node.name(), &outcome.kind);

            let (target, no_edge) = match self.transitions.get(node.name()) {
                Some(transition) => match transition.resolve(&state) {
                    Ok(target) => (target, false),
                    Err(e) => return Err(self.fail(session, e)),
                },
                None => (Target::End, true),
            };

            match target {
                Target::Node(next) => current = next,
                Target::End => {
                    let finish = finish_reason(node.name(), &outcome.kind, &state, no_edge);
                    info!(session = %session, steps, finish = ?finish, "Run finished");
                    self.event_bus.publish(GraphEvent::RunFinished {
                        session_id: session.clone(),
                        steps,
                    });
                    return Ok(RunSummary {
                        session_id: session.clone(),
                        new_messages: state.messages[start_len..].to_vec(),
                        state,
                        steps,
                        finish,
                    });
                }
            }
        }
    }

    fn publish_step(&self, session: &SessionId, node: &str, kind: &StepKind) {
        let session_id = session.clone();
        match kind {
            StepKind::Routed(decision) => {
                if let RouteDecision::Corrected { requested } = decision {
                    self.event_bus.publish(GraphEvent::RouteCorrected {
                        session_id: session_id.clone(),
                        requested: requested.clone(),
                    });
                }
                let next = decision.destination().to_string();
                info!(session = %session, next = %next, "Supervisor routed");
                self.event_bus
                    .publish(GraphEvent::RouteDecided { session_id, next });
            }
            StepKind::Replied { content } => {
                self.event_bus.publish(GraphEvent::WorkerReplied {
                    session_id,
                    worker: node.to_string(),
                    content: content.clone(),
                });
            }
            StepKind::TurnLimit { count } => {
                self.event_bus.publish(GraphEvent::TurnLimitReached {
                    session_id,
                    worker: node.to_string(),
                    count: *count,
                });
            }
        }
    }

    fn fail(&self, session: &SessionId, err: CadreError) -> CadreError {
        error!(session = %session, error = %err, "Run failed");
        self.event_bus.publish(GraphEvent::RunFailed {
            session_id: session.clone(),
            error: err.to_string(),
        });
        err
    }
}

fn finish_reason(
    node: &str,
    kind: &StepKind,
    state: &ConversationState,
    no_edge: bool,
) -> FinishReason {
    match kind {
        StepKind::TurnLimit { .. } => FinishReason::TurnLimit {
            worker: node.to_string(),
        },
        StepKind::Routed(RouteDecision::Exhausted) => FinishReason::Exhausted,
        _ if no_edge && state.next.as_ref().map(|d| d.as_str()) != Some(FINISH) => {
            FinishReason::NoOutgoingEdge {
                node: node.to_string(),
            }
        }
        _ => FinishReason::Routed,
    }
}
