use cadre_core::error::Result;

use crate::state::{ConversationState, StateDelta};
use crate::supervisor::{RouteDecision, SupervisorRouter};
use crate::worker::{WorkerNode, WorkerOutcome};

/// A named vertex of the compiled graph.
pub enum Node {
    Supervisor(SupervisorRouter),
    Worker(WorkerNode),
}

/// What a step did, for events and the finish reason.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Routed(RouteDecision),
    Replied { content: String },
    TurnLimit { count: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub delta: StateDelta,
    pub kind: StepKind,
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Supervisor(router) => router.name(),
            Node::Worker(worker) => worker.name(),
        }
    }

    pub async fn run(&self, state: &ConversationState) -> Result<StepOutcome> {
        match self {
            Node::Supervisor(router) => {
                let decision = router.decide(state).await?;
                Ok(StepOutcome {
                    delta: StateDelta::route(decision.destination()),
                    kind: StepKind::Routed(decision),
                })
            }
            Node::Worker(worker) => match worker.invoke(state).await? {
                WorkerOutcome::Replied { delta, content } => Ok(StepOutcome {
                    delta,
                    kind: StepKind::Replied { content },
                }),
                WorkerOutcome::TurnLimit { delta, count } => Ok(StepOutcome {
                    delta,
                    kind: StepKind::TurnLimit { count },
                }),
            },
        }
    }
}
