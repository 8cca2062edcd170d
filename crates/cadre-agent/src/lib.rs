//! Orchestration engine: a supervisor node routes a shared conversation
//! between worker nodes until it answers `FINISH` or every worker has used
//! its turn budget.

pub mod checkpoint;
pub mod graph;
pub mod prompts;
pub mod react;
pub mod state;
pub mod supervisor;
pub mod worker;

pub use cadre_core::traits::{DecisionMaker, WorkerCapability};
pub use checkpoint::{CheckpointStore, MemoryCheckpointStore};
pub use graph::{CompiledGraph, FinishReason, GraphBuilder, RunSummary};
pub use react::ReactCapability;
pub use state::{ConversationState, Destination, StateDelta};
pub use supervisor::{LlmDecisionMaker, RouteDecision, RouteSchema, SupervisorRouter};
pub use worker::{WorkerNode, WorkerOutcome};
