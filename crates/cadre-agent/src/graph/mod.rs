//! Graph assembly and execution.
//!
//! [`GraphBuilder`] turns a validated topology into a [`CompiledGraph`]: one
//! supervisor node, one node per worker, and at most one transition per
//! sender. The compiled graph is the single entry point; it initializes
//! fresh sessions, checkpoints after every step, and publishes events.

pub mod builder;
pub mod compiled;
pub mod edge;
pub mod node;

pub use builder::GraphBuilder;
pub use compiled::{CompiledGraph, FinishReason, RunSummary};
pub use edge::{ConditionalRoute, Target, Transition};
pub use node::{Node, StepKind, StepOutcome};
