use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use cadre_core::error::{CadreError, Result};
use cadre_core::traits::WorkerCapability;
use cadre_core::types::Message;

use crate::state::{ConversationState, Destination, StateDelta};

/// What a worker step did.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// The capability ran and its reply was appended.
    Replied { delta: StateDelta, content: String },
    /// The worker was scheduled past its budget; nothing ran.
    TurnLimit { delta: StateDelta, count: usize },
}

impl WorkerOutcome {
    pub fn into_delta(self) -> StateDelta {
        match self {
            WorkerOutcome::Replied { delta, .. } | WorkerOutcome::TurnLimit { delta, .. } => delta,
        }
    }
}

/// A worker node: enforces the per-session turn ceiling around a capability.
pub struct WorkerNode {
    name: String,
    supervisor: String,
    max_turns: usize,
    timeout: Option<Duration>,
    capability: Arc<dyn WorkerCapability>,
}

impl WorkerNode {
    pub fn new(
        name: impl Into<String>,
        supervisor: impl Into<String>,
        max_turns: usize,
        capability: Arc<dyn WorkerCapability>,
    ) -> Self {
        Self {
            name: name.into(),
            supervisor: supervisor.into(),
            max_turns,
            timeout: None,
            capability,
        }
    }

    /// Bound each capability call. An elapsed deadline is a worker failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one scheduled turn against `state`.
    ///
    /// The count is incremented before the ceiling check, so the call that
    /// would be turn `max_turns + 1` is recorded but never reaches the
    /// capability.
    pub async fn invoke(&self, state: &ConversationState) -> Result<WorkerOutcome> {
        let mut counts = state.turn_counts.clone();
        let count = counts.entry(self.name.clone()).or_insert(0);
        *count += 1;
        let count = *count;

        if count > self.max_turns {
            warn!(
                worker = %self.name,
                count,
                max_turns = self.max_turns,
                "Worker turn budget exhausted, finishing"
            );
            return Ok(WorkerOutcome::TurnLimit {
                delta: StateDelta {
                    appended: Vec::new(),
                    next: Some(Destination::Finish),
                    turn_counts: Some(counts),
                },
                count,
            });
        }

        debug!(worker = %self.name, turn = count, history = state.messages.len(), "Invoking worker");
        let content = self.call_capability(&state.messages).await?;

        Ok(WorkerOutcome::Replied {
            delta: StateDelta {
                appended: vec![Message::from_worker(&self.name, &content)],
                next: Some(Destination::node(&self.supervisor)),
                turn_counts: Some(counts),
            },
            content,
        })
    }

    async fn call_capability(&self, history: &[Message]) -> Result<String> {
        let call = self.capability.invoke(history);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(CadreError::Worker {
                        worker: self.name.clone(),
                        message: format!("timed out after {}s", limit.as_secs()),
                    })
                }
            },
            None => call.await,
        };

        result.map_err(|e| match e {
            e @ (CadreError::Worker { .. }
            | CadreError::WorkerIterations { .. }
            | CadreError::Cancelled) => e,
            other => CadreError::Worker {
                worker: self.name.clone(),
                message: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_test_utils::ScriptedCapability;

    fn node(max_turns: usize, capability: &ScriptedCapability) -> WorkerNode {
        WorkerNode::new("W", "Supervisor", max_turns, Arc::new(capability.clone()))
    }

    #[tokio::test]
    async fn test_reply_is_appended_and_routed_to_supervisor() {
        let cap = ScriptedCapability::always("done");
        let mut state = ConversationState::new();
        state.messages.push(Message::user("go"));

        let outcome = node(2, &cap).invoke(&state).await.unwrap();
        let WorkerOutcome::Replied { delta, content } = outcome else {
            panic!("expected a reply");
        };
        assert_eq!(content, "done");
        assert_eq!(delta.appended, vec![Message::from_worker("W", "done")]);
        assert_eq!(delta.next, Some(Destination::node("Supervisor")));
        assert_eq!(delta.turn_counts.unwrap()["W"], 1);
        assert_eq!(cap.history_lengths(), vec![1]);
    }

    #[tokio::test]
    async fn test_third_call_with_budget_two_finishes_without_invoking() {
        let cap = ScriptedCapability::always("ok");
        let worker = node(2, &cap);
        let mut state = ConversationState::new();

        for _ in 0..2 {
            let outcome = worker.invoke(&state).await.unwrap();
            assert!(matches!(outcome, WorkerOutcome::Replied { .. }));
            state.apply(outcome.into_delta());
        }
        let outcome = worker.invoke(&state).await.unwrap();
        assert!(matches!(outcome, WorkerOutcome::TurnLimit { count: 3, .. }));
        state.apply(outcome.into_delta());

        assert_eq!(state.next, Some(Destination::Finish));
        assert_eq!(state.turn_count("W"), 3);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(cap.calls(), 2);
    }

    #[tokio::test]
    async fn test_other_counts_are_preserved() {
        let cap = ScriptedCapability::always("ok");
        let mut state = ConversationState::new();
        state.turn_counts.insert("Other".into(), 2);
        let delta = node(3, &cap).invoke(&state).await.unwrap().into_delta();
        let counts = delta.turn_counts.unwrap();
        assert_eq!(counts["Other"], 2);
        assert_eq!(counts["W"], 1);
        // The input state is never mutated in place
        assert_eq!(state.turn_count("W"), 0);
    }

    #[tokio::test]
    async fn test_capability_failure_is_a_worker_error() {
        let cap = ScriptedCapability::failing_once("HTTP 500", "later");
        let err = node(3, &cap)
            .invoke(&ConversationState::new())
            .await
            .unwrap_err();
        match err {
            CadreError::Worker { worker, message } => {
                assert_eq!(worker, "W");
                assert!(message.contains("HTTP 500"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct Stalled;

    impl WorkerCapability for Stalled {
        fn invoke<'a>(
            &'a self,
            _history: &'a [Message],
        ) -> futures::future::BoxFuture<'a, Result<String>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("never".to_string())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_as_worker_error() {
        let worker = WorkerNode::new("Slow", "Supervisor", 3, Arc::new(Stalled))
            .with_timeout(Duration::from_secs(5));
        let err = worker.invoke(&ConversationState::new()).await.unwrap_err();
        assert!(matches!(err, CadreError::Worker { ref worker, .. } if worker == "Slow"));
    }
}
