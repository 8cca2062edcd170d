use std::collections::HashMap;

use cadre_core::error::{CadreError, Result};
use cadre_core::types::FINISH;

use crate::state::{ConversationState, Destination};

/// Where a transition leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(String),
    End,
}

/// Branch keyed on `state.next`.
///
/// The map is built from the edge's own receiver list when the graph is
/// built, plus `FINISH -> End`. Lookup performs no decision logic.
#[derive(Debug, Clone)]
pub struct ConditionalRoute {
    sender: String,
    map: HashMap<String, Target>,
}

impl ConditionalRoute {
    pub fn new<S: AsRef<str>>(sender: impl Into<String>, receivers: &[S]) -> Self {
        let mut map: HashMap<String, Target> = receivers
            .iter()
            .map(|r| (r.as_ref().to_string(), Target::Node(r.as_ref().to_string())))
            .collect();
        map.insert(FINISH.to_string(), Target::End);
        Self {
            sender: sender.into(),
            map,
        }
    }

    pub fn route(&self, next: Option<&Destination>) -> Result<Target> {
        next.and_then(|d| self.map.get(d.as_str()))
            .cloned()
            .ok_or_else(|| CadreError::UnmappedRoute {
                sender: self.sender.clone(),
                next: next.map(|d| d.to_string()),
            })
    }

    /// Mapped keys, sorted, `FINISH` included.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.map.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// The single way out of a node.
#[derive(Debug, Clone)]
pub enum Transition {
    Direct(String),
    Conditional(ConditionalRoute),
}

impl Transition {
    /// Resolve the next hop after the sender's step has been applied.
    ///
    /// A direct edge is skipped when the step itself forced `FINISH`, which is
    /// how a worker over its budget ends the run.
    pub fn resolve(&self, state: &ConversationState) -> Result<Target> {
        match self {
            Transition::Direct(receiver) => {
                if matches!(state.next, Some(Destination::Finish)) {
                    Ok(Target::End)
                } else {
                    Ok(Target::Node(receiver.clone()))
                }
            }
            Transition::Conditional(route) => route.route(state.next.as_ref()),
        }
    }

    pub fn describe(&self, sender: &str) -> String {
        match self {
            Transition::Direct(receiver) => format!("{} -> {}", sender, receiver),
            Transition::Conditional(route) => {
                format!("{} -> one of [{}]", sender, route.keys().join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_next(next: Option<Destination>) -> ConversationState {
        ConversationState {
            next,
            ..Default::default()
        }
    }

    #[test]
    fn test_conditional_maps_receivers_and_finish() {
        let route = ConditionalRoute::new("Supervisor", &["A", "B"]);
        assert_eq!(
            route.route(Some(&Destination::node("B"))).unwrap(),
            Target::Node("B".into())
        );
        assert_eq!(route.route(Some(&Destination::Finish)).unwrap(), Target::End);
        assert_eq!(route.keys(), vec!["A", "B", "FINISH"]);
    }

    #[test]
    fn test_conditional_miss_is_unmapped() {
        let route = ConditionalRoute::new("Supervisor", &["A"]);
        let err = route.route(Some(&Destination::node("C"))).unwrap_err();
        assert!(matches!(
            err,
            CadreError::UnmappedRoute { ref next, .. } if next.as_deref() == Some("C")
        ));
        assert!(route.route(None).is_err());
    }

    #[test]
    fn test_each_edge_keeps_its_own_map() {
        let first = ConditionalRoute::new("S1", &["A"]);
        let second = ConditionalRoute::new("S2", &["B"]);
        assert!(first.route(Some(&Destination::node("B"))).is_err());
        assert!(second.route(Some(&Destination::node("A"))).is_err());
    }

    #[test]
    fn test_direct_edge_honors_forced_finish() {
        let edge = Transition::Direct("Supervisor".into());
        let routed = state_with_next(Some(Destination::node("Supervisor")));
        assert_eq!(edge.resolve(&routed).unwrap(), Target::Node("Supervisor".into()));
        let finished = state_with_next(Some(Destination::Finish));
        assert_eq!(edge.resolve(&finished).unwrap(), Target::End);
        assert_eq!(edge.describe("A"), "A -> Supervisor");
    }
}
