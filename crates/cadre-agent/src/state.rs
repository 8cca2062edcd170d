use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use cadre_core::types::{Message, FINISH};

/// Where control goes after the current step.
///
/// Serialized as the plain node name, with `"FINISH"` for the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Destination {
    Node(String),
    Finish,
}

impl Destination {
    pub fn node(name: impl Into<String>) -> Self {
        Destination::from(name.into())
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Destination::Finish)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Destination::Node(name) => name,
            Destination::Finish => FINISH,
        }
    }
}

impl From<String> for Destination {
    fn from(s: String) -> Self {
        if s == FINISH {
            Destination::Finish
        } else {
            Destination::Node(s)
        }
    }
}

impl From<Destination> for String {
    fn from(d: Destination) -> Self {
        match d {
            Destination::Node(name) => name,
            Destination::Finish => FINISH.to_string(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the engine remembers about one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Append-only history in causal order.
    pub messages: Vec<Message>,
    pub next: Option<Destination>,
    /// Times each worker has been scheduled. Absent means zero.
    pub turn_counts: BTreeMap<String, usize>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turn_count(&self, worker: &str) -> usize {
        self.turn_counts.get(worker).copied().unwrap_or(0)
    }

    /// Merge a node's output into the state.
    ///
    /// Messages are appended, while `next` and `turn_counts` take the last
    /// value written.
    pub fn apply(&mut self, delta: StateDelta) {
        self.messages.extend(delta.appended);
        if let Some(next) = delta.next {
            self.next = Some(next);
        }
        if let Some(counts) = delta.turn_counts {
            self.turn_counts = counts;
        }
    }
}

/// Partial update produced by one node run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub appended: Vec<Message>,
    pub next: Option<Destination>,
    pub turn_counts: Option<BTreeMap<String, usize>>,
}

impl StateDelta {
    pub fn route(next: Destination) -> Self {
        Self {
            next: Some(next),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_round_trips_through_string() {
        assert_eq!(Destination::node("FINISH"), Destination::Finish);
        assert_eq!(Destination::node("CodeAgent").as_str(), "CodeAgent");

        let json = serde_json::to_string(&Destination::Finish).unwrap();
        assert_eq!(json, "\"FINISH\"");
        let back: Destination = serde_json::from_str("\"WebSearchAgent\"").unwrap();
        assert_eq!(back, Destination::Node("WebSearchAgent".into()));
    }

    #[test]
    fn test_fresh_state_is_empty() {
        let state = ConversationState::new();
        assert!(state.messages.is_empty());
        assert!(state.next.is_none());
        assert!(state.turn_counts.is_empty());
        assert_eq!(state.turn_count("anyone"), 0);
    }

    #[test]
    fn test_apply_appends_and_overwrites() {
        let mut state = ConversationState::new();
        state.messages.push(Message::user("hi"));

        let mut counts = BTreeMap::new();
        counts.insert("A".to_string(), 1);
        state.apply(StateDelta {
            appended: vec![Message::from_worker("A", "hello")],
            next: Some(Destination::node("Supervisor")),
            turn_counts: Some(counts),
        });
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].author, "A");
        assert_eq!(state.turn_count("A"), 1);

        // A routing-only delta leaves history and counts alone
        state.apply(StateDelta::route(Destination::Finish));
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.turn_count("A"), 1);
        assert_eq!(state.next, Some(Destination::Finish));
    }

    #[test]
    fn test_state_serializes_next_as_name() {
        let mut state = ConversationState::new();
        state.next = Some(Destination::Finish);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["next"], "FINISH");
        let back: ConversationState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
