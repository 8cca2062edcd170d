use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel destination that ends a session's step loop.
pub const FINISH: &str = "FINISH";

/// Author recorded on messages typed by the human.
pub const USER_AUTHOR: &str = "user";

/// Unique session identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the shared conversation history.
///
/// `author` is either [`USER_AUTHOR`] or the name of the worker that produced
/// the content. Messages are never edited after they are appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            author: USER_AUTHOR.to_string(),
            content: content.into(),
        }
    }

    pub fn from_worker(worker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: worker.into(),
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.author == USER_AUTHOR
    }

    /// Convert to the LLM wire shape. Worker messages become named assistant turns.
    pub fn to_chat(&self) -> ChatMessage {
        if self.is_user() {
            ChatMessage::user(&self.content)
        } else {
            ChatMessage::assistant_text(&self.content).with_name(&self.author)
        }
    }
}

/// Role in an LLM conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single content block in a chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

/// A message as sent to an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    /// Speaker name for multi-agent transcripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    fn text_block(role: Role, text: String) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text { text }],
            name: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text_block(Role::System, text.into())
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text_block(Role::User, text.into())
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::text_block(Role::Assistant, text.into())
    }

    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error,
            }],
            name: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Extract all text content from this message.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all tool use blocks from this message.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// Start of a tool use block.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },

    /// A chunk of tool use input JSON.
    ToolInputDelta { index: usize, delta: String },

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Result of a tool execution.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Tool definition for sending to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A worker as presented to the supervisor's decision-maker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub name: String,
    pub description: String,
}

/// Input to one routing decision.
///
/// `workers` always lists every configured worker, including exhausted ones.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub history: &'a [Message],
    /// `FINISH` followed by every worker name.
    pub options: &'a [String],
    pub workers: &'a [WorkerProfile],
}

/// Graph event broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// An invocation started for a session.
    RunStarted { session_id: SessionId },
    /// A worker appended its reply to the history.
    WorkerReplied {
        session_id: SessionId,
        worker: String,
        content: String,
    },
    /// The supervisor chose the next destination.
    RouteDecided { session_id: SessionId, next: String },
    /// The supervisor's answer named an exhausted worker and was replaced by FINISH.
    RouteCorrected {
        session_id: SessionId,
        requested: String,
    },
    /// A worker was scheduled past its turn budget; the run terminates.
    TurnLimitReached {
        session_id: SessionId,
        worker: String,
        count: usize,
    },
    /// The run reached the terminal node.
    RunFinished { session_id: SessionId, steps: usize },
    /// A step failed and the run was aborted.
    RunFailed { session_id: SessionId, error: String },
}
