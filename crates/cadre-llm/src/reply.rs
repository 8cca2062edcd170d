use std::collections::BTreeMap;

use futures::stream::{BoxStream, StreamExt};

use cadre_core::error::{CadreError, Result};
use cadre_core::types::{ChatMessage, ContentBlock, Role, StopReason, StreamDelta};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// A fully received assistant turn.
#[derive(Debug, Clone, Default)]
pub struct AssistantReply {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop: Option<StopReason>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl AssistantReply {
    /// The turn as it should be replayed to the model on the next request.
    pub fn to_message(&self) -> ChatMessage {
        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentBlock::Text {
                text: self.text.clone(),
            });
        }
        for call in &self.tool_calls {
            content.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            });
        }
        ChatMessage {
            role: Role::Assistant,
            content,
            name: None,
            timestamp: Some(chrono::Utc::now()),
        }
    }
}

#[derive(Default)]
struct PendingCall {
    id: String,
    name: String,
    input_json: String,
}

/// Drain a delta stream into a single reply.
///
/// Tool arguments arrive as JSON fragments keyed by the provider's index;
/// they are parsed once the stream ends, in index order. Arguments that never form valid JSON are a parse error
/// rather than a silent `null`.
pub async fn collect_reply(mut stream: BoxStream<'_, Result<StreamDelta>>) -> Result<AssistantReply> {
    let mut reply = AssistantReply::default();
    let mut pending: BTreeMap<usize, PendingCall> = BTreeMap::new();

    while let Some(delta) = stream.next().await {
        match delta? {
            StreamDelta::TextDelta(text) => reply.text.push_str(&text),
            StreamDelta::ToolUseStart { index, id, name } => {
                let call = pending.entry(index).or_default();
                call.id = id;
                call.name = name;
            }
            StreamDelta::ToolInputDelta { index, delta } => {
                if let Some(call) = pending.get_mut(&index) {
                    call.input_json.push_str(&delta);
                }
            }
            StreamDelta::Stop(reason) => reply.stop = Some(reason),
            StreamDelta::Usage {
                input_tokens,
                output_tokens,
            } => {
                reply.input_tokens += input_tokens;
                reply.output_tokens += output_tokens;
            }
        }
    }

    for (index, call) in pending {
        if call.name.is_empty() {
            continue;
        }
        let input = if call.input_json.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.input_json).map_err(|e| {
                CadreError::LlmParse(format!("tool call {} ({}): {}", index, call.name, e))
            })?
        };
        let id = if call.id.is_empty() {
            format!("call_{}", index)
        } else {
            call.id
        };
        reply.tool_calls.push(ToolCall {
            id,
            name: call.name,
            input,
        });
    }

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(deltas: Vec<StreamDelta>) -> BoxStream<'static, Result<StreamDelta>> {
        Box::pin(futures::stream::iter(deltas.into_iter().map(Ok)))
    }

    #[tokio::test]
    async fn test_collects_text() {
        let reply = collect_reply(stream_of(vec![
            StreamDelta::TextDelta("Hel".into()),
            StreamDelta::TextDelta("lo".into()),
            StreamDelta::Stop(StopReason::EndTurn),
        ]))
        .await
        .unwrap();
        assert_eq!(reply.text, "Hello");
        assert!(reply.tool_calls.is_empty());
        assert_eq!(reply.stop, Some(StopReason::EndTurn));
    }

    #[tokio::test]
    async fn test_collects_fragmented_tool_call() {
        let reply = collect_reply(stream_of(vec![
            StreamDelta::ToolUseStart {
                index: 0,
                id: "call_a".into(),
                name: "lookup".into(),
            },
            StreamDelta::ToolInputDelta {
                index: 0,
                delta: "{\"q\":".into(),
            },
            StreamDelta::ToolInputDelta {
                index: 0,
                delta: "\"rust\"}".into(),
            },
            StreamDelta::Usage {
                input_tokens: 10,
                output_tokens: 4,
            },
            StreamDelta::Stop(StopReason::ToolUse),
        ]))
        .await
        .unwrap();
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].input, serde_json::json!({"q": "rust"}));
        assert_eq!(reply.input_tokens, 10);
        assert_eq!(reply.to_message().tool_uses().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_arguments_become_empty_object() {
        let reply = collect_reply(stream_of(vec![StreamDelta::ToolUseStart {
            index: 0,
            id: String::new(),
            name: "get_current_date".into(),
        }]))
        .await
        .unwrap();
        assert_eq!(reply.tool_calls[0].id, "call_0");
        assert_eq!(reply.tool_calls[0].input, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_sparse_provider_indices_are_kept_in_order() {
        let reply = collect_reply(stream_of(vec![
            StreamDelta::ToolUseStart {
                index: usize::MAX,
                id: "late".into(),
                name: "second".into(),
            },
            StreamDelta::ToolUseStart {
                index: 4_000_000_000,
                id: "early".into(),
                name: "first".into(),
            },
            StreamDelta::ToolInputDelta {
                index: 7,
                delta: "{\"orphan\": true}".into(),
            },
            StreamDelta::Stop(StopReason::ToolUse),
        ]))
        .await
        .unwrap();
        let names: Vec<&str> = reply.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(reply.tool_calls[1].id, "late");
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected() {
        let err = collect_reply(stream_of(vec![
            StreamDelta::ToolUseStart {
                index: 0,
                id: "c".into(),
                name: "lookup".into(),
            },
            StreamDelta::ToolInputDelta {
                index: 0,
                delta: "{broken".into(),
            },
        ]))
        .await
        .unwrap_err();
        assert!(matches!(err, CadreError::LlmParse(_)));
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let stream: BoxStream<'static, Result<StreamDelta>> = Box::pin(futures::stream::iter(vec![
            Ok(StreamDelta::TextDelta("partial".into())),
            Err(CadreError::LlmStream("reset".into())),
        ]));
        let err = collect_reply(stream).await.unwrap_err();
        assert!(matches!(err, CadreError::LlmStream(_)));
    }
}
