use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use cadre_core::config::ModelConfig;
use cadre_core::error::{CadreError, Result};
use cadre_core::traits::{DecisionMaker, LlmClient, WorkerCapability};
use cadre_core::types::*;

/// LLM client that replays canned delta sequences, one per request.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    responses: Arc<Mutex<VecDeque<Vec<StreamDelta>>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    tools: Arc<Mutex<Vec<Vec<ToolDefinition>>>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<Vec<StreamDelta>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::default(),
            tools: Arc::default(),
        }
    }

    /// A plain text answer that ends the turn.
    pub fn text(text: &str) -> Vec<StreamDelta> {
        vec![
            StreamDelta::TextDelta(text.to_string()),
            StreamDelta::Stop(StopReason::EndTurn),
        ]
    }

    /// A single tool call with the given JSON arguments.
    pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> Vec<StreamDelta> {
        vec![
            StreamDelta::ToolUseStart {
                index: 0,
                id: id.to_string(),
                name: name.to_string(),
            },
            StreamDelta::ToolInputDelta {
                index: 0,
                delta: args.to_string(),
            },
            StreamDelta::Stop(StopReason::ToolUse),
        ]
    }

    /// Every message list this client was called with.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    /// Tool definitions offered on each request.
    pub fn tool_requests(&self) -> Vec<Vec<ToolDefinition>> {
        self.tools.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let tools = tools.to_vec();
        Box::pin(async move {
            self.requests.lock().unwrap().push(messages);
            self.tools.lock().unwrap().push(tools);
            let deltas = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| CadreError::LlmRequest("script exhausted".into()))?;
            let stream = futures::stream::iter(deltas.into_iter().map(Ok));
            Ok(Box::pin(stream) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}

/// Worker capability with scripted replies. Clones share call history.
#[derive(Clone)]
pub struct ScriptedCapability {
    replies: Arc<Mutex<VecDeque<Result<String>>>>,
    fallback: Option<String>,
    seen: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedCapability {
    /// Replies in order, then fails once the script runs out.
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(
                replies.into_iter().map(|r| Ok(r.to_string())).collect(),
            )),
            fallback: None,
            seen: Arc::default(),
        }
    }

    /// The same reply on every call.
    pub fn always(reply: &str) -> Self {
        Self {
            replies: Arc::default(),
            fallback: Some(reply.to_string()),
            seen: Arc::default(),
        }
    }

    /// Fails on the first call, then answers `reply` forever.
    pub fn failing_once(message: &str, reply: &str) -> Self {
        let mut script = VecDeque::new();
        script.push_back(Err(CadreError::LlmRequest(message.to_string())));
        Self {
            replies: Arc::new(Mutex::new(script)),
            fallback: Some(reply.to_string()),
            seen: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// History length observed on each call.
    pub fn history_lengths(&self) -> Vec<usize> {
        self.seen.lock().unwrap().clone()
    }
}

impl WorkerCapability for ScriptedCapability {
    fn invoke<'a>(&'a self, history: &'a [Message]) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(history.len());
            let next = self.replies.lock().unwrap().pop_front();
            match (next, &self.fallback) {
                (Some(reply), _) => reply,
                (None, Some(reply)) => Ok(reply.clone()),
                (None, None) => Err(CadreError::LlmRequest("script exhausted".into())),
            }
        })
    }
}

/// Owned copy of a routing request, kept for assertions.
#[derive(Debug, Clone)]
pub struct RecordedRoute {
    pub history_len: usize,
    pub options: Vec<String>,
    pub workers: Vec<WorkerProfile>,
}

/// Decision-maker that answers from a script and records every request.
#[derive(Clone)]
pub struct ScriptedDecider {
    answers: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<RecordedRoute>>>,
}

impl ScriptedDecider {
    /// Answers in order; once exhausted every answer is `FINISH`.
    pub fn new(answers: Vec<&str>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(
                answers.into_iter().map(str::to_string).collect(),
            )),
            requests: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRoute> {
        self.requests.lock().unwrap().clone()
    }
}

impl DecisionMaker for ScriptedDecider {
    fn decide<'a>(&'a self, request: RouteRequest<'a>) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(RecordedRoute {
                history_len: request.history.len(),
                options: request.options.to_vec(),
                workers: request.workers.to_vec(),
            });
            Ok(self
                .answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| FINISH.to_string()))
        })
    }
}
