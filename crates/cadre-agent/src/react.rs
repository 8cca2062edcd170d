use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};

use cadre_core::config::ModelConfig;
use cadre_core::error::{CadreError, Result};
use cadre_core::traits::{LlmClient, Tool, WorkerCapability};
use cadre_core::types::{ChatMessage, ContentBlock, Message, Role, StopReason, ToolDefinition};
use cadre_llm::collect_reply;
use cadre_tools::registry::execute_with_timeout;

/// Reason-act loop: call the model, run any requested tools, feed the
/// results back, and stop at the first reply that asks for no tools.
pub struct ReactCapability {
    worker: String,
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    system_prompt: String,
    tools: Vec<Arc<dyn Tool>>,
    max_iterations: usize,
}

impl ReactCapability {
    pub fn new(
        worker: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        model: ModelConfig,
        system_prompt: impl Into<String>,
        tools: Vec<Arc<dyn Tool>>,
        max_iterations: usize,
    ) -> Self {
        Self {
            worker: worker.into(),
            llm,
            model,
            system_prompt: system_prompt.into(),
            tools,
            max_iterations,
        }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    async fn run_tool(&self, name: &str, input: serde_json::Value) -> ContentResult {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            warn!(worker = %self.worker, tool = %name, "Model requested a tool it was not given");
            return ContentResult::error(format!("Unknown tool: {}", name));
        };
        match execute_with_timeout(tool.as_ref(), input).await {
            Ok(result) => ContentResult {
                content: result.content,
                is_error: result.is_error,
            },
            Err(e) => {
                error!(worker = %self.worker, tool = %name, error = %e, "Tool execution failed");
                ContentResult::error(e.to_string())
            }
        }
    }

    async fn run(&self, history: &[Message]) -> Result<String> {
        let tool_defs = self.tool_definitions();
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.extend(history.iter().map(Message::to_chat));

        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;

        for iteration in 0..self.max_iterations {
            debug!(worker = %self.worker, iteration, "Starting reasoning step");

            let stream = self
                .llm
                .chat_stream(&self.model, messages.clone(), &tool_defs)
                .await?;
            let reply = collect_reply(stream).await?;
            input_tokens += reply.input_tokens;
            output_tokens += reply.output_tokens;

            if reply.tool_calls.is_empty() {
                if reply.stop == Some(StopReason::MaxTokens) {
                    warn!(worker = %self.worker, "LLM hit max tokens");
                }
                info!(
                    worker = %self.worker,
                    steps = iteration + 1,
                    input_tokens,
                    output_tokens,
                    "Worker reply complete"
                );
                return Ok(reply.text);
            }

            messages.push(reply.to_message());

            let mut results = Vec::with_capacity(reply.tool_calls.len());
            for call in &reply.tool_calls {
                let outcome = self.run_tool(&call.name, call.input.clone()).await;
                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: outcome.content,
                    is_error: outcome.is_error,
                });
            }
            messages.push(ChatMessage {
                role: Role::User,
                content: results,
                name: None,
                timestamp: None,
            });
        }

        Err(CadreError::WorkerIterations {
            worker: self.worker.clone(),
            max_iterations: self.max_iterations,
        })
    }
}

struct ContentResult {
    content: String,
    is_error: bool,
}

impl ContentResult {
    fn error(content: String) -> Self {
        Self {
            content,
            is_error: true,
        }
    }
}

impl WorkerCapability for ReactCapability {
    fn invoke<'a>(&'a self, history: &'a [Message]) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.run(history))
    }
}
