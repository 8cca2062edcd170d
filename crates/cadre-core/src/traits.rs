use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// Streaming chat-completion client.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// A named capability a worker may call.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in LLM tool calls and in graph config).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given input.
    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<ToolResult>>;

    /// Timeout in seconds for this tool.
    fn timeout_secs(&self) -> u64 {
        30
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Produces a worker's reply to the conversation so far.
///
/// One call is one worker turn; any inner reasoning or tool use happens
/// inside the call and only the final text comes back.
pub trait WorkerCapability: Send + Sync + 'static {
    fn invoke<'a>(&'a self, history: &'a [Message]) -> BoxFuture<'a, Result<String>>;
}

/// Picks the next destination for the supervisor.
///
/// Implementations return one raw answer; validation against the allowed
/// options happens in the router.
pub trait DecisionMaker: Send + Sync + 'static {
    fn decide<'a>(&'a self, request: RouteRequest<'a>) -> BoxFuture<'a, Result<String>>;
}
