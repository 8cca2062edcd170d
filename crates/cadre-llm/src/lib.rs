pub mod providers;
pub mod reply;
pub mod retry;
pub mod streaming;

use cadre_core::config::ModelConfig;
use cadre_core::traits::LlmClient;

pub use providers::openai::OpenAiClient;
pub use reply::{collect_reply, AssistantReply, ToolCall};
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
///
/// Every supported provider speaks the OpenAI chat-completions dialect; the
/// provider name only selects a default endpoint.
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    match config.provider.as_str() {
        "ollama" => Box::new(OpenAiClient::with_default_url(
            "http://localhost:11434/v1/chat/completions",
        )),
        "groq" => Box::new(OpenAiClient::with_default_url(
            "https://api.groq.com/openai/v1/chat/completions",
        )),
        _ => Box::new(OpenAiClient::new()),
    }
}
