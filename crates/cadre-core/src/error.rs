use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadreError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Tool errors
    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Worker errors
    #[error("Worker {worker} failed: {message}")]
    Worker { worker: String, message: String },

    #[error("Worker {worker} exceeded {max_iterations} reasoning iterations")]
    WorkerIterations { worker: String, max_iterations: usize },

    // Routing errors
    #[error("Route answer {answer:?} is not one of {allowed:?}")]
    InvalidRoute { answer: String, allowed: Vec<String> },

    #[error("No conditional route from {sender} for next = {next:?}")]
    UnmappedRoute { sender: String, next: Option<String> },

    #[error("Graph exceeded recursion limit of {0} steps")]
    RecursionLimit(usize),

    #[error("Run cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Checkpoint errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CadreError>;
