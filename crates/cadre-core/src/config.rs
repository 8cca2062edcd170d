use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CadreError, Result};

/// Top-level cadre configuration (`cadre.toml`).
///
/// The agent topology lives in a separate JSON document referenced by
/// `[graph].path`; see [`crate::graph_config::GraphConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub worker: WorkerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_model_id() -> String { "gpt-4o".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Where the topology document lives and how strictly it is resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Path to the JSON topology document.
    #[serde(default = "default_graph_path")]
    pub path: String,
    /// Upper bound on steps per invocation. Derived from the topology when unset.
    #[serde(default)]
    pub recursion_limit: Option<usize>,
    /// Fail the build when a worker names a tool missing from the registry.
    #[serde(default)]
    pub strict_tools: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            path: default_graph_path(),
            recursion_limit: None,
            strict_tools: false,
        }
    }
}

fn default_graph_path() -> String { "agent_config.json".to_string() }

/// Limits for a single worker capability call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// LLM round-trips a worker may spend on tool use before replying.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Wall-clock limit for one capability call. `0` disables it.
    #[serde(default = "default_worker_timeout")]
    pub timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            timeout_secs: default_worker_timeout(),
        }
    }
}

fn default_max_iterations() -> usize { 10 }
fn default_worker_timeout() -> u64 { 300 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = read_config_file(path)?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| CadreError::Config(e.to_string()))
    }

    /// Build a config purely from the process environment.
    ///
    /// Reads `OPENAI_API_KEY`, `CADRE_PROVIDER`, `CADRE_MODEL` and `CADRE_BASE_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.model.api_key = Some(key);
        }
        if let Ok(provider) = std::env::var("CADRE_PROVIDER") {
            config.model.provider = provider;
        }
        if let Ok(model) = std::env::var("CADRE_MODEL") {
            config.model.model_id = model;
        }
        if let Ok(url) = std::env::var("CADRE_BASE_URL") {
            config.model.base_url = Some(url);
        }
        config
    }

    /// Resolve the graph document path relative to the config file's directory.
    pub fn graph_path(&self, config_dir: Option<&Path>) -> PathBuf {
        let path = PathBuf::from(&self.graph.path);
        match config_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        }
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
/// Read a config document. A missing file is `ConfigNotFound`; any other
/// failure is reported as the underlying I/O error.
pub(crate) fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CadreError::ConfigNotFound(path.display().to_string()),
        _ => CadreError::Io(e),
    })
}

pub(crate) fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var_name = &after[..end];
                match std::env::var(var_name) {
                    Ok(val) => result.push_str(&val),
                    // Unset variables are left as written
                    Err(_) => {
                        tracing::warn!(var = %var_name, "Config references an unset environment variable");
                        result.push_str(&rest[start..start + 2 + end + 1]);
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_CADRE_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_CADRE_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_CADRE_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_CADRE_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_CADRE_VAR}\"");
    }

    #[test]
    fn test_expand_env_vars_unterminated() {
        let result = expand_env_vars("key = \"${OOPS");
        assert_eq!(result, "key = \"${OOPS");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.model.model_id, "gpt-4o");
        assert_eq!(config.model.temperature, 0.0);
        assert_eq!(config.graph.path, "agent_config.json");
        assert!(config.graph.recursion_limit.is_none());
        assert!(!config.graph.strict_tools);
        assert_eq!(config.worker.max_iterations, 10);
        assert_eq!(config.worker.timeout_secs, 300);
    }

    #[test]
    fn test_graph_path_relative_to_config_dir() {
        let config = AppConfig::default();
        let resolved = config.graph_path(Some(Path::new("/etc/cadre")));
        assert_eq!(resolved, PathBuf::from("/etc/cadre/agent_config.json"));

        let mut absolute = AppConfig::default();
        absolute.graph.path = "/srv/graph.json".into();
        assert_eq!(
            absolute.graph_path(Some(Path::new("/etc/cadre"))),
            PathBuf::from("/srv/graph.json")
        );
    }
}
