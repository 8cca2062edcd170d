use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use cadre_core::error::{CadreError, Result};
use cadre_core::traits::Tool;
use cadre_core::types::ToolResult;

/// Name-keyed set of tools.
///
/// Populated up front and then handed to the graph builder behind an `Arc`;
/// nothing mutates it once a graph holds a reference.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. A later registration under the same name replaces the earlier one.
    pub fn register(&mut self, tool: impl Tool) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Look up each name, keeping the order given.
    ///
    /// Returns the tools that exist and, separately, the names that did not
    /// resolve so the caller can decide whether that is fatal.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> (Vec<Arc<dyn Tool>>, Vec<String>) {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for name in names {
            let name = name.as_ref();
            match self.get(name) {
                Some(tool) => found.push(tool),
                None => missing.push(name.to_string()),
            }
        }
        (found, missing)
    }

    /// Registry with every built-in tool.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::builtin::date::CurrentDateTool);
        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one tool call, converting an elapsed deadline into `ToolTimeout`.
pub async fn execute_with_timeout(tool: &dyn Tool, input: serde_json::Value) -> Result<ToolResult> {
    let timeout_secs = tool.timeout_secs();
    debug!(tool = tool.name(), timeout_secs, "Executing tool");
    match tokio::time::timeout(Duration::from_secs(timeout_secs), tool.execute(input)).await {
        Ok(result) => result,
        Err(_) => Err(CadreError::ToolTimeout {
            tool: tool.name().to_string(),
            timeout_secs,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use serde_json::json;

    struct Echo;

    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the input back"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<ToolResult>> {
            Box::pin(async move {
                let text = input["text"]
                    .as_str()
                    .ok_or_else(|| CadreError::ToolValidation("'text' must be a string".into()))?;
                Ok(ToolResult::success(text))
            })
        }
    }

    struct Sleepy;

    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            "Never finishes in time"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        fn execute(&self, _input: serde_json::Value) -> BoxFuture<'_, Result<ToolResult>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ToolResult::success("late"))
            })
        }
        fn timeout_secs(&self) -> u64 {
            1
        }
    }

    #[test]
    fn test_resolve_splits_found_and_missing() {
        let mut registry = ToolRegistry::with_builtins();
        registry.register(Echo);
        let (found, missing) = registry.resolve(&["echo", "tavily_search", "get_current_date"]);
        let names: Vec<&str> = found.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["echo", "get_current_date"]);
        assert_eq!(missing, vec!["tavily_search".to_string()]);
    }

    #[test]
    fn test_list_is_sorted() {
        let mut registry = ToolRegistry::with_builtins();
        registry.register(Echo);
        assert_eq!(registry.list(), vec!["echo", "get_current_date"]);
        assert!(registry.get("python_repl").is_none());
    }

    #[tokio::test]
    async fn test_execute_passes_tool_errors_through() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo);
        let echo = registry.get("echo").unwrap();
        let out = execute_with_timeout(echo.as_ref(), json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(out.content, "hi");

        let err = execute_with_timeout(echo.as_ref(), json!({})).await.unwrap_err();
        assert!(matches!(err, CadreError::ToolValidation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(Sleepy);
        let sleepy = registry.get("sleepy").unwrap();
        let err = execute_with_timeout(sleepy.as_ref(), json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            CadreError::ToolTimeout { timeout_secs: 1, .. }
        ));
    }
}
