use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use crate::utils::toml_config::ToolsConfig;
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value>;
}

/// Render a tool's output as the text recorded in the conversation.
pub fn value_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Create the researcher tool set enabled by configuration.
    ///
    /// Always includes the completion signal; web search, page fetch and
    /// reflection follow their toggles.
    pub fn from_config(config: &ToolsConfig) -> Self {
        let mut registry = Self::new().with_timeout(Duration::from_secs(config.timeout_secs));

        if config.web_search {
            registry.register(Arc::new(crate::tools::search::SearchTool::new(
                config.max_search_results,
            )));
        }
        if config.fetch_page {
            registry.register(Arc::new(crate::tools::search::FetchPageTool::new()));
        }
        if config.think {
            registry.register(Arc::new(crate::tools::think::ThinkTool));
        }
        registry.register(Arc::new(crate::tools::signals::ResearchCompleteTool));

        registry
    }

    /// Bound each tool execution by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Definitions of every registered tool, sorted by name.
    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<Value> {
        if let Some(tool) = self.tools.get(name) {
            tool.execute(args).await
        } else {
            Err(AppError::NotFound(format!("Tool not found: {}", name)))
        }
    }

    /// Execute one tool and return its result as text.
    ///
    /// Never fails: errors, timeouts and panics inside the tool become the
    /// returned text.
    pub async fn execute_safely(&self, name: &str, args: Value) -> String {
        let run = AssertUnwindSafe(self.execute(name, args)).catch_unwind();

        match timeout(self.timeout, run).await {
            Ok(Ok(Ok(value))) => value_to_text(value),
            Ok(Ok(Err(e))) => {
                debug!(tool = name, error = %e, "Tool returned an error");
                format!("Error executing tool: {}", e)
            }
            Ok(Err(_)) => {
                warn!(tool = name, "Tool panicked");
                format!("Error executing tool: {} panicked", name)
            }
            Err(_) => {
                warn!(tool = name, timeout_secs = self.timeout.as_secs(), "Tool timed out");
                format!(
                    "Error executing tool: {} timed out after {} seconds",
                    name,
                    self.timeout.as_secs()
                )
            }
        }
    }

    /// Execute every call concurrently; results are in call order.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<String> {
        let futures = calls
            .iter()
            .map(|call| self.execute_safely(&call.name, call.arguments.clone()));
        join_all(futures).await
    }

    /// Get a list of all registered tool names
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a tool is registered
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

/// Definitions of the tools a configuration enables.
pub fn list_tools(config: &ToolsConfig) -> Vec<ToolDefinition> {
    ToolRegistry::from_config(config).get_tool_definitions()
}
