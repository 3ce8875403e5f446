//! Control signals bound as tools
//!
//! `ConductResearch` and `ResearchComplete` are not executed by the tool
//! layer; the supervisor reads them from a planning response and acts on
//! them. Researchers also get `ResearchComplete`, which ends their loop after
//! the round it appears in.

use crate::tools::registry::Tool;
use crate::tools::think::{ThinkArgs, ThinkTool, THINK_TOOL_NAME};
use crate::types::{Result, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CONDUCT_RESEARCH: &str = "ConductResearch";
pub const RESEARCH_COMPLETE: &str = "ResearchComplete";

/// Delegate one research topic to a new researcher.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConductResearch {
    /// The topic to research. Describe a single topic in high detail (at least a paragraph).
    pub research_topic: String,
}

/// Signal that research is complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResearchComplete {}

/// JSON schema of `T` in the shape tool bindings expect.
pub fn schema_value<T: JsonSchema>() -> Value {
    let mut value = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| {
        serde_json::json!({"type": "object", "properties": {}})
    });
    if let Some(map) = value.as_object_mut() {
        map.remove("$schema");
        map.remove("title");
        map.entry("properties")
            .or_insert_with(|| Value::Object(Default::default()));
    }
    value
}

fn definition<T: JsonSchema>(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters: schema_value::<T>(),
    }
}

/// Tools bound for supervisor planning calls.
pub fn supervisor_tools() -> Vec<ToolDefinition> {
    vec![
        definition::<ConductResearch>(
            CONDUCT_RESEARCH,
            "Delegate a research topic to a specialized researcher. Each call starts one researcher.",
        ),
        definition::<ResearchComplete>(
            RESEARCH_COMPLETE,
            "Call this when the gathered findings are sufficient to answer the research brief.",
        ),
        definition::<ThinkArgs>(THINK_TOOL_NAME, ThinkTool.description()),
    ]
}

/// `ResearchComplete` as an executable researcher tool.
pub struct ResearchCompleteTool;

#[async_trait]
impl Tool for ResearchCompleteTool {
    fn name(&self) -> &str {
        RESEARCH_COMPLETE
    }

    fn description(&self) -> &str {
        "Call this when you have gathered enough information to answer your research topic."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<ResearchComplete>()
    }

    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(Value::String("Research marked complete.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_tools() {
        let tools = supervisor_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![CONDUCT_RESEARCH, RESEARCH_COMPLETE, THINK_TOOL_NAME]);

        let conduct = &tools[0].parameters;
        assert_eq!(conduct["type"], "object");
        assert!(conduct["properties"].get("research_topic").is_some());
        assert!(conduct.get("$schema").is_none());
        assert!(tools[1].parameters["properties"].is_object());
    }

    #[tokio::test]
    async fn test_research_complete_tool() {
        let result = ResearchCompleteTool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(result, Value::String("Research marked complete.".to_string()));
    }
}
