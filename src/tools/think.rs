//! Reflection tool
//!
//! Gives a model a place to record its reasoning between research steps.
//! Nothing is executed; the reflection is acknowledged and echoed back.

use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

pub const THINK_TOOL_NAME: &str = "think_tool";

/// Arguments of a `think_tool` call.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ThinkArgs {
    /// Your reflection on progress so far, gaps in the findings and the next step
    pub reflection: String,
}

/// Acknowledgement recorded for a reflection.
pub fn reflection_recorded(reflection: &str) -> String {
    format!("Reflection recorded: {}", reflection)
}

pub struct ThinkTool;

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        THINK_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Record a strategic reflection on research progress and decide what to do next. \
         Use after each search to assess results before continuing."
    }

    fn parameters_schema(&self) -> Value {
        crate::tools::signals::schema_value::<ThinkArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let args: ThinkArgs = serde_json::from_value(args)
            .map_err(|e| AppError::InvalidInput(format!("Invalid think_tool arguments: {}", e)))?;
        Ok(Value::String(reflection_recorded(&args.reflection)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_think_tool_acknowledges_reflection() {
        let result = ThinkTool
            .execute(json!({"reflection": "Need primary sources"}))
            .await
            .unwrap();
        assert_eq!(result, json!("Reflection recorded: Need primary sources"));
    }

    #[tokio::test]
    async fn test_think_tool_requires_reflection() {
        assert!(ThinkTool.execute(json!({})).await.is_err());
    }

    #[test]
    fn test_schema_requires_reflection() {
        let schema = ThinkTool.parameters_schema();
        assert_eq!(schema["required"][0], "reflection");
    }
}
