//! Structured vs. free-text invocation
//!
//! Call sites that want a typed answer from a model pick an
//! [`InvocationMode`] once, from the target model's capability flag:
//! structured output constrained by a JSON schema when the model supports it,
//! otherwise a free-text completion run through a heuristic parser.

use crate::llm::client::{ConversationMessage, LLMClient};
use crate::types::{AppError, Result};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// A named JSON schema for structured model output.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: String,
    pub schema: serde_json::Value,
    /// Whether a value deserializes into the type the schema was derived from
    conforms: fn(&serde_json::Value) -> std::result::Result<(), String>,
}

impl OutputSchema {
    /// Derive the schema from a `JsonSchema` type.
    pub fn for_type<T: JsonSchema + DeserializeOwned>(name: &str) -> Self {
        let schema = schemars::schema_for!(T);
        Self {
            name: name.to_string(),
            schema: serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({})),
            conforms: |value| {
                serde_json::from_value::<T>(value.clone())
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            },
        }
    }

    /// Check a structured reply against the target type.
    ///
    /// A mismatch is an [`AppError::LLM`], so retry wrappers treat it like
    /// any other failed call.
    pub fn check(&self, value: &serde_json::Value) -> Result<()> {
        (self.conforms)(value).map_err(|e| {
            AppError::LLM(format!(
                "Structured output did not match schema '{}': {}",
                self.name, e
            ))
        })
    }
}

impl PartialEq for OutputSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.schema == other.schema
    }
}

/// How a typed answer is obtained from the gateway.
pub enum InvocationMode<T> {
    /// Ask the provider for JSON matching the schema.
    Structured(OutputSchema),
    /// Ask for plain text and parse it.
    FreeText(fn(&str) -> T),
}

impl<T> std::fmt::Debug for InvocationMode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationMode::Structured(schema) => write!(f, "Structured({})", schema.name),
            InvocationMode::FreeText(_) => write!(f, "FreeText"),
        }
    }
}

impl<T: DeserializeOwned + JsonSchema> InvocationMode<T> {
    /// Pick the mode for a model from its structured-output capability.
    pub fn select(supports_structured_output: bool, name: &str, parser: fn(&str) -> T) -> Self {
        if supports_structured_output {
            InvocationMode::Structured(OutputSchema::for_type::<T>(name))
        } else {
            InvocationMode::FreeText(parser)
        }
    }
}

impl<T: DeserializeOwned> InvocationMode<T> {
    pub fn is_structured(&self) -> bool {
        matches!(self, InvocationMode::Structured(_))
    }

    /// Run the call and produce a typed value.
    ///
    /// Structured output that does not deserialize into `T` is an
    /// [`AppError::LLM`].
    pub async fn invoke(&self, client: &dyn LLMClient, messages: &[ConversationMessage]) -> Result<T> {
        match self {
            InvocationMode::Structured(schema) => {
                let value = client.generate_structured(messages, schema).await?;
                serde_json::from_value(value).map_err(|e| {
                    AppError::LLM(format!(
                        "Structured output did not match schema '{}': {}",
                        schema.name, e
                    ))
                })
            }
            InvocationMode::FreeText(parse) => {
                let response = client.generate_with_history(messages).await?;
                Ok(parse(&response.content))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Verdict {
        approved: bool,
    }

    fn parse_verdict(text: &str) -> Verdict {
        Verdict {
            approved: text.contains("yes"),
        }
    }

    #[test]
    fn test_select_follows_capability() {
        let structured = InvocationMode::<Verdict>::select(true, "Verdict", parse_verdict);
        assert!(structured.is_structured());

        let free = InvocationMode::<Verdict>::select(false, "Verdict", parse_verdict);
        assert!(!free.is_structured());
    }

    #[test]
    fn test_schema_mentions_fields() {
        let schema = OutputSchema::for_type::<Verdict>("Verdict");
        assert_eq!(schema.name, "Verdict");
        assert!(schema.schema.to_string().contains("approved"));
    }
}
