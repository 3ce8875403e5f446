//! Model capabilities and context-window knowledge
//!
//! The research stages need three facts about a target model:
//! - whether it accepts a JSON schema for structured output
//! - whether it is a known streaming-capable endpoint
//! - its context window in tokens, used to size truncation retries
//!
//! Facts come from a built-in table keyed by model-name substrings and can be
//! overridden per model in configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use delve::llm::capabilities::{ModelCapabilities, is_token_limit_exceeded};
//!
//! let caps = ModelCapabilities::for_model("gpt-4.1");
//! assert_eq!(caps.context_window, Some(1_047_576));
//! ```

use crate::types::AppError;
use crate::utils::toml_config::ModelConfig;
use serde::{Deserialize, Serialize};

/// Capabilities that an LLM model may support.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelCapabilities {
    /// Whether the model supports tool/function calling
    #[serde(default)]
    pub supports_tools: bool,

    /// Whether the model accepts a JSON schema for its output
    #[serde(default)]
    pub supports_structured_output: bool,

    /// Whether the model is a known streaming-capable endpoint
    #[serde(default)]
    pub supports_streaming: bool,

    /// Maximum context window size in tokens, when known
    #[serde(default)]
    pub context_window: Option<u64>,

    /// Model family (e.g., "gpt-4", "claude", "gemini")
    #[serde(default)]
    pub family: Option<String>,
}

/// Known context windows, matched by substring against the model name.
///
/// More specific keys come first so that `gpt-4.1-mini` is not matched by `gpt-4`.
const MODEL_TOKEN_LIMITS: &[(&str, u64)] = &[
    ("gpt-4.1-mini", 1_047_576),
    ("gpt-4.1-nano", 1_047_576),
    ("gpt-4.1", 1_047_576),
    ("gpt-4o-mini", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4-turbo", 128_000),
    ("o4-mini", 200_000),
    ("o3-mini", 200_000),
    ("o3", 200_000),
    ("o1", 200_000),
    ("gpt-4", 8_192),
    ("gpt-3.5", 16_385),
    ("claude-opus-4", 200_000),
    ("claude-sonnet-4", 200_000),
    ("claude-3-7-sonnet", 200_000),
    ("claude-3-5-sonnet", 200_000),
    ("claude-3-5-haiku", 200_000),
    ("gemini-1.5-pro", 2_097_152),
    ("gemini-1.5-flash", 1_048_576),
    ("gemini-2.5-pro", 1_048_576),
    ("gemini-2.5-flash", 1_048_576),
    ("llama-3.3", 131_072),
    ("llama3.3", 131_072),
    ("llama-3.1", 131_072),
    ("llama3.1", 131_072),
    ("mistral-large", 128_000),
    ("qwen", 128_000),
];

/// Look up the context window for a model name.
pub fn model_token_limit(model_name: &str) -> Option<u64> {
    let lower = model_name.to_lowercase();
    MODEL_TOKEN_LIMITS
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, limit)| *limit)
}

fn is_openai_reasoning(model_lower: &str) -> bool {
    model_lower
        .strip_prefix('o')
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}

fn family_of(model_lower: &str) -> Option<&'static str> {
    if model_lower.contains("gpt-") || is_openai_reasoning(model_lower) {
        Some("openai")
    } else if model_lower.contains("claude") {
        Some("anthropic")
    } else if model_lower.contains("gemini") {
        Some("google")
    } else if model_lower.contains("llama") || model_lower.contains("mistral") || model_lower.contains("qwen") {
        Some("open-weights")
    } else {
        None
    }
}

impl ModelCapabilities {
    /// Create capabilities for a known model by name.
    ///
    /// Unknown models get conservative defaults: tools only, free-text
    /// output, no streaming, unknown context window.
    pub fn for_model(model_name: &str) -> Self {
        let lower = model_name.to_lowercase();
        let family = family_of(&lower);
        let context_window = model_token_limit(&lower);

        match family {
            Some("openai") => Self {
                supports_tools: true,
                supports_structured_output: !lower.contains("gpt-3.5"),
                supports_streaming: true,
                context_window,
                family: Some("openai".to_string()),
            },
            Some("anthropic") | Some("google") => Self {
                supports_tools: true,
                supports_structured_output: false,
                supports_streaming: true,
                context_window,
                family: family.map(str::to_string),
            },
            Some(other) => Self {
                supports_tools: true,
                supports_structured_output: false,
                supports_streaming: true,
                context_window,
                family: Some(other.to_string()),
            },
            None => Self {
                supports_tools: true,
                context_window,
                ..Default::default()
            },
        }
    }

    /// Built-in capabilities with any overrides from the model's configuration applied.
    pub fn resolve(model: &ModelConfig) -> Self {
        let mut caps = Self::for_model(&model.model);
        if let Some(structured) = model.structured_output {
            caps.supports_structured_output = structured;
        }
        if let Some(streaming) = model.streaming {
            caps.supports_streaming = streaming;
        }
        if let Some(limit) = model.token_limit {
            caps.context_window = Some(limit);
        }
        caps
    }
}

/// Whether `error` means the prompt exceeded `model`'s context window.
///
/// The typed [`AppError::ContextLengthExceeded`] always matches. Untyped
/// provider errors are matched by the phrases each provider family uses;
/// when the family is unknown, every family's phrases are tried.
pub fn is_token_limit_exceeded(error: &AppError, model: &str) -> bool {
    if matches!(error, AppError::ContextLengthExceeded { .. }) {
        return true;
    }

    let text = error.to_string().to_lowercase();
    let openai = || {
        text.contains("context_length_exceeded")
            || text.contains("maximum context length")
            || (text.contains("token") && text.contains("exceed"))
    };
    let anthropic = || text.contains("prompt is too long") || text.contains("input length and `max_tokens` exceed");
    let google = || text.contains("resource exhausted") || text.contains("resource_exhausted") || text.contains("token count");

    match family_of(&model.to_lowercase()) {
        Some("openai") => openai(),
        Some("anthropic") => anthropic(),
        Some("google") => google(),
        _ => openai() || anthropic() || google(),
    }
}
