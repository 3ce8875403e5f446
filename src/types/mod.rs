use serde::{Deserialize, Serialize};

// ============= Tool Types =============

/// Schema advertised to the model for one bindable tool.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// An invocation request emitted by an assistant turn.
///
/// Consumed exactly once by the tool layer; its result is recorded as a tool
/// message carrying the same `id`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Read a string argument, if present.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Context length exceeded for model '{model}': {message}")]
    ContextLengthExceeded { model: String, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable variant name, used when an error is embedded in a report.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::LLM(_) => "LLMError",
            AppError::ContextLengthExceeded { .. } => "ContextLengthExceeded",
            AppError::Timeout(_) => "Timeout",
            AppError::Tool(_) => "ToolError",
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Configuration(_) => "ConfigurationError",
            AppError::Unsupported(_) => "Unsupported",
            AppError::Internal(_) => "InternalError",
        }
    }

    /// Whether this failure looks like an upstream or local timeout.
    pub fn is_timeout(&self) -> bool {
        if matches!(self, AppError::Timeout(_)) {
            return true;
        }
        let text = self.to_string().to_lowercase();
        text.contains("timeout") || text.contains("timed out") || text.contains(" 408")
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
