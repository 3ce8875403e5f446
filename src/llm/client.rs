//! Invocation gateway abstractions
//!
//! This module defines the contract the research engine needs from a model
//! provider:
//! - **Conversation records**: the append-only message sequence exchanged with a model
//! - **Tool-bound calls**: a completion that may carry invocation requests
//! - **Structured calls**: a completion constrained to a JSON schema
//! - **Streaming calls**: incremental content chunks
//!
//! Every record sent through the gateway must have non-empty content; use
//! [`ensure_content_validity`] before handing a conversation to a client.

use crate::llm::structured::OutputSchema;
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Stream of incremental content chunks from a streaming completion.
pub type LLMStream = Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>;

/// Generic LLM client trait for provider abstraction
///
/// All model providers implement this trait, allowing the research stages to
/// run against any provider (or a scripted fake in tests).
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a response over a conversation with the given tools bound.
    ///
    /// An empty `tools` slice means a plain completion.
    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse>;

    /// Generate a response over a conversation without tools.
    async fn generate_with_history(&self, messages: &[ConversationMessage]) -> Result<LLMResponse> {
        self.generate_with_tools_and_history(messages, &[]).await
    }

    /// Generate a completion from a single user prompt.
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .generate_with_history(&[ConversationMessage::user(prompt)])
            .await?;
        Ok(response.content)
    }

    /// Generate a JSON value conforming to `schema`.
    ///
    /// Providers without structured-output support keep the default, which
    /// reports [`AppError::Unsupported`].
    async fn generate_structured(
        &self,
        _messages: &[ConversationMessage],
        schema: &OutputSchema,
    ) -> Result<serde_json::Value> {
        Err(AppError::Unsupported(format!(
            "model '{}' does not support structured output ('{}')",
            self.model_name(),
            schema.name
        )))
    }

    /// Stream a completion over a conversation.
    async fn stream_with_history(&self, _messages: &[ConversationMessage]) -> Result<LLMStream> {
        Err(AppError::Unsupported(format!(
            "model '{}' does not support streaming",
            self.model_name()
        )))
    }

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }
}

/// Response from an LLM generation request
#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Any tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// The reason generation stopped (e.g., "stop", "tool_calls", "length")
    pub finish_reason: String,
    /// Whether the provider ran its own web search while answering
    pub native_search_called: bool,
    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    /// A plain text response with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: "stop".to_string(),
            ..Default::default()
        }
    }

    /// A response requesting the given tool calls.
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            finish_reason: "tool_calls".to_string(),
            ..Default::default()
        }
    }
}

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
    /// Tool execution result.
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// One record of a conversation.
///
/// Records are appended, never mutated in place; [`ensure_content_validity`]
/// produces rewritten copies when content is blank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The text content of the message.
    pub content: String,
    /// Tool calls requested by the assistant (only for Assistant role).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Correlation id of the tool call this record answers (only for Tool role).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced this record (only for Tool role).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ConversationMessage {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message with optional tool calls.
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(MessageRole::Assistant, content)
        }
    }

    /// Create a tool result message answering `call`.
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            ..Self::new(MessageRole::Tool, content)
        }
    }

    /// Whether the content is non-blank.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Synthetic content used when this record's own content is blank.
    pub fn placeholder_content(&self) -> String {
        match self.role {
            MessageRole::Assistant if !self.tool_calls.is_empty() => {
                let names: Vec<&str> = self.tool_calls.iter().map(|c| c.name.as_str()).collect();
                format!("Executing: {}", names.join(", "))
            }
            MessageRole::Assistant => "Processing request.".to_string(),
            MessageRole::User => "[User input]".to_string(),
            MessageRole::System => "System message.".to_string(),
            MessageRole::Tool => "Tool executed.".to_string(),
        }
    }
}

/// Return a copy of `messages` in which every blank record carries
/// placeholder content. Records with content are passed through unchanged.
pub fn ensure_content_validity(messages: &[ConversationMessage]) -> Vec<ConversationMessage> {
    messages
        .iter()
        .map(|message| {
            if message.has_content() {
                message.clone()
            } else {
                ConversationMessage {
                    content: message.placeholder_content(),
                    ..message.clone()
                }
            }
        })
        .collect()
}

/// Render a conversation as a plain transcript, one `Role: content` line per record.
pub fn buffer_string(messages: &[ConversationMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let prefix = match m.role {
                MessageRole::System => "System",
                MessageRole::User => "Human",
                MessageRole::Assistant => "AI",
                MessageRole::Tool => "Tool",
            };
            format!("{}: {}", prefix, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
