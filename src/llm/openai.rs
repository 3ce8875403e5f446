//! OpenAI-compatible chat-completions client
//!
//! Speaks the `/chat/completions` wire format used by OpenAI and by Ollama's
//! OpenAI-compatible endpoint. Supports tool binding, `json_schema`
//! structured output and SSE streaming.

use crate::llm::client::{
    ensure_content_validity, ConversationMessage, LLMClient, LLMResponse, LLMStream, MessageRole,
    TokenUsage,
};
use crate::llm::structured::OutputSchema;
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

// ============= Wire Types =============

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
    #[serde(default)]
    annotations: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

// ============= Client =============

pub struct OpenAIClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: Option<u32>,
}

impl OpenAIClient {
    /// Create a client for `model` at `api_base` (e.g. `https://api.openai.com/v1`).
    pub fn new(api_base: &str, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key,
            model: model.into(),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Bound every request (connect through last byte) by `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    fn wire_messages(messages: &[ConversationMessage]) -> Vec<WireMessage> {
        ensure_content_validity(messages)
            .into_iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                tool_calls: m
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect(),
                tool_call_id: match m.role {
                    MessageRole::Tool => m.tool_call_id,
                    _ => None,
                },
                content: m.content,
            })
            .collect()
    }

    fn wire_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect()
    }

    fn request<'a>(&'a self, messages: &[ConversationMessage]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: Self::wire_messages(messages),
            max_tokens: self.max_tokens,
            tools: Vec::new(),
            response_format: None,
            stream: false,
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let mut http_req = self.http.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(format!("OpenAI request to '{}' timed out: {}", self.model, e))
            } else {
                AppError::LLM(format!("OpenAI request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body_text = response.text().await.unwrap_or_default();
        Err(self.map_status_error(status.as_u16(), &body_text))
    }

    fn map_status_error(&self, status: u16, body: &str) -> AppError {
        let lower = body.to_lowercase();
        if lower.contains("context_length_exceeded") || lower.contains("maximum context length") {
            return AppError::ContextLengthExceeded {
                model: self.model.clone(),
                message: body.to_string(),
            };
        }
        match status {
            408 | 504 => AppError::Timeout(format!("OpenAI API error {}: {}", status, body)),
            _ => AppError::LLM(format!("OpenAI API error {}: {}", status, body)),
        }
    }

    async fn complete(&self, body: &ChatRequest<'_>) -> Result<LLMResponse> {
        let parsed: ChatResponse = self
            .send(body)
            .await?
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("OpenAI response from '{}' timed out: {}", self.model, e))
                } else {
                    AppError::LLM(format!("Failed to parse OpenAI response: {}", e))
                }
            })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLM("No choices in OpenAI response".to_string()))?;

        let native_search_called = choice
            .message
            .annotations
            .iter()
            .any(|a| a.get("type").and_then(Value::as_str) == Some("url_citation"));

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| json!({}));
                ToolCall::new(call.id, call.function.name, arguments)
            })
            .collect();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            native_search_called,
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }
}

/// Drain every newline-terminated line from `buffer`.
///
/// Lines are decoded only once complete, so a multi-byte character split
/// across network chunks survives intact. The unterminated tail stays buffered.
fn take_complete_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        lines.push(String::from_utf8_lossy(&line).into_owned());
    }
    lines
}

/// Extract the delta text from one SSE line, if it carries any.
fn parse_sse_line(line: &str) -> Option<String> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return None;
    }
    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let body = ChatRequest {
            tools: Self::wire_tools(tools),
            ..self.request(messages)
        };
        self.complete(&body).await
    }

    async fn generate_structured(
        &self,
        messages: &[ConversationMessage],
        schema: &OutputSchema,
    ) -> Result<Value> {
        let body = ChatRequest {
            response_format: Some(json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                }
            })),
            ..self.request(messages)
        };
        let response = self.complete(&body).await?;
        serde_json::from_str(&response.content).map_err(|e| {
            AppError::LLM(format!(
                "Structured output for '{}' was not valid JSON: {}",
                schema.name, e
            ))
        })
    }

    async fn stream_with_history(&self, messages: &[ConversationMessage]) -> Result<LLMStream> {
        let body = ChatRequest {
            stream: true,
            ..self.request(messages)
        };
        let mut bytes = self.send(&body).await?.bytes_stream();

        let result_stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        buffer.extend_from_slice(&chunk);
                        for line in take_complete_lines(&mut buffer) {
                            if let Some(text) = parse_sse_line(&line) {
                                yield Ok(text);
                            }
                        }
                    }
                    Err(e) if e.is_timeout() => {
                        yield Err(AppError::Timeout(format!("Stream timed out: {}", e)));
                        break;
                    }
                    Err(e) => {
                        yield Err(AppError::LLM(format!("Stream error: {}", e)));
                        break;
                    }
                }
            }
            if let Some(text) = parse_sse_line(&String::from_utf8_lossy(&buffer)) {
                yield Ok(text);
            }
        };

        Ok(Box::new(Box::pin(result_stream)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
