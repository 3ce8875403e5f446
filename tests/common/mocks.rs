//! Mock implementations for testing.
//!
//! [`ScriptedLLM`] stands in for every stage model. A handler closure decides
//! the reply to each call from a [`MockCall`] describing it (which stage sent
//! it, how many calls that stage has made so far, the prompt). The mock
//! records every call, tracks per-stage concurrency and counts records that
//! reached it with blank content.

#![allow(dead_code)]

use async_trait::async_trait;
use delve::llm::client::{ConversationMessage, LLMClient, LLMResponse, LLMStream};
use delve::llm::structured::OutputSchema;
use delve::llm::{ModelCapabilities, StageModel, StageModels};
use delve::research::prompts::{BRIEF_FREE_TEXT_SUFFIX, CLARIFY_FREE_TEXT_SUFFIX, COMPRESSION_INSTRUCTION};
use delve::tools::registry::Tool;
use delve::tools::signals::{ResearchCompleteTool, CONDUCT_RESEARCH, RESEARCH_COMPLETE};
use delve::tools::think::ThinkTool;
use delve::tools::ToolRegistry;
use delve::types::{AppError, Result, ToolCall, ToolDefinition};
use delve::utils::toml_config::DelveConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============= Calls =============

/// How the gateway was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Tools,
    Structured,
    Stream,
}

/// Which research stage made a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Clarify,
    Brief,
    Supervisor,
    Researcher,
    Compression,
    Report,
}

/// Which report tier prompt a report call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPart {
    Streaming,
    Summary,
    KeyFindings,
    Analysis,
    SingleShot,
}

/// One recorded gateway call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub kind: CallKind,
    pub stage: Stage,
    /// Calls made by this stage before this one
    pub stage_index: usize,
    pub messages: Vec<ConversationMessage>,
    pub tool_names: Vec<String>,
    pub schema: Option<String>,
}

impl MockCall {
    /// Content of the last record, which holds the prompt for single-prompt calls.
    pub fn prompt(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or("")
    }

    /// The researcher topic, for researcher calls.
    pub fn topic(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == delve::llm::MessageRole::User)
            .map(|m| m.content.as_str())
    }

    pub fn report_part(&self) -> Option<ReportPart> {
        if self.stage != Stage::Report {
            return None;
        }
        let prompt = self.prompt();
        Some(if self.kind == CallKind::Stream {
            ReportPart::Streaming
        } else if prompt.starts_with("Based on this research brief") {
            ReportPart::Summary
        } else if prompt.starts_with("Based on these research findings") {
            ReportPart::KeyFindings
        } else if prompt.starts_with("Research Brief:") {
            ReportPart::Analysis
        } else {
            ReportPart::SingleShot
        })
    }
}

fn classify(kind: CallKind, messages: &[ConversationMessage], tool_names: &[String], schema: Option<&str>) -> Stage {
    let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
    match kind {
        CallKind::Stream => Stage::Report,
        CallKind::Structured => match schema {
            Some("ClarifyWithUser") => Stage::Clarify,
            _ => Stage::Brief,
        },
        CallKind::Tools => {
            if tool_names.iter().any(|n| n == CONDUCT_RESEARCH) {
                Stage::Supervisor
            } else if tool_names.iter().any(|n| n == RESEARCH_COMPLETE) {
                Stage::Researcher
            } else if last == COMPRESSION_INSTRUCTION {
                Stage::Compression
            } else if last.ends_with(CLARIFY_FREE_TEXT_SUFFIX) {
                Stage::Clarify
            } else if last.ends_with(BRIEF_FREE_TEXT_SUFFIX) {
                Stage::Brief
            } else {
                Stage::Report
            }
        }
    }
}

// ============= Replies =============

enum Outcome {
    Response(LLMResponse),
    Json(Value),
    Chunks(Vec<String>),
    Error(AppError),
}

/// What the mock answers to one call.
pub struct MockReply {
    outcome: Outcome,
    delay: Option<Duration>,
}

impl MockReply {
    pub fn text(content: &str) -> Self {
        Self::from(Outcome::Response(LLMResponse::text(content)))
    }

    pub fn calls(content: &str, calls: Vec<ToolCall>) -> Self {
        Self::from(Outcome::Response(LLMResponse::with_tool_calls(content, calls)))
    }

    pub fn json(value: Value) -> Self {
        Self::from(Outcome::Json(value))
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        Self::from(Outcome::Chunks(chunks.iter().map(|c| c.to_string()).collect()))
    }

    pub fn error(error: AppError) -> Self {
        Self::from(Outcome::Error(error))
    }

    /// Answer only after `delay`.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn from(outcome: Outcome) -> Self {
        Self { outcome, delay: None }
    }
}

/// A context-window overflow as the OpenAI client reports it.
pub fn context_overflow(model: &str) -> AppError {
    AppError::ContextLengthExceeded {
        model: model.to_string(),
        message: "This model's maximum context length is 1000 tokens".to_string(),
    }
}

pub fn delegate(id: &str, topic: &str) -> ToolCall {
    ToolCall::new(id, CONDUCT_RESEARCH, json!({ "research_topic": topic }))
}

pub fn complete(id: &str) -> ToolCall {
    ToolCall::new(id, RESEARCH_COMPLETE, json!({}))
}

pub fn think(id: &str, reflection: &str) -> ToolCall {
    ToolCall::new(id, "think_tool", json!({ "reflection": reflection }))
}

pub fn search(id: &str, query: &str) -> ToolCall {
    ToolCall::new(id, "web_search", json!({ "query": query }))
}

// ============= Scripted client =============

type Handler = Box<dyn Fn(&MockCall) -> MockReply + Send + Sync>;

#[derive(Default)]
struct Gauge {
    current: usize,
    peak: usize,
}

/// Scripted gateway fake.
pub struct ScriptedLLM {
    model: String,
    handler: Handler,
    calls: Mutex<Vec<MockCall>>,
    stage_counts: Mutex<HashMap<Stage, usize>>,
    gauges: Arc<Mutex<HashMap<Stage, Gauge>>>,
    blank_records: AtomicUsize,
}

impl ScriptedLLM {
    pub fn new(handler: impl Fn(&MockCall) -> MockReply + Send + Sync + 'static) -> Arc<Self> {
        Self::named("scripted-model", handler)
    }

    pub fn named(model: &str, handler: impl Fn(&MockCall) -> MockReply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            model: model.to_string(),
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            stage_counts: Mutex::new(HashMap::new()),
            gauges: Arc::new(Mutex::new(HashMap::new())),
            blank_records: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, stage: Stage) -> Vec<MockCall> {
        self.calls().into_iter().filter(|c| c.stage == stage).collect()
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.calls_for(stage).len()
    }

    /// Highest number of simultaneous in-flight calls from `stage`.
    pub fn peak_concurrency(&self, stage: Stage) -> usize {
        self.gauges.lock().unwrap().get(&stage).map(|g| g.peak).unwrap_or(0)
    }

    /// Records received with blank content, across all calls.
    pub fn blank_records(&self) -> usize {
        self.blank_records.load(Ordering::SeqCst)
    }

    /// Record the call and return the scripted reply, honoring its delay.
    async fn respond(
        &self,
        kind: CallKind,
        messages: &[ConversationMessage],
        tool_names: Vec<String>,
        schema: Option<String>,
    ) -> Outcome {
        let blank = messages.iter().filter(|m| m.content.trim().is_empty()).count();
        self.blank_records.fetch_add(blank, Ordering::SeqCst);

        let stage = classify(kind, messages, &tool_names, schema.as_deref());
        let stage_index = {
            let mut counts = self.stage_counts.lock().unwrap();
            let entry = counts.entry(stage).or_insert(0);
            let index = *entry;
            *entry += 1;
            index
        };
        let call = MockCall {
            kind,
            stage,
            stage_index,
            messages: messages.to_vec(),
            tool_names,
            schema,
        };
        self.calls.lock().unwrap().push(call.clone());

        let _guard = InFlight::enter(self.gauges.clone(), stage);
        let reply = (self.handler)(&call);
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.outcome
    }
}

/// Decrements a stage gauge when the call ends or is cancelled.
struct InFlight {
    gauges: Arc<Mutex<HashMap<Stage, Gauge>>>,
    stage: Stage,
}

impl InFlight {
    fn enter(gauges: Arc<Mutex<HashMap<Stage, Gauge>>>, stage: Stage) -> Self {
        {
            let mut map = gauges.lock().unwrap();
            let gauge = map.entry(stage).or_default();
            gauge.current += 1;
            gauge.peak = gauge.peak.max(gauge.current);
        }
        Self { gauges, stage }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut map) = self.gauges.lock() {
            if let Some(gauge) = map.get_mut(&self.stage) {
                gauge.current -= 1;
            }
        }
    }
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let names = tools.iter().map(|t| t.name.clone()).collect();
        match self.respond(CallKind::Tools, messages, names, None).await {
            Outcome::Response(response) => Ok(response),
            Outcome::Json(value) => Ok(LLMResponse::text(value.to_string())),
            Outcome::Chunks(chunks) => Ok(LLMResponse::text(chunks.concat())),
            Outcome::Error(e) => Err(e),
        }
    }

    async fn generate_structured(
        &self,
        messages: &[ConversationMessage],
        schema: &OutputSchema,
    ) -> Result<Value> {
        match self
            .respond(CallKind::Structured, messages, Vec::new(), Some(schema.name.clone()))
            .await
        {
            Outcome::Json(value) => Ok(value),
            Outcome::Response(response) => serde_json::from_str(&response.content)
                .map_err(|e| AppError::LLM(format!("mock structured reply is not JSON: {}", e))),
            Outcome::Chunks(_) => Err(AppError::Internal("chunks scripted for a structured call".into())),
            Outcome::Error(e) => Err(e),
        }
    }

    async fn stream_with_history(&self, messages: &[ConversationMessage]) -> Result<LLMStream> {
        match self.respond(CallKind::Stream, messages, Vec::new(), None).await {
            Outcome::Chunks(chunks) => Ok(Box::new(futures::stream::iter(chunks.into_iter().map(Ok)))),
            Outcome::Response(response) => Ok(Box::new(futures::stream::iter(vec![Ok(response.content)]))),
            Outcome::Json(value) => Ok(Box::new(futures::stream::iter(vec![Ok(value.to_string())]))),
            Outcome::Error(e) => Err(e),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============= Fixtures =============

/// Free-text, non-streaming model with a 1000-token window.
pub fn plain_capabilities() -> ModelCapabilities {
    ModelCapabilities {
        supports_tools: true,
        supports_structured_output: false,
        supports_streaming: false,
        context_window: Some(1_000),
        family: None,
    }
}

pub fn stage_model(llm: &Arc<ScriptedLLM>, capabilities: ModelCapabilities) -> StageModel {
    StageModel::new(llm.clone(), capabilities)
}

pub fn uniform_models(llm: &Arc<ScriptedLLM>) -> StageModels {
    StageModels::uniform(stage_model(llm, plain_capabilities()))
}

/// Configuration with clarification off and the given limits.
pub fn test_config(max_iterations: u32, max_concurrent: usize, max_react: u32) -> DelveConfig {
    let mut config = DelveConfig::default();
    config.research.allow_clarification = false;
    config.research.max_researcher_iterations = max_iterations;
    config.research.max_concurrent_research_units = max_concurrent;
    config.research.max_react_tool_calls = max_react;
    config
}

/// Offline search tool returning a fixed result per query.
pub struct FakeSearch;

#[async_trait]
impl Tool for FakeSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]})
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::InvalidInput("Missing 'query' parameter".to_string()))?;
        Ok(json!(format!("Result for {}", query)))
    }
}

/// Researcher tools without network access.
pub fn offline_tools() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FakeSearch));
    registry.register(Arc::new(ThinkTool));
    registry.register(Arc::new(ResearchCompleteTool));
    Arc::new(registry)
}
