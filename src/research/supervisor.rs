//! Supervisor loop
//!
//! Plans delegation over the research brief, fans delegated topics out to
//! concurrent [`Researcher`]s and aggregates their findings. The loop has a
//! single exit, taken when the iteration budget is spent, the model stops
//! calling tools, or it signals completion.

use crate::llm::capabilities::is_token_limit_exceeded;
use crate::llm::client::{ensure_content_validity, ConversationMessage};
use crate::llm::provider_registry::StageModel;
use crate::research::prompts::{supervisor_system_prompt, today};
use crate::research::researcher::Researcher;
use crate::research::state::{SupervisorContext, TaskResult};
use crate::tools::signals::{supervisor_tools, CONDUCT_RESEARCH, RESEARCH_COMPLETE};
use crate::tools::think::{reflection_recorded, THINK_TOOL_NAME};
use crate::types::{Result, ToolCall};
use crate::utils::toml_config::ResearchConfig;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};

/// Content used when a planning response carries none.
pub const PLANNING_PLACEHOLDER: &str = "Analyzing research requirements and planning next steps.";

/// Rejection recorded for delegate calls beyond the concurrency limit.
pub fn overflow_rejection(limit: usize) -> String {
    format!(
        "Error: Did not run this research as you have already exceeded the maximum number of concurrent research units. Please try again with {} or fewer research units.",
        limit
    )
}

/// What the supervisor hands back to the workflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupervisorOutcome {
    pub notes: Vec<String>,
    pub raw_notes: Vec<String>,
    pub iterations: u32,
}

pub struct Supervisor {
    model: StageModel,
    researcher: Researcher,
    max_researcher_iterations: u32,
    max_concurrent_research_units: usize,
}

impl Supervisor {
    pub fn new(model: StageModel, researcher: Researcher, config: &ResearchConfig) -> Self {
        Self {
            model,
            researcher,
            max_researcher_iterations: config.max_researcher_iterations,
            max_concurrent_research_units: config.max_concurrent_research_units.max(1),
        }
    }

    /// Run the delegation loop for `research_brief` to completion.
    pub async fn run(&self, research_brief: &str) -> SupervisorOutcome {
        let system_prompt = supervisor_system_prompt(
            &today(),
            self.max_concurrent_research_units,
            self.max_researcher_iterations,
        );
        let mut ctx = SupervisorContext::new(research_brief, system_prompt);
        let tools = supervisor_tools();

        loop {
            let response = match self
                .model
                .client
                .generate_with_tools_and_history(&ensure_content_validity(&ctx.conversation), &tools)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!(iteration = ctx.iterations, error = %e, "Supervisor planning call failed");
                    break;
                }
            };

            let content = if response.content.trim().is_empty() {
                PLANNING_PLACEHOLDER.to_string()
            } else {
                response.content
            };
            let calls = response.tool_calls;
            ctx.conversation
                .push(ConversationMessage::assistant(content, calls.clone()));
            ctx.iterations += 1;

            let exceeded = ctx.iterations > self.max_researcher_iterations;
            let completed = calls.iter().any(|c| c.name == RESEARCH_COMPLETE);
            if exceeded || calls.is_empty() || completed {
                info!(
                    iteration = ctx.iterations,
                    exceeded,
                    completed,
                    notes = ctx.notes.len(),
                    "Supervisor finished"
                );
                break;
            }

            if self.delegate(&mut ctx, &calls).await {
                warn!(iteration = ctx.iterations, "Research exceeded the context window, ending delegation");
                break;
            }
        }

        SupervisorOutcome {
            notes: ctx.notes,
            raw_notes: ctx.raw_notes,
            iterations: ctx.iterations,
        }
    }

    /// Answer every call of one planning response, dispatching delegated
    /// topics concurrently. Returns true when a researcher overflowed its
    /// context window.
    async fn delegate(&self, ctx: &mut SupervisorContext, calls: &[ToolCall]) -> bool {
        let limit = self.max_concurrent_research_units;
        let mut records: Vec<Option<ConversationMessage>> = vec![None; calls.len()];
        // (call index, topic) in request order
        let mut dispatch: Vec<(usize, String)> = Vec::new();
        let mut rejected = 0usize;

        for (index, call) in calls.iter().enumerate() {
            let content = match call.name.as_str() {
                THINK_TOOL_NAME => reflection_recorded(call.str_arg("reflection").unwrap_or_default()),
                CONDUCT_RESEARCH => match call.str_arg("research_topic").map(str::trim) {
                    Some(topic) if !topic.is_empty() => {
                        if dispatch.len() < limit {
                            dispatch.push((index, topic.to_string()));
                            continue;
                        }
                        rejected += 1;
                        overflow_rejection(limit)
                    }
                    _ => "Error: ConductResearch requires a non-empty research_topic.".to_string(),
                },
                other => format!("Error: Unknown tool '{}'.", other),
            };
            records[index] = Some(ConversationMessage::tool_result(call, content));
        }

        info!(
            iteration = ctx.iterations,
            dispatched = dispatch.len(),
            rejected,
            "Delegating research"
        );
        if rejected > 0 {
            warn!(rejected, limit, "Rejected delegate calls over the concurrency limit");
        }

        let mut results = self.dispatch(&dispatch).await;

        let mut overflowed = false;
        for (slot, (index, _)) in dispatch.iter().enumerate() {
            let content = match results[slot].take() {
                Some(Ok(result)) => {
                    ctx.add_note(&result.compressed_findings);
                    ctx.raw_notes.push(result.raw_notes);
                    result.compressed_findings
                }
                Some(Err(e)) => {
                    if is_token_limit_exceeded(&e, self.researcher_model()) {
                        overflowed = true;
                    }
                    format!("Error conducting research: {}", e)
                }
                None => "Error conducting research: researcher task aborted".to_string(),
            };
            records[*index] = Some(ConversationMessage::tool_result(&calls[*index], content));
        }

        ctx.conversation.extend(records.into_iter().flatten());
        overflowed
    }

    /// Run one researcher per topic and wait for all of them. Results are
    /// indexed by dispatch slot; a task that panicked leaves `None`.
    async fn dispatch(&self, topics: &[(usize, String)]) -> Vec<Option<Result<TaskResult>>> {
        let mut set = JoinSet::new();
        for (slot, (_, topic)) in topics.iter().enumerate() {
            let researcher = self.researcher.clone();
            let topic = topic.clone();
            set.spawn(
                async move { (slot, researcher.run(&topic).await) }
                    .instrument(info_span!("researcher", index = slot)),
            );
        }

        let mut results: Vec<Option<Result<TaskResult>>> = (0..topics.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, result)) => results[slot] = Some(result),
                Err(e) => error!(error = %e, "Researcher task did not complete"),
            }
        }
        results
    }

    fn researcher_model(&self) -> &str {
        self.model.model_name()
    }
}
