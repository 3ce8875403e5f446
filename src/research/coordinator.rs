//! Workflow controller
//!
//! Sequences one run through `Clarify -> Brief -> Supervise -> Report -> Done`.
//! Each stage returns a [`Transition`] naming the next state and a
//! [`StatePatch`]; the controller is the only writer of [`RunState`].
//!
//! # Example
//!
//! ```rust,ignore
//! use delve::research;
//! use delve::utils::toml_config::DelveConfig;
//!
//! let config = DelveConfig::load("delve.toml")?;
//! let result = research::run("How have tidal energy costs changed since 2015?", &config).await?;
//! println!("{}", result.final_report);
//! ```

use crate::llm::client::{buffer_string, ConversationMessage};
use crate::llm::provider_registry::{ProviderRegistry, StageModels};
use crate::llm::structured::InvocationMode;
use crate::research::compression::Compressor;
use crate::research::prompts::{
    clarify_prompt, report_date, research_brief_prompt, today, BRIEF_FREE_TEXT_SUFFIX,
    CLARIFY_FREE_TEXT_SUFFIX,
};
use crate::research::report::{static_fallback, ReportInput, ReportWriter};
use crate::research::researcher::Researcher;
use crate::research::scoping::{
    parse_clarification, parse_research_brief, ClarifyWithUser, ResearchQuestion,
    DEFAULT_CLARIFYING_QUESTION, DEFAULT_RESEARCH_BRIEF, DEFAULT_VERIFICATION,
};
use crate::research::state::{RunResult, RunState, StatePatch};
use crate::research::supervisor::Supervisor;
use crate::tools::ToolRegistry;
use crate::types::Result;
use crate::utils::toml_config::{DelveConfig, ReportConfig};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Clarify,
    Brief,
    Supervise,
    Report,
    Done,
}

/// Result of one stage: where to go next and what to record.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: WorkflowState,
    pub patch: StatePatch,
}

impl Transition {
    pub fn to(next: WorkflowState, patch: StatePatch) -> Self {
        Self { next, patch }
    }
}

/// Drives research runs with a fixed set of stage models and tools.
pub struct ResearchCoordinator {
    models: StageModels,
    supervisor: Supervisor,
    report_writer: ReportWriter,
    report_config: ReportConfig,
    allow_clarification: bool,
}

impl ResearchCoordinator {
    pub fn new(models: StageModels, tools: Arc<ToolRegistry>, config: &DelveConfig) -> Self {
        let researcher = Researcher::new(
            models.research.clone(),
            Compressor::new(models.compression.clone()),
            tools,
            config.research.max_react_tool_calls,
        );
        let supervisor = Supervisor::new(models.research.clone(), researcher, &config.research);
        let report_writer = ReportWriter::new(models.final_report.clone(), config.report.clone());

        Self {
            models,
            supervisor,
            report_writer,
            report_config: config.report.clone(),
            allow_clarification: config.research.allow_clarification,
        }
    }

    /// First stage of a run.
    pub fn initial_state(&self) -> WorkflowState {
        if self.allow_clarification {
            WorkflowState::Clarify
        } else {
            WorkflowState::Brief
        }
    }

    /// Run `query` to completion. The returned report is never empty.
    pub async fn run(&self, query: &str) -> RunResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("research_run", %run_id);

        async move {
            info!(query_chars = query.len(), "Research run started");
            let mut run = RunState::new(query);
            let mut state = self.initial_state();

            while state != WorkflowState::Done {
                let transition = self.step(state, &run).await;
                info!(from = ?state, to = ?transition.next, "Workflow transition");
                run.apply(transition.patch);
                state = transition.next;
            }

            let final_report = match run.final_report.clone() {
                Some(report) if !report.trim().is_empty() => report,
                _ => {
                    warn!("Run finished without a report, using static fallback");
                    static_fallback(
                        run.research_brief.as_deref().unwrap_or(query),
                        &run.notes.join("\n"),
                        self.report_config.fallback_excerpt_chars,
                        &report_date(),
                    )
                }
            };
            info!(chars = final_report.len(), notes = run.notes.len(), "Research run finished");
            run.into_result(final_report)
        }
        .instrument(span)
        .await
    }

    /// Execute one stage against the current state.
    pub async fn step(&self, state: WorkflowState, run: &RunState) -> Transition {
        match state {
            WorkflowState::Clarify => self.clarify(run).await,
            WorkflowState::Brief => self.brief(run).await,
            WorkflowState::Supervise => self.supervise(run).await,
            WorkflowState::Report => self.report(run).await,
            WorkflowState::Done => Transition::to(WorkflowState::Done, StatePatch::none()),
        }
    }

    async fn clarify(&self, run: &RunState) -> Transition {
        let model = &self.models.research;
        let mode = InvocationMode::<ClarifyWithUser>::select(
            model.capabilities.supports_structured_output,
            "ClarifyWithUser",
            parse_clarification,
        );
        let mut prompt = clarify_prompt(&buffer_string(&run.conversation), &today());
        if !mode.is_structured() {
            prompt.push_str(CLARIFY_FREE_TEXT_SUFFIX);
        }

        match mode
            .invoke(model.client.as_ref(), &[ConversationMessage::user(prompt)])
            .await
        {
            Ok(answer) if answer.need_clarification => {
                let question = non_blank(answer.question, DEFAULT_CLARIFYING_QUESTION);
                info!("Asking the user a clarifying question");
                Transition::to(
                    WorkflowState::Done,
                    StatePatch {
                        append_messages: vec![ConversationMessage::assistant(question.clone(), vec![])],
                        final_report: Some(question),
                        ..StatePatch::default()
                    },
                )
            }
            Ok(answer) => Transition::to(
                WorkflowState::Brief,
                StatePatch::message(ConversationMessage::assistant(
                    non_blank(answer.verification, DEFAULT_VERIFICATION),
                    vec![],
                )),
            ),
            Err(e) => {
                warn!(error = %e, "Clarification failed, continuing without it");
                Transition::to(WorkflowState::Brief, StatePatch::none())
            }
        }
    }

    async fn brief(&self, run: &RunState) -> Transition {
        let model = &self.models.research;
        let mode = InvocationMode::<ResearchQuestion>::select(
            model.capabilities.supports_structured_output,
            "ResearchQuestion",
            parse_research_brief,
        );
        let mut prompt = research_brief_prompt(&buffer_string(&run.conversation), &today());
        if !mode.is_structured() {
            prompt.push_str(BRIEF_FREE_TEXT_SUFFIX);
        }

        let brief = match mode
            .invoke(model.client.as_ref(), &[ConversationMessage::user(prompt)])
            .await
        {
            Ok(question) => non_blank(question.research_brief, DEFAULT_RESEARCH_BRIEF),
            Err(e) => {
                warn!(error = %e, "Research brief generation failed, using default brief");
                DEFAULT_RESEARCH_BRIEF.to_string()
            }
        };
        info!(brief_chars = brief.len(), "Research brief ready");

        Transition::to(
            WorkflowState::Supervise,
            StatePatch {
                research_brief: Some(brief),
                ..StatePatch::default()
            },
        )
    }

    async fn supervise(&self, run: &RunState) -> Transition {
        let brief = run.research_brief.as_deref().unwrap_or(DEFAULT_RESEARCH_BRIEF);
        let outcome = self.supervisor.run(brief).await;
        info!(
            iterations = outcome.iterations,
            notes = outcome.notes.len(),
            "Supervision complete"
        );

        Transition::to(
            WorkflowState::Report,
            StatePatch {
                notes: Some(outcome.notes),
                raw_notes: Some(outcome.raw_notes),
                ..StatePatch::default()
            },
        )
    }

    async fn report(&self, run: &RunState) -> Transition {
        let input = ReportInput {
            research_brief: run
                .research_brief
                .clone()
                .unwrap_or_else(|| DEFAULT_RESEARCH_BRIEF.to_string()),
            findings: run.notes.join("\n"),
            messages: buffer_string(&run.conversation),
        };
        let report = self.report_writer.write(&input).await;

        Transition::to(
            WorkflowState::Done,
            StatePatch {
                append_messages: vec![ConversationMessage::assistant(report.clone(), vec![])],
                final_report: Some(report),
                ..StatePatch::default()
            },
        )
    }
}

fn non_blank(text: String, default: &str) -> String {
    if text.trim().is_empty() {
        default.to_string()
    } else {
        text
    }
}

/// Build the stage models and tools from `config` and run `query`.
pub async fn run(query: &str, config: &DelveConfig) -> Result<RunResult> {
    let registry = ProviderRegistry::from_config(config);
    let models = registry.stage_models(config)?;
    let tools = Arc::new(ToolRegistry::from_config(&config.tools));
    let coordinator = ResearchCoordinator::new(models, tools, config);
    Ok(coordinator.run(query).await)
}
