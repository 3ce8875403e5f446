//! Research run data model
//!
//! Ownership follows the run's task tree: a [`ResearchTask`] belongs to one
//! researcher, the [`SupervisorContext`] to the supervisor, and the
//! [`RunState`] to the workflow controller, which is its only writer.

use crate::llm::client::ConversationMessage;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One delegated research topic and the researcher's conversation about it.
#[derive(Debug, Clone)]
pub struct ResearchTask {
    pub topic: String,
    pub conversation: Vec<ConversationMessage>,
    pub tool_iterations: u32,
}

impl ResearchTask {
    pub fn new(topic: impl Into<String>) -> Self {
        let topic = topic.into();
        Self {
            conversation: vec![ConversationMessage::user(topic.clone())],
            topic,
            tool_iterations: 0,
        }
    }
}

/// Outcome of one research task after compression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub compressed_findings: String,
    pub raw_notes: String,
}

/// Supervisor-owned state for the delegation loop.
#[derive(Debug, Clone)]
pub struct SupervisorContext {
    pub research_brief: String,
    pub conversation: Vec<ConversationMessage>,
    pub iterations: u32,
    /// Compressed findings, de-duplicated, in insertion order
    pub notes: Vec<String>,
    /// Raw notes of dispatched tasks, in dispatch order
    pub raw_notes: Vec<String>,
}

impl SupervisorContext {
    pub fn new(research_brief: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let research_brief = research_brief.into();
        Self {
            conversation: vec![
                ConversationMessage::system(system_prompt),
                ConversationMessage::user(research_brief.clone()),
            ],
            research_brief,
            iterations: 0,
            notes: Vec::new(),
            raw_notes: Vec::new(),
        }
    }

    /// Record a task's findings; blank or repeated notes are ignored.
    pub fn add_note(&mut self, note: &str) {
        if !note.trim().is_empty() && !self.notes.iter().any(|n| n == note) {
            self.notes.push(note.to_string());
        }
    }
}

/// Changes a workflow stage asks the controller to apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub append_messages: Vec<ConversationMessage>,
    pub research_brief: Option<String>,
    pub notes: Option<Vec<String>>,
    pub raw_notes: Option<Vec<String>>,
    pub final_report: Option<String>,
}

impl StatePatch {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn message(message: ConversationMessage) -> Self {
        Self {
            append_messages: vec![message],
            ..Self::default()
        }
    }
}

/// Top-level state of one run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub conversation: Vec<ConversationMessage>,
    pub research_brief: Option<String>,
    pub notes: Vec<String>,
    pub raw_notes: Vec<String>,
    pub final_report: Option<String>,
}

impl RunState {
    pub fn new(query: &str) -> Self {
        Self {
            conversation: vec![ConversationMessage::user(query)],
            ..Self::default()
        }
    }

    /// Apply a stage's patch. The final report is write-once.
    pub fn apply(&mut self, patch: StatePatch) {
        self.conversation.extend(patch.append_messages);
        if let Some(brief) = patch.research_brief {
            self.research_brief = Some(brief);
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(raw_notes) = patch.raw_notes {
            self.raw_notes = raw_notes;
        }
        if let Some(report) = patch.final_report {
            if self.final_report.is_some() {
                warn!("Ignoring second final report for this run");
            } else {
                self.final_report = Some(report);
            }
        }
    }

    pub fn into_result(self, final_report: String) -> RunResult {
        RunResult {
            final_report,
            conversation: self.conversation,
            research_brief: self.research_brief,
            notes: self.notes,
            raw_notes: self.raw_notes,
        }
    }
}

/// What a run returns. `final_report` is never empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub final_report: String,
    pub conversation: Vec<ConversationMessage>,
    pub research_brief: Option<String>,
    pub notes: Vec<String>,
    pub raw_notes: Vec<String>,
}
