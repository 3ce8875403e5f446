//! Request scoping: clarification and research brief
//!
//! Both answers are typed. Models with structured-output support return them
//! directly; for the rest, the free-text parsers below recover them from
//! prose.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CLARIFYING_QUESTION: &str =
    "Could you provide more details about what you'd like me to research?";
pub const DEFAULT_VERIFICATION: &str =
    "I understand your request and will proceed with the research.";
pub const DEFAULT_RESEARCH_BRIEF: &str =
    "Research the user's query comprehensively using available sources.";

const CLARIFICATION_INDICATORS: &[&str] = &[
    "need clarification",
    "unclear",
    "ambiguous",
    "could you clarify",
    "more specific",
    "what exactly",
    "which aspect",
    "need more information",
];

const BRIEF_MARKER: &str = "research brief:";

/// Whether to ask the user a clarifying question before research.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClarifyWithUser {
    /// Whether the user needs to be asked a clarifying question
    pub need_clarification: bool,
    /// A question to ask the user to clarify the report scope
    pub question: String,
    /// Message confirming that research will start once the user has provided the needed information
    pub verification: String,
}

/// The research brief that guides the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchQuestion {
    /// A research question that will be used to guide the research
    pub research_brief: String,
}

/// First sentence of `text` that ends in a question mark.
fn first_question(text: &str) -> Option<String> {
    let end = text.find('?')?;
    let start = text[..end]
        .rfind(['.', '!', '?'])
        .map(|i| i + 1)
        .unwrap_or(0);
    let question = text[start..=end].trim();
    (question.len() > 1).then(|| question.to_string())
}

/// Recover a clarification decision from a free-text answer.
pub fn parse_clarification(text: &str) -> ClarifyWithUser {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ClarifyWithUser {
            need_clarification: false,
            question: DEFAULT_CLARIFYING_QUESTION.to_string(),
            verification: DEFAULT_VERIFICATION.to_string(),
        };
    }

    let lower = trimmed.to_lowercase();
    let need_clarification = CLARIFICATION_INDICATORS
        .iter()
        .any(|phrase| lower.contains(phrase));

    ClarifyWithUser {
        need_clarification,
        question: first_question(trimmed).unwrap_or_else(|| DEFAULT_CLARIFYING_QUESTION.to_string()),
        verification: if need_clarification {
            DEFAULT_VERIFICATION.to_string()
        } else {
            trimmed.to_string()
        },
    }
}

/// Byte offset just past a case-insensitive `research brief:` marker.
fn after_brief_marker(text: &str) -> Option<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .find(|&i| {
            text.get(i..i + BRIEF_MARKER.len())
                .is_some_and(|s| s.eq_ignore_ascii_case(BRIEF_MARKER))
        })
        .map(|i| i + BRIEF_MARKER.len())
}

/// Recover a research brief from a free-text answer.
pub fn parse_research_brief(text: &str) -> ResearchQuestion {
    let mut brief = text.trim();
    if let Some(offset) = after_brief_marker(brief) {
        brief = brief[offset..].trim();
    }
    ResearchQuestion {
        research_brief: if brief.is_empty() {
            DEFAULT_RESEARCH_BRIEF.to_string()
        } else {
            brief.to_string()
        },
    }
}
