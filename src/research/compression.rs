//! Findings compression
//!
//! Turns a finished researcher conversation into condensed findings plus the
//! raw notes it was built from. Compression never fails: after the attempt
//! cap it returns a sentinel finding instead.

use crate::llm::capabilities::is_token_limit_exceeded;
use crate::llm::client::{ensure_content_validity, ConversationMessage, MessageRole};
use crate::llm::provider_registry::StageModel;
use crate::research::prompts::{compression_system_prompt, today, COMPRESSION_INSTRUCTION};
use crate::research::state::TaskResult;
use tracing::{debug, warn};

/// Findings returned when every compression attempt failed.
pub const COMPRESSION_FAILED: &str = "Error synthesizing research report: Maximum retries exceeded";

/// Attempts per compression.
pub const MAX_COMPRESSION_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug)]
pub struct Compressor {
    model: StageModel,
    max_attempts: u32,
}

impl Compressor {
    pub fn new(model: StageModel) -> Self {
        Self {
            model,
            max_attempts: MAX_COMPRESSION_ATTEMPTS,
        }
    }

    /// Compress one researcher conversation.
    pub async fn compress(&self, conversation: &[ConversationMessage]) -> TaskResult {
        let raw_notes = raw_notes(conversation);
        let system = ConversationMessage::system(compression_system_prompt(&today()));
        let mut working = conversation.to_vec();

        for attempt in 1..=self.max_attempts {
            let mut messages = Vec::with_capacity(working.len() + 2);
            messages.push(system.clone());
            messages.extend(working.iter().cloned());
            messages.push(ConversationMessage::user(COMPRESSION_INSTRUCTION));

            match self
                .model
                .client
                .generate_with_history(&ensure_content_validity(&messages))
                .await
            {
                Ok(response) => {
                    debug!(attempt, chars = response.content.len(), "Compressed research findings");
                    return TaskResult {
                        compressed_findings: response.content,
                        raw_notes,
                    };
                }
                Err(e) if is_token_limit_exceeded(&e, self.model.model_name()) => {
                    let before = working.len();
                    drop_last_assistant_segment(&mut working);
                    warn!(
                        attempt,
                        dropped = before - working.len(),
                        "Compression exceeded context window, trimming conversation"
                    );
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Compression attempt failed");
                }
            }
        }

        TaskResult {
            compressed_findings: COMPRESSION_FAILED.to_string(),
            raw_notes,
        }
    }
}

/// Tool and assistant contents in conversation order.
pub fn raw_notes(conversation: &[ConversationMessage]) -> String {
    conversation
        .iter()
        .filter(|m| matches!(m.role, MessageRole::Tool | MessageRole::Assistant))
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove the most recent assistant turn and everything after it.
///
/// Without an assistant turn the oldest record goes instead, so every
/// overflow makes progress.
fn drop_last_assistant_segment(working: &mut Vec<ConversationMessage>) {
    match working.iter().rposition(|m| m.role == MessageRole::Assistant) {
        Some(index) => working.truncate(index),
        None if !working.is_empty() => {
            working.remove(0);
        }
        None => {}
    }
}
