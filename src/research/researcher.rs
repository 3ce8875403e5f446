//! Researcher loop
//!
//! One researcher owns one [`ResearchTask`]. It alternates between asking
//! the research model for the next step and executing the requested tools,
//! then hands the finished conversation to the [`Compressor`].

use crate::llm::client::{ensure_content_validity, ConversationMessage};
use crate::llm::provider_registry::StageModel;
use crate::research::compression::Compressor;
use crate::research::prompts::{researcher_system_prompt, today};
use crate::research::state::{ResearchTask, TaskResult};
use crate::tools::signals::RESEARCH_COMPLETE;
use crate::tools::ToolRegistry;
use crate::types::Result;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct Researcher {
    model: StageModel,
    compressor: Compressor,
    tools: Arc<ToolRegistry>,
    max_react_tool_calls: u32,
}

impl Researcher {
    pub fn new(
        model: StageModel,
        compressor: Compressor,
        tools: Arc<ToolRegistry>,
        max_react_tool_calls: u32,
    ) -> Self {
        Self {
            model,
            compressor,
            tools,
            max_react_tool_calls: max_react_tool_calls.max(1),
        }
    }

    /// Research `topic` and return its compressed findings.
    ///
    /// Tool failures stay inside the conversation; only a failed model call
    /// is returned as an error.
    pub async fn run(&self, topic: &str) -> Result<TaskResult> {
        let mut task = ResearchTask::new(topic);
        let system = ConversationMessage::system(researcher_system_prompt(&today()));
        let tool_definitions = self.tools.get_tool_definitions();

        loop {
            let mut messages = Vec::with_capacity(task.conversation.len() + 1);
            messages.push(system.clone());
            messages.extend(task.conversation.iter().cloned());

            let response = self
                .model
                .client
                .generate_with_tools_and_history(&ensure_content_validity(&messages), &tool_definitions)
                .await?;

            let mut assistant = ConversationMessage::assistant(response.content, response.tool_calls.clone());
            if !assistant.has_content() {
                assistant.content = assistant.placeholder_content();
            }
            task.conversation.push(assistant);

            if response.tool_calls.is_empty() && !response.native_search_called {
                debug!(rounds = task.tool_iterations, "Researcher finished without further tool calls");
                break;
            }

            let results = self.tools.execute_all(&response.tool_calls).await;
            for (call, result) in response.tool_calls.iter().zip(results) {
                task.conversation.push(ConversationMessage::tool_result(call, result));
            }
            task.tool_iterations += 1;

            let completed = response.tool_calls.iter().any(|c| c.name == RESEARCH_COMPLETE);
            if completed || task.tool_iterations >= self.max_react_tool_calls {
                debug!(rounds = task.tool_iterations, completed, "Researcher loop finished");
                break;
            }
        }

        info!(
            rounds = task.tool_iterations,
            records = task.conversation.len(),
            "Compressing research task"
        );
        Ok(self.compressor.compress(&task.conversation).await)
    }
}
