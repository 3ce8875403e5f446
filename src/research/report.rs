//! Report synthesis ladder
//!
//! The final report is produced by the first tier that succeeds:
//!
//! 1. **Streaming**: one streamed four-section report, when the model streams
//! 2. **Progressive**: summary, key findings and analysis as separate timed
//!    calls; a timeout yields a partial report built from finished sections
//! 3. **Single-shot**: one timed call over all findings, truncating them on
//!    context overflow
//! 4. **Static fallback**: a templated report carrying a findings excerpt
//!
//! [`ReportWriter::write`] never returns an empty report.

use crate::llm::capabilities::is_token_limit_exceeded;
use crate::llm::client::ConversationMessage;
use crate::llm::provider_registry::StageModel;
use crate::research::prompts::{
    analysis_section_prompt, final_report_prompt, key_findings_section_prompt, report_date,
    streaming_report_prompt, summary_section_prompt, today,
};
use crate::types::{AppError, Result};
use crate::utils::toml_config::ReportConfig;
use futures::StreamExt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn, Instrument};

const STREAMING_FINDINGS_CHARS: usize = 15_000;
const STREAMING_CONTEXT_CHARS: usize = 2_000;

const NO_FINDINGS: &str = "No detailed findings were collected during the research process.";

const METHODOLOGY: &str = "This report was produced by a supervisor that split the research brief into focused topics, delegated each topic to a researcher with web search and reflection tools, and compressed every researcher's findings before synthesis.";

/// Inputs shared by every tier.
#[derive(Debug, Clone, Default)]
pub struct ReportInput {
    pub research_brief: String,
    /// Aggregated notes joined into one text
    pub findings: String,
    /// The user conversation as a transcript
    pub messages: String,
}

/// Prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn header(date: &str, brief: &str) -> String {
    format!("# Research Report - {}\n\n## Research Query\n{}\n\n", date, brief)
}

/// The deterministic last-resort report.
pub fn static_fallback(brief: &str, findings: &str, excerpt_chars: usize, date: &str) -> String {
    let excerpt = if findings.trim().is_empty() {
        NO_FINDINGS.to_string()
    } else {
        let cut = truncate_chars(findings, excerpt_chars);
        if cut.len() < findings.len() {
            format!("{}...", cut)
        } else {
            cut.to_string()
        }
    };

    format!(
        "{header}## Executive Summary\n\
         The research phase completed, but the final synthesis could not be generated in time. \
         The findings collected during research are presented below without further analysis.\n\n\
         ## Key Findings\n{excerpt}\n\n\
         ## Research Methodology\n{METHODOLOGY}\n\n\
         ## Notes\n\
         Automatic report synthesis failed or timed out, so this report was assembled from a template. \
         Running the query again with a smaller research mode or a model with a larger context window \
         usually produces a fully synthesized report.\n\n\
         ---\n\n\
         *Report generated on {date} from unsynthesized research findings.*",
        header = header(date, brief),
    )
}

/// How one progressive section ended.
enum SectionError {
    TimedOut,
    Failed(AppError),
}

#[derive(Clone)]
pub struct ReportWriter {
    model: StageModel,
    config: ReportConfig,
}

impl ReportWriter {
    pub fn new(model: StageModel, config: ReportConfig) -> Self {
        Self { model, config }
    }

    /// Produce the final report.
    ///
    /// The ladder runs in its own task; a panic or an empty result is
    /// replaced by the static fallback.
    pub async fn write(&self, input: &ReportInput) -> String {
        let writer = self.clone();
        let task_input = input.clone();
        let handle = tokio::spawn(
            async move { writer.generate(&task_input).await }.in_current_span(),
        );

        let report = match handle.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Report synthesis task failed");
                String::new()
            }
        };

        if report.trim().is_empty() {
            warn!(tier = "static", "Using static fallback report");
            self.fallback(input, &report_date())
        } else {
            report
        }
    }

    /// Run the tiers in order and return the first report produced.
    pub async fn generate(&self, input: &ReportInput) -> String {
        let date = report_date();

        match self.streaming(input, &date).await {
            Ok(report) => {
                info!(tier = "streaming", chars = report.len(), "Final report generated");
                return report;
            }
            Err(e) => warn!(tier = "streaming", error = %e, "Report tier failed"),
        }

        match self.progressive(input, &date).await {
            Ok(report) => {
                info!(tier = "progressive", chars = report.len(), "Final report generated");
                return report;
            }
            Err(e) => warn!(tier = "progressive", error = %e, "Report tier failed"),
        }

        self.single_shot(input, &date).await
    }

    fn fallback(&self, input: &ReportInput, date: &str) -> String {
        static_fallback(
            &input.research_brief,
            &input.findings,
            self.config.fallback_excerpt_chars,
            date,
        )
    }

    async fn streaming(&self, input: &ReportInput, date: &str) -> Result<String> {
        if !self.model.capabilities.supports_streaming {
            return Err(AppError::Unsupported(format!(
                "model '{}' is not a streaming endpoint",
                self.model.model_name()
            )));
        }

        let prompt = streaming_report_prompt(
            &input.research_brief,
            truncate_chars(&input.findings, STREAMING_FINDINGS_CHARS),
            truncate_chars(&input.messages, STREAMING_CONTEXT_CHARS),
            date,
        );

        let collect = async {
            let mut stream = self
                .model
                .client
                .stream_with_history(&[ConversationMessage::user(prompt)])
                .await?;
            let mut body = String::new();
            while let Some(chunk) = stream.next().await {
                body.push_str(&chunk?);
            }
            Ok::<String, AppError>(body)
        };

        let limit = Duration::from_secs(self.config.single_shot_timeout_secs);
        let body = timeout(limit, collect)
            .await
            .map_err(|_| AppError::Timeout("streaming report".to_string()))??;

        if body.trim().is_empty() {
            return Err(AppError::LLM("streaming report was empty".to_string()));
        }

        Ok(format!(
            "{}{}\n\n---\n\n*Report generated on {} using streaming synthesis.*",
            header(date, &input.research_brief),
            body.trim(),
            date
        ))
    }

    async fn section(&self, prompt: String, secs: u64) -> std::result::Result<String, SectionError> {
        match timeout(Duration::from_secs(secs), self.model.client.generate(&prompt)).await {
            Err(_) => Err(SectionError::TimedOut),
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) if e.is_timeout() => Err(SectionError::TimedOut),
            Ok(Err(e)) => Err(SectionError::Failed(e)),
        }
    }

    async fn progressive(&self, input: &ReportInput, date: &str) -> Result<String> {
        let cfg = &self.config;
        let brief = &input.research_brief;
        let findings = &input.findings;

        let plan: [(&str, String, u64); 3] = [
            (
                "Executive Summary",
                summary_section_prompt(brief, truncate_chars(findings, cfg.summary_findings_chars), date),
                cfg.summary_timeout_secs,
            ),
            (
                "Key Findings",
                key_findings_section_prompt(truncate_chars(findings, cfg.key_findings_chars)),
                cfg.key_findings_timeout_secs,
            ),
            (
                "Detailed Analysis",
                analysis_section_prompt(brief, truncate_chars(findings, cfg.analysis_findings_chars)),
                cfg.analysis_timeout_secs,
            ),
        ];

        let mut sections: Vec<(&str, String)> = Vec::with_capacity(plan.len());
        for (title, prompt, secs) in plan {
            match self.section(prompt, secs).await {
                Ok(text) => sections.push((title, text)),
                Err(SectionError::TimedOut) => {
                    warn!(tier = "progressive", section = title, completed = sections.len(), "Section timed out, returning partial report");
                    return Ok(self.partial(input, &sections, date));
                }
                Err(SectionError::Failed(e)) => return Err(e),
            }
        }

        let mut report = header(date, brief);
        for (title, text) in &sections {
            report.push_str(&format!("## {}\n{}\n\n", title, text.trim()));
        }
        report.push_str(&format!("## Research Methodology\n{}\n\n", METHODOLOGY));
        report.push_str(&format!(
            "---\n\n*Report generated on {} using progressive synthesis.*",
            date
        ));
        Ok(report)
    }

    fn partial(&self, input: &ReportInput, sections: &[(&str, String)], date: &str) -> String {
        let mut report = header(date, &input.research_brief);
        for (title, text) in sections {
            report.push_str(&format!("## {}\n{}\n\n", title, text.trim()));
        }
        report.push_str(&format!(
            "## Research Notes\n{}\n\n",
            truncate_chars(&input.findings, self.config.partial_notes_chars)
        ));
        report.push_str(&format!(
            "---\n\n*Partial report generated on {}. Section generation timed out; the remaining sections were not generated.*",
            date
        ));
        report
    }

    async fn single_shot(&self, input: &ReportInput, date: &str) -> String {
        let model = self.model.model_name();
        let limit = Duration::from_secs(self.config.single_shot_timeout_secs);
        let max_retries = self.config.max_truncation_retries;
        let mut findings = input.findings.clone();
        let mut budget: Option<usize> = None;
        let mut retries = 0u32;

        loop {
            let prompt = final_report_prompt(&input.research_brief, &input.messages, &findings, &today());

            let e = match timeout(limit, self.model.client.generate(&prompt)).await {
                Err(_) => {
                    warn!(tier = "single_shot", "Report call timed out, using static fallback");
                    return self.fallback(input, date);
                }
                Ok(Ok(report)) if report.trim().is_empty() => {
                    warn!(tier = "single_shot", "Report call returned nothing, using static fallback");
                    return self.fallback(input, date);
                }
                Ok(Ok(report)) => {
                    info!(tier = "single_shot", retries, chars = report.len(), "Final report generated");
                    return report;
                }
                Ok(Err(e)) => e,
            };

            if !is_token_limit_exceeded(&e, model) {
                if e.is_timeout() {
                    warn!(tier = "single_shot", error = %e, "Report call timed out upstream, using static fallback");
                    return self.fallback(input, date);
                }
                error!(tier = "single_shot", error = %e, "Report generation failed");
                return format!("Error generating final report: {}: {}", e.kind(), e);
            }

            if retries >= max_retries {
                error!(tier = "single_shot", retries, "Report still exceeds the context window");
                return format!(
                    "Error generating final report: Maximum retries ({}) exceeded due to token limits",
                    max_retries
                );
            }

            let Some(token_limit) = self.model.token_limit() else {
                error!(tier = "single_shot", model, "No known token limit for model");
                return format!(
                    "Error generating final report: Token limit exceeded, however, we could not determine the model's maximum context length. {}",
                    e
                );
            };

            let next = next_findings_budget(budget, token_limit);
            budget = Some(next);
            findings = truncate_chars(&findings, next).to_string();
            retries += 1;
            warn!(tier = "single_shot", retry = retries, budget = next, "Report exceeded context window, truncating findings");
        }
    }
}

/// Character budget for the next truncation retry: four characters per
/// context token at first, then 90% of the previous budget, rounded down.
fn next_findings_budget(current: Option<usize>, token_limit: u64) -> usize {
    match current {
        None => usize::try_from(token_limit.saturating_mul(4)).unwrap_or(usize::MAX),
        Some(current) => current.saturating_mul(9) / 10,
    }
}
