//! Prompt templates for each research stage.

use chrono::Local;

/// Today's date as given to models, e.g. "Mon Mar 3, 2025".
pub fn today() -> String {
    Local::now().format("%a %b %-d, %Y").to_string()
}

/// Report date, e.g. "March 03, 2025".
pub fn report_date() -> String {
    Local::now().format("%B %d, %Y").to_string()
}

pub fn clarify_prompt(messages: &str, date: &str) -> String {
    format!(
        r#"These are the messages exchanged so far with the user asking for a report:
<Messages>
{messages}
</Messages>

Today's date is {date}.

Decide whether you need to ask the user one clarifying question before starting research, or whether the request is clear enough to proceed.
Ask only when the request contains an undefined acronym, an ambiguous term or a scope that cannot reasonably be inferred. Do not ask again if a clarifying question already appears in the messages.

If you ask, keep the question short and gather everything you need in one go.
If you do not ask, write a brief verification message confirming that you understand the request and will start research now."#
    )
}

/// Appended in free-text mode so the answer can be parsed heuristically.
pub const CLARIFY_FREE_TEXT_SUFFIX: &str = "\n\nPlease respond with either:\n1. A clarifying question if the request is unclear or ambiguous\n2. A confirmation that you understand and will proceed with research";

pub fn research_brief_prompt(messages: &str, date: &str) -> String {
    format!(
        r#"You will be given the messages exchanged with a user. Translate them into a detailed, concrete research brief that will guide the research.

<Messages>
{messages}
</Messages>

Today's date is {date}.

Guidelines:
- Include every detail and preference the user stated.
- Mark dimensions the user left open as open rather than inventing constraints.
- Phrase the brief in the first person, from the user's perspective.
- Name preferred source types if the user indicated any."#
    )
}

/// Appended in free-text mode.
pub const BRIEF_FREE_TEXT_SUFFIX: &str =
    "\n\nPlease provide a clear, focused research brief that summarizes what needs to be researched.";

pub fn supervisor_system_prompt(date: &str, max_concurrent: usize, max_iterations: u32) -> String {
    format!(
        r#"You are a research supervisor. Your job is to conduct research by delegating topics to researchers with the "ConductResearch" tool. Today's date is {date}.

<Tools>
1. ConductResearch: delegate one research topic to a researcher
2. ResearchComplete: signal that the findings are sufficient
3. think_tool: reflect on progress and plan the next step
</Tools>

<Instructions>
- Start by reading the research brief and deciding how to split it.
- Use think_tool before calling ConductResearch to plan, and after each round to assess results.
- Delegate only independent topics in parallel. Each topic must be self-contained and described in full detail.
- Call ResearchComplete as soon as you can answer the brief confidently.
</Instructions>

<Hard Limits>
- Run at most {max_concurrent} ConductResearch calls in one response.
- Stop after {max_iterations} rounds of delegation even if gaps remain.
- Bias toward a single researcher unless the brief clearly has independent parts.
</Hard Limits>"#
    )
}

pub fn researcher_system_prompt(date: &str) -> String {
    format!(
        r#"You are a research assistant investigating one topic. Use the tools available to gather information about it. Today's date is {date}.

<Instructions>
1. Read the topic carefully.
2. Start with broad searches, then narrow down.
3. After each search, use think_tool to assess what you found and what is still missing.
4. Call ResearchComplete once you can answer the topic well.
</Instructions>

<Hard Limits>
- Simple topics: 2-3 searches. Complex topics: up to 5 searches.
- Stop when the last two searches returned mostly the same information."#
    )
}

pub fn compression_system_prompt(date: &str) -> String {
    format!(
        r#"You are a research assistant that has gathered information by calling tools and searching the web. Clean up those findings while preserving every relevant statement and source. Today's date is {date}.

<Task>
Produce a cleaned-up version of the information from the tool calls and searches. Keep all relevant information verbatim where possible, remove duplicates and irrelevant material, and cite sources inline.
</Task>

<Output Format>
**List of Queries and Tool Calls Made**
**Fully Comprehensive Findings**
**List of All Relevant Sources (with citations in the report)**
</Output Format>

<Citation Rules>
- Assign each unique URL a single citation number in your text.
- End with ### Sources listing each source with its number.
- Number sources sequentially without gaps (1, 2, 3, 4...).
</Citation Rules>"#
    )
}

/// Instruction appended to a researcher conversation before compression.
pub const COMPRESSION_INSTRUCTION: &str = "All above messages are about research conducted by an AI Researcher. Please clean up these findings.\n\nDO NOT summarize the information. I want the raw information returned, just in a cleaner format. Make sure all relevant information is preserved - you can rewrite findings verbatim.";

pub fn streaming_report_prompt(brief: &str, findings: &str, messages: &str, date: &str) -> String {
    format!(
        r#"Generate a comprehensive research report based on the following information:

Research Brief: {brief}

Research Findings: {findings}

User Context: {messages}

Date: {date}

Please generate a well-structured research report with the following sections:
1. Executive Summary (2-3 paragraphs)
2. Key Findings (3-5 bullet points)
3. Detailed Analysis (with subheadings)
4. Methodology and Sources

Format the report in markdown with clear headings. Focus on actionable insights and specific findings from the research data."#
    )
}

pub fn summary_section_prompt(brief: &str, findings: &str, date: &str) -> String {
    format!(
        "Based on this research brief: {brief}\n\nAnd these key findings: {findings}\n\nWrite a concise executive summary (2-3 paragraphs) for a research report. Focus on the most important findings and conclusions. Date: {date}"
    )
}

pub fn key_findings_section_prompt(findings: &str) -> String {
    format!(
        "Based on these research findings: {findings}\n\nCreate a \"Key Findings\" section with 3-5 bullet points highlighting the most important discoveries. Be specific and actionable. Each bullet should be 1-2 sentences."
    )
}

pub fn analysis_section_prompt(brief: &str, findings: &str) -> String {
    format!(
        "Research Brief: {brief}\n\nResearch Data: {findings}\n\nCreate a detailed analysis section covering the main aspects discovered in the research. Structure with subheadings and provide specific insights. Limit to 500 words."
    )
}

pub fn final_report_prompt(brief: &str, messages: &str, findings: &str, date: &str) -> String {
    format!(
        r#"Based on all the research conducted, create a comprehensive, well-structured answer to the overall research brief:
<Research Brief>
{brief}
</Research Brief>

For more context, here are all of the messages so far:
<Messages>
{messages}
</Messages>

Today's date is {date}.

Here are the findings from the research that you conducted:
<Findings>
{findings}
</Findings>

Write a detailed report that:
1. Is organized with proper headings (# for title, ## for sections, ### for subsections)
2. Includes specific facts and insights from the research
3. References sources using [Title](URL) format
4. Ends with a `### Sources` section listing every referenced link

Write in the same language as the user's messages."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_prompt_names_limits() {
        let prompt = supervisor_system_prompt("Mon Mar 3, 2025", 4, 2);
        assert!(prompt.contains("at most 4 ConductResearch calls"));
        assert!(prompt.contains("after 2 rounds"));
    }

    #[test]
    fn test_final_report_prompt_embeds_inputs() {
        let prompt = final_report_prompt("BRIEF", "MSGS", "FINDINGS", "DATE");
        for part in ["BRIEF", "MSGS", "FINDINGS", "DATE"] {
            assert!(prompt.contains(part));
        }
        assert!(prompt.starts_with("Based on all the research conducted"));
        assert!(prompt.contains("Ends with a `### Sources` section"));
        assert!(prompt.ends_with("Write in the same language as the user's messages."));
    }
}
