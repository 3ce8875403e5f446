//! Integration tests for the researcher loop and findings compression
//!
//! - Tool-round bound and the completion signal
//! - Tool failures staying inside the conversation
//! - Compression retries, trimming and the sentinel result

mod common;

use common::mocks::*;
use delve::llm::client::{ConversationMessage, MessageRole};
use delve::research::{Compressor, Researcher, COMPRESSION_FAILED};
use delve::types::{AppError, ToolCall};
use serde_json::json;

fn researcher(llm: &std::sync::Arc<ScriptedLLM>, max_react: u32) -> Researcher {
    let model = stage_model(llm, plain_capabilities());
    Researcher::new(model.clone(), Compressor::new(model), offline_tools(), max_react)
}

// ============= Researcher Loop =============

#[tokio::test]
async fn test_researcher_stops_at_tool_round_budget() {
    let llm = ScriptedLLM::new(|call| match call.stage {
        Stage::Researcher => MockReply::calls(
            "Searching again.",
            vec![search(&format!("s{}", call.stage_index), &format!("query {}", call.stage_index))],
        ),
        _ => MockReply::text("compressed"),
    });

    let result = researcher(&llm, 3).run("Endless topic").await.unwrap();

    assert_eq!(llm.count(Stage::Researcher), 3);
    assert_eq!(llm.count(Stage::Compression), 1);
    assert_eq!(result.compressed_findings, "compressed");
    for i in 0..3 {
        assert!(result.raw_notes.contains(&format!("Result for query {}", i)));
    }
}

#[tokio::test]
async fn test_research_complete_ends_after_its_round() {
    let llm = ScriptedLLM::new(|call| match call.stage {
        Stage::Researcher => MockReply::calls(
            "",
            vec![search("s1", "sodium-ion density"), complete("c1")],
        ),
        _ => MockReply::text("compressed"),
    });

    let result = researcher(&llm, 10).run("Sodium-ion batteries").await.unwrap();

    assert_eq!(llm.count(Stage::Researcher), 1);
    assert!(result.raw_notes.contains("Result for sodium-ion density"));
    assert!(result.raw_notes.contains("Research marked complete."));

    // the compression call saw the full tool round
    let compression = &llm.calls_for(Stage::Compression)[0];
    let tool_records = compression
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .count();
    assert_eq!(tool_records, 2);
    assert_eq!(llm.blank_records(), 0);
}

#[tokio::test]
async fn test_no_tool_calls_goes_straight_to_compression() {
    let llm = ScriptedLLM::new(|call| match call.stage {
        Stage::Researcher => MockReply::text("I already know this."),
        _ => MockReply::text("compressed"),
    });

    let result = researcher(&llm, 10).run("Known topic").await.unwrap();

    assert_eq!(llm.count(Stage::Researcher), 1);
    assert_eq!(result.raw_notes, "I already know this.");
}

#[tokio::test]
async fn test_tool_failures_are_recorded_not_raised() {
    let llm = ScriptedLLM::new(|call| match call.stage {
        Stage::Researcher if call.stage_index == 0 => MockReply::calls(
            "",
            vec![
                ToolCall::new("bad", "web_search", json!({})),
                ToolCall::new("missing", "no_such_tool", json!({})),
                search("good", "tides"),
            ],
        ),
        Stage::Researcher => MockReply::text("Done."),
        _ => MockReply::text("compressed"),
    });

    let result = researcher(&llm, 5).run("Tides").await.unwrap();

    let second = &llm.calls_for(Stage::Researcher)[1];
    let tools: Vec<&ConversationMessage> = second
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .collect();
    assert_eq!(tools.len(), 3);
    assert!(tools[0].content.starts_with("Error executing tool: Invalid input"));
    assert!(tools[1].content.starts_with("Error executing tool: Not found"));
    assert_eq!(tools[2].content, "Result for tides");
    assert_eq!(result.compressed_findings, "compressed");
}

#[tokio::test]
async fn test_gateway_failure_propagates() {
    let llm = ScriptedLLM::new(|_| MockReply::error(AppError::LLM("rate limited".into())));

    let err = researcher(&llm, 5).run("Anything").await.unwrap_err();

    assert!(matches!(err, AppError::LLM(_)));
    assert_eq!(llm.count(Stage::Compression), 0);
}

// ============= Compression =============

fn finished_conversation() -> Vec<ConversationMessage> {
    let call = search("s1", "tides");
    vec![
        ConversationMessage::user("Tidal energy"),
        ConversationMessage::assistant("Searching.", vec![call.clone()]),
        ConversationMessage::tool_result(&call, "Result for tides"),
        ConversationMessage::assistant("Costs fell.", vec![]),
    ]
}

#[tokio::test]
async fn test_compression_overflow_trims_then_gives_up() {
    let llm = ScriptedLLM::new(|_| MockReply::error(context_overflow("scripted-model")));
    let compressor = Compressor::new(stage_model(&llm, plain_capabilities()));

    let result = compressor.compress(&finished_conversation()).await;

    assert_eq!(result.compressed_findings, COMPRESSION_FAILED);
    assert_eq!(result.raw_notes, "Searching.\nResult for tides\nCosts fell.");

    let sizes: Vec<usize> = llm
        .calls_for(Stage::Compression)
        .iter()
        .map(|c| c.messages.len())
        .collect();
    // system + conversation + instruction, trimmed at the last assistant turn each time
    assert_eq!(sizes, vec![6, 5, 3]);
}

#[tokio::test]
async fn test_compression_retries_other_errors_unchanged() {
    let llm = ScriptedLLM::new(|call| {
        if call.stage_index < 2 {
            MockReply::error(AppError::LLM("overloaded".into()))
        } else {
            MockReply::text("clean findings")
        }
    });
    let compressor = Compressor::new(stage_model(&llm, plain_capabilities()));

    let result = compressor.compress(&finished_conversation()).await;

    assert_eq!(result.compressed_findings, "clean findings");
    let sizes: Vec<usize> = llm.calls().iter().map(|c| c.messages.len()).collect();
    assert_eq!(sizes, vec![6, 6, 6]);
}

#[tokio::test]
async fn test_compression_without_assistant_turn_still_trims() {
    let llm = ScriptedLLM::new(|_| MockReply::error(context_overflow("scripted-model")));
    let compressor = Compressor::new(stage_model(&llm, plain_capabilities()));
    let conversation = vec![
        ConversationMessage::user("first"),
        ConversationMessage::user("second"),
    ];

    let result = compressor.compress(&conversation).await;

    assert_eq!(result.compressed_findings, COMPRESSION_FAILED);
    assert_eq!(result.raw_notes, "");
    let sizes: Vec<usize> = llm.calls().iter().map(|c| c.messages.len()).collect();
    assert_eq!(sizes, vec![4, 3, 2]);
}
