//! Web search and page fetching via daedra
//!
//! Both tools return plain text so their output can be recorded directly as
//! tool content in a researcher's conversation.

use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Longest page body returned to a researcher, in characters.
const MAX_PAGE_CHARS: usize = 12_000;

/// Web search tool powered by daedra (DuckDuckGo backend)
pub struct SearchTool {
    max_results: usize,
}

impl SearchTool {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results: max_results.max(1),
        }
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Format search hits as a numbered source list.
fn format_results(query: &str, results: &[(String, String, String)]) -> String {
    if results.is_empty() {
        return format!("No search results found for '{}'.", query);
    }
    let mut out = format!("Search results for '{}':\n", query);
    for (i, (title, url, description)) in results.iter().enumerate() {
        out.push_str(&format!("\n--- SOURCE {}: {} ---\nURL: {}\n\n{}\n", i + 1, title, url, description));
    }
    out
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns titles, URLs and snippets of the top results."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": format!("Maximum number of results to return (default: {})", self.max_results)
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("Missing 'query' parameter".to_string()))?;

        let num_results = args
            .get("num_results")
            .and_then(|v| v.as_u64())
            .map(|n| (n as usize).clamp(1, self.max_results))
            .unwrap_or(self.max_results);

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::Tool(format!("Search failed: {}", e)))?;

        let results: Vec<(String, String, String)> = response
            .data
            .iter()
            .take(num_results)
            .map(|r| (r.title.to_string(), r.url.to_string(), r.description.to_string()))
            .collect();

        Ok(Value::String(format_results(query, &results)))
    }
}

/// Page fetching tool powered by daedra
pub struct FetchPageTool;

impl FetchPageTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FetchPageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchPageTool {
    fn name(&self) -> &str {
        "fetch_page"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its main content as markdown"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL of the page to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidInput("Missing 'url' parameter".to_string()))?;

        let fetch_args = daedra::VisitPageArgs {
            url: url.to_string(),
            include_images: false,
            selector: None,
        };

        let page = daedra::tools::fetch::fetch_page(&fetch_args)
            .await
            .map_err(|e| AppError::Tool(format!("Failed to fetch page: {}", e)))?;

        let content: String = page.content.chars().take(MAX_PAGE_CHARS).collect();
        Ok(Value::String(format!("URL: {}\n\n{}", url, content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_tool_definition() {
        let tool = SearchTool::new(3);
        assert_eq!(tool.name(), "web_search");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"][0], "query");
        assert!(schema["properties"]["num_results"]["description"]
            .as_str()
            .unwrap()
            .contains("default: 3"));
    }

    #[test]
    fn test_fetch_page_tool_definition() {
        let tool = FetchPageTool::new();
        assert_eq!(tool.name(), "fetch_page");
        assert_eq!(tool.parameters_schema()["required"][0], "url");
    }

    #[test]
    fn test_format_results() {
        let results = vec![(
            "Tide tables".to_string(),
            "https://example.org/tides".to_string(),
            "Daily tide predictions".to_string(),
        )];
        let text = format_results("tides", &results);
        assert!(text.starts_with("Search results for 'tides':"));
        assert!(text.contains("--- SOURCE 1: Tide tables ---"));
        assert!(text.contains("URL: https://example.org/tides"));

        assert_eq!(format_results("nothing", &[]), "No search results found for 'nothing'.");
    }

    #[tokio::test]
    async fn test_search_missing_query() {
        let tool = SearchTool::default();
        assert!(tool.execute(json!({})).await.is_err());
        assert!(tool.execute(json!({"query": "  "})).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_page_missing_url() {
        let tool = FetchPageTool::new();
        assert!(tool.execute(json!({})).await.is_err());
    }
}
