//! Tool Execution Layer
//!
//! Resolves named invocation requests to tools and runs them with per-call
//! error isolation.
//!
//! # Module Structure
//!
//! - [`registry`](crate::tools::registry) - Tool trait, registration and safe concurrent execution
//! - [`search`](crate::tools::search) - Web search and page fetch (DuckDuckGo via daedra)
//! - [`think`](crate::tools::think) - Reflection tool
//! - [`signals`](crate::tools::signals) - Delegation and completion signals
//!
//! # Tool Registry
//!
//! ```ignore
//! let registry = ToolRegistry::from_config(&config.tools);
//! let tools = registry.get_tool_definitions();
//! let text = registry.execute_safely("web_search", json!({"query": "tides"})).await;
//! ```

/// Tool registry for managing available tools.
pub mod registry;
/// Web search and page fetch tools.
pub mod search;
/// Delegation and completion signal schemas.
pub mod signals;
/// Reflection tool.
pub mod think;

pub use registry::{list_tools, Tool, ToolRegistry};
