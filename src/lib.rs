//! # delve - deep research orchestration engine
//!
//! delve turns a question into a research brief, delegates research topics to
//! bounded-concurrency researcher agents, compresses their findings and
//! synthesizes a final report. Every stage converts upstream failures into
//! values, so a run always ends with a non-empty report.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use delve::research;
//! use delve::utils::toml_config::DelveConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DelveConfig::load("delve.toml")?;
//!     let result = research::run("What limits sodium-ion battery adoption?", &config).await?;
//!     println!("{}", result.final_report);
//!     Ok(())
//! }
//! ```
//!
//! ### Custom models and tools
//!
//! ```rust,ignore
//! use delve::llm::{ProviderRegistry, StageModels};
//! use delve::research::ResearchCoordinator;
//! use delve::tools::ToolRegistry;
//! use std::sync::Arc;
//!
//! let models = ProviderRegistry::from_config(&config).stage_models(&config)?;
//! let mut tools = ToolRegistry::from_config(&config.tools);
//! tools.register(Arc::new(MyInternalSearch));
//!
//! let coordinator = ResearchCoordinator::new(models, Arc::new(tools), &config);
//! let result = coordinator.run("...").await;
//! ```
//!
//! ## Modules
//!
//! - [`llm`] - Invocation gateway: client trait, OpenAI-compatible client, retries, capabilities
//! - [`tools`] - Tool registry, web search, reflection and control signals
//! - [`research`] - Workflow controller, supervisor, researchers, compression, report ladder
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration
//! - [`cli`] - Command-line interface

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line parsing and terminal output.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Multi-agent research orchestration.
pub mod research;
/// Researcher tools (web search, page fetch, reflection).
pub mod tools;
/// Core types (tool calls, errors).
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, LLMResponse, ProviderRegistry};
pub use research::{run, ResearchCoordinator, RunResult};
pub use tools::registry::ToolRegistry;
pub use types::{AppError, Result};
pub use utils::toml_config::DelveConfig;
