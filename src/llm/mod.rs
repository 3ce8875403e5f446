//! LLM Provider Clients and Abstractions
//!
//! This module provides the invocation gateway the research stages call
//! through. Provider-specific wire formats stay behind the [`LLMClient`] trait,
//! so stages run unchanged against any provider or a scripted fake.
//!
//! # Architecture
//!
//! - [`LLMClient`] - The core trait that all providers implement
//! - [`InvocationMode`] - Structured vs. free-text calls, chosen by capability
//! - [`RetryingClient`] - Bounded retry with backoff around any client
//! - [`ProviderRegistry`] - Builds per-stage clients from `delve.toml`
//!
//! # Example
//!
//! ```ignore
//! use delve::llm::{LLMClient, ProviderRegistry};
//!
//! let registry = ProviderRegistry::from_config(&config);
//! let models = registry.stage_models(&config)?;
//! let answer = models.research.client.generate("What is 2+2?").await?;
//! ```

/// Model capability flags, token limits and the context-length predicate.
pub mod capabilities;
/// Core LLM client trait, conversation records and content validity.
pub mod client;
/// OpenAI-compatible chat-completions client.
pub mod openai;
/// Per-stage client construction from configuration.
pub mod provider_registry;
/// Retrying client wrapper.
pub mod retry;
/// Structured-output and free-text invocation modes.
pub mod structured;

pub use capabilities::{is_token_limit_exceeded, model_token_limit, ModelCapabilities};
pub use client::{ConversationMessage, LLMClient, LLMResponse, LLMStream, MessageRole};
pub use provider_registry::{ProviderRegistry, StageModel, StageModels};
pub use retry::{RetryPolicy, RetryingClient};
pub use structured::{InvocationMode, OutputSchema};
