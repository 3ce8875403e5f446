//! Provider Registry for building per-stage LLM clients
//!
//! The research engine uses three stage models (research, compression,
//! final report). Each references a named provider from `[providers]`; the
//! registry resolves that chain and returns a ready client together with the
//! model's resolved capabilities.
//!
//! ```rust,ignore
//! use delve::llm::ProviderRegistry;
//!
//! let registry = ProviderRegistry::from_config(&config);
//! let models = registry.stage_models(&config)?;
//! println!("research model: {}", models.research.model_name());
//! ```

use crate::llm::capabilities::ModelCapabilities;
use crate::llm::client::LLMClient;
use crate::llm::openai::OpenAIClient;
use crate::llm::retry::{RetryPolicy, RetryingClient};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{DelveConfig, ModelConfig, ProviderConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A client bound to one stage, with the capabilities that decide how it is called.
#[derive(Clone)]
pub struct StageModel {
    pub client: Arc<dyn LLMClient>,
    pub capabilities: ModelCapabilities,
}

impl StageModel {
    pub fn new(client: Arc<dyn LLMClient>, capabilities: ModelCapabilities) -> Self {
        Self {
            client,
            capabilities,
        }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Known context window in tokens.
    pub fn token_limit(&self) -> Option<u64> {
        self.capabilities.context_window
    }
}

impl std::fmt::Debug for StageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageModel")
            .field("model", &self.model_name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// The models used by each research stage.
#[derive(Debug, Clone)]
pub struct StageModels {
    /// Clarification, brief, supervisor and researcher calls
    pub research: StageModel,
    pub compression: StageModel,
    pub final_report: StageModel,
}

impl StageModels {
    /// Use one model for every stage.
    pub fn uniform(model: StageModel) -> Self {
        Self {
            research: model.clone(),
            compression: model.clone(),
            final_report: model,
        }
    }
}

/// Registry of named provider configurations
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Create a provider registry from TOML configuration
    pub fn from_config(config: &DelveConfig) -> Self {
        Self {
            providers: config.providers.clone(),
        }
    }

    /// Register a provider configuration
    pub fn register_provider(&mut self, name: &str, config: ProviderConfig) {
        self.providers.insert(name.to_string(), config);
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Create an LLM client for a model configuration
    ///
    /// This resolves the model -> provider chain; OpenAI API keys are read
    /// from the environment here.
    pub fn create_client(&self, model: &ModelConfig) -> Result<Arc<dyn LLMClient>> {
        let provider = self.providers.get(&model.provider).ok_or_else(|| {
            AppError::Configuration(format!(
                "Provider '{}' referenced by model '{}' not found",
                model.provider, model.model
            ))
        })?;

        let client = match provider {
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
            } => {
                let api_key = DelveConfig::resolve_api_key(api_key_env)?;
                OpenAIClient::new(api_base, Some(api_key), &model.model)
            }
            ProviderConfig::Ollama { base_url } => {
                let api_base = format!("{}/v1", base_url.trim_end_matches('/'));
                OpenAIClient::new(&api_base, None, &model.model)
            }
        };

        Ok(Arc::new(
            client
                .with_max_tokens(model.max_tokens)
                .with_request_timeout(Duration::from_secs(model.request_timeout_secs)),
        ))
    }

    /// Build the three stage models for a run.
    ///
    /// The research model is wrapped in a [`RetryingClient`] bounded by
    /// `max_structured_output_retries`. Compression and report generation
    /// carry their own retry ladders and use their clients directly.
    pub fn stage_models(&self, config: &DelveConfig) -> Result<StageModels> {
        let models = &config.models;

        let research_client: Arc<dyn LLMClient> = Arc::new(RetryingClient::new(
            self.create_client(&models.research)?,
            RetryPolicy::new(
                config.research.max_structured_output_retries,
                config.research.retry_backoff_ms,
            ),
        ));

        Ok(StageModels {
            research: StageModel::new(research_client, ModelCapabilities::resolve(&models.research)),
            compression: StageModel::new(
                self.create_client(&models.compression)?,
                ModelCapabilities::resolve(&models.compression),
            ),
            final_report: StageModel::new(
                self.create_client(&models.final_report)?,
                ModelCapabilities::resolve(&models.final_report),
            ),
        })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
