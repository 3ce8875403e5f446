//! TOML-based configuration for delve
//!
//! This module provides declarative configuration for the research limits,
//! providers, per-stage models, tools, the report ladder and logging via a
//! TOML file (`delve.toml`).
//!
//! The loaded [`DelveConfig`] is an ordinary value: it is passed explicitly
//! to every stage and never stored in process-global state.

use crate::types::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "delve.toml";

/// Root configuration structure loaded from delve.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelveConfig {
    #[serde(default)]
    pub research: ResearchConfig,

    /// Named LLM provider configurations
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,

    /// Models used by each research stage
    #[serde(default)]
    pub models: StageModelsConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DelveConfig {
    fn default() -> Self {
        Self {
            research: ResearchConfig::default(),
            providers: default_providers(),
            models: StageModelsConfig::default(),
            tools: ToolsConfig::default(),
            report: ReportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ============= Research Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Ask the user a clarifying question when the request is ambiguous
    #[serde(default = "default_true")]
    pub allow_clarification: bool,

    /// Supervisor planning rounds before delegation stops
    #[serde(default = "default_max_researcher_iterations")]
    pub max_researcher_iterations: u32,

    /// Researchers dispatched per delegation round
    #[serde(default = "default_max_concurrent_research_units")]
    pub max_concurrent_research_units: usize,

    /// Tool-execution rounds per researcher
    #[serde(default = "default_max_react_tool_calls")]
    pub max_react_tool_calls: u32,

    /// Attempts for retried gateway calls
    #[serde(default = "default_max_structured_output_retries")]
    pub max_structured_output_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Preset that overrides iterations and concurrency
    #[serde(default)]
    pub mode: Option<ResearchMode>,
}

fn default_true() -> bool {
    true
}

fn default_max_researcher_iterations() -> u32 {
    6
}

fn default_max_concurrent_research_units() -> usize {
    5
}

fn default_max_react_tool_calls() -> u32 {
    10
}

fn default_max_structured_output_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            allow_clarification: true,
            max_researcher_iterations: default_max_researcher_iterations(),
            max_concurrent_research_units: default_max_concurrent_research_units(),
            max_react_tool_calls: default_max_react_tool_calls(),
            max_structured_output_retries: default_max_structured_output_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            mode: None,
        }
    }
}

impl ResearchConfig {
    /// Set `mode` and apply its preset limits.
    pub fn apply_mode(&mut self, mode: ResearchMode) {
        let preset = mode.preset();
        self.mode = Some(mode);
        self.max_researcher_iterations = preset.max_researcher_iterations;
        self.max_concurrent_research_units = preset.max_concurrent_research_units;
    }
}

/// Depth presets for a research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchMode {
    Quick,
    Standard,
    Deep,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePreset {
    pub max_researcher_iterations: u32,
    pub max_concurrent_research_units: usize,
}

impl ResearchMode {
    pub fn preset(self) -> ModePreset {
        let (iterations, concurrency) = match self {
            ResearchMode::Quick => (1, 2),
            ResearchMode::Standard => (2, 3),
            ResearchMode::Deep => (3, 4),
            ResearchMode::Expert => (5, 5),
        };
        ModePreset {
            max_researcher_iterations: iterations,
            max_concurrent_research_units: concurrency,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResearchMode::Quick => "quick",
            ResearchMode::Standard => "standard",
            ResearchMode::Deep => "deep",
            ResearchMode::Expert => "expert",
        }
    }
}

impl fmt::Display for ResearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResearchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(ResearchMode::Quick),
            "standard" => Ok(ResearchMode::Standard),
            "deep" => Ok(ResearchMode::Deep),
            "expert" => Ok(ResearchMode::Expert),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown research mode '{}' (expected quick, standard, deep or expert)",
                other
            ))),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Local Ollama server, reached through its OpenAI-compatible endpoint
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
    OpenAI {
        /// Environment variable containing API key
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    HashMap::from([(
        "openai".to_string(),
        ProviderConfig::OpenAI {
            api_key_env: default_openai_key_env(),
            api_base: default_openai_base(),
        },
    )])
}

// ============= Model Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    /// Model name/identifier to use with the provider
    pub model: String,

    #[serde(default = "default_model_max_tokens")]
    pub max_tokens: u32,

    /// Context window override, in tokens
    #[serde(default)]
    pub token_limit: Option<u64>,

    /// Override for structured-output support
    #[serde(default)]
    pub structured_output: Option<bool>,

    /// Override for streaming support
    #[serde(default)]
    pub streaming: Option<bool>,

    /// Upper bound on one HTTP request to the model, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model_max_tokens() -> u32 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl ModelConfig {
    pub fn new(provider: &str, model: &str, max_tokens: u32) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            max_tokens,
            token_limit: None,
            structured_output: None,
            streaming: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageModelsConfig {
    /// Clarification, brief, supervisor and researcher calls
    #[serde(default = "default_research_model")]
    pub research: ModelConfig,

    #[serde(default = "default_compression_model")]
    pub compression: ModelConfig,

    #[serde(default = "default_final_report_model")]
    pub final_report: ModelConfig,
}

fn default_research_model() -> ModelConfig {
    ModelConfig::new("openai", "gpt-4.1", 10_000)
}

fn default_compression_model() -> ModelConfig {
    ModelConfig::new("openai", "gpt-4.1-mini", 8_192)
}

fn default_final_report_model() -> ModelConfig {
    ModelConfig::new("openai", "gpt-4.1", 10_000)
}

impl Default for StageModelsConfig {
    fn default() -> Self {
        Self {
            research: default_research_model(),
            compression: default_compression_model(),
            final_report: default_final_report_model(),
        }
    }
}

impl StageModelsConfig {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ModelConfig)> {
        [
            ("research", &self.research),
            ("compression", &self.compression),
            ("final_report", &self.final_report),
        ]
        .into_iter()
    }
}

// ============= Tool Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub web_search: bool,

    #[serde(default = "default_true")]
    pub fetch_page: bool,

    #[serde(default = "default_true")]
    pub think: bool,

    /// Per-call timeout for every tool
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
}

fn default_tool_timeout() -> u64 {
    30
}

fn default_max_search_results() -> usize {
    5
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            web_search: true,
            fetch_page: true,
            think: true,
            timeout_secs: default_tool_timeout(),
            max_search_results: default_max_search_results(),
        }
    }
}

// ============= Report Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_summary_timeout")]
    pub summary_timeout_secs: u64,

    #[serde(default = "default_summary_timeout")]
    pub key_findings_timeout_secs: u64,

    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_secs: u64,

    #[serde(default = "default_single_shot_timeout")]
    pub single_shot_timeout_secs: u64,

    /// Findings characters given to the summary section
    #[serde(default = "default_summary_chars")]
    pub summary_findings_chars: usize,

    #[serde(default = "default_key_findings_chars")]
    pub key_findings_chars: usize,

    #[serde(default = "default_analysis_chars")]
    pub analysis_findings_chars: usize,

    /// Findings excerpt carried by the static fallback report
    #[serde(default = "default_fallback_excerpt_chars")]
    pub fallback_excerpt_chars: usize,

    /// Notes excerpt appended to a partial sectioned report
    #[serde(default = "default_partial_notes_chars")]
    pub partial_notes_chars: usize,

    /// Truncation retries for the single-shot report
    #[serde(default = "default_max_truncation_retries")]
    pub max_truncation_retries: u32,
}

fn default_summary_timeout() -> u64 {
    45
}

fn default_analysis_timeout() -> u64 {
    60
}

fn default_single_shot_timeout() -> u64 {
    120
}

fn default_summary_chars() -> usize {
    3_000
}

fn default_key_findings_chars() -> usize {
    5_000
}

fn default_analysis_chars() -> usize {
    8_000
}

fn default_fallback_excerpt_chars() -> usize {
    10_000
}

fn default_partial_notes_chars() -> usize {
    2_000
}

fn default_max_truncation_retries() -> u32 {
    3
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            summary_timeout_secs: default_summary_timeout(),
            key_findings_timeout_secs: default_summary_timeout(),
            analysis_timeout_secs: default_analysis_timeout(),
            single_shot_timeout_secs: default_single_shot_timeout(),
            summary_findings_chars: default_summary_chars(),
            key_findings_chars: default_key_findings_chars(),
            analysis_findings_chars: default_analysis_chars(),
            fallback_excerpt_chars: default_fallback_excerpt_chars(),
            partial_notes_chars: default_partial_notes_chars(),
            max_truncation_retries: default_max_truncation_retries(),
        }
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ============= Loading and Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by model '{1}' does not exist")]
    MissingProvider(String, String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl DelveConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration text, applying any research mode preset.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: DelveConfig = toml::from_str(content)?;
        if let Some(mode) = config.research.mode {
            config.research.apply_mode(mode);
        }
        Ok(config)
    }

    /// Validate internal consistency.
    ///
    /// Provider API-key variables are not checked here; they are resolved
    /// when a client is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let research = &self.research;
        let limits = [
            ("research.max_researcher_iterations", research.max_researcher_iterations as u64),
            ("research.max_concurrent_research_units", research.max_concurrent_research_units as u64),
            ("research.max_react_tool_calls", research.max_react_tool_calls as u64),
            ("research.max_structured_output_retries", research.max_structured_output_retries as u64),
            ("tools.timeout_secs", self.tools.timeout_secs),
            ("report.summary_timeout_secs", self.report.summary_timeout_secs),
            ("report.key_findings_timeout_secs", self.report.key_findings_timeout_secs),
            ("report.analysis_timeout_secs", self.report.analysis_timeout_secs),
            ("report.single_shot_timeout_secs", self.report.single_shot_timeout_secs),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{} must be at least 1", name)));
            }
        }

        for (stage, model) in self.models.iter() {
            if !self.providers.contains_key(&model.provider) {
                return Err(ConfigError::MissingProvider(model.provider.clone(), stage.to_string()));
            }
            if model.model.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "models.{}.model must not be empty",
                    stage
                )));
            }
            if model.token_limit == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "models.{}.token_limit must be at least 1",
                    stage
                )));
            }
            if model.request_timeout_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "models.{}.request_timeout_secs must be at least 1",
                    stage
                )));
            }
        }

        Ok(())
    }

    /// Resolve the API key for an OpenAI provider from its environment variable.
    pub fn resolve_api_key(api_key_env: &str) -> Result<String, ConfigError> {
        std::env::var(api_key_env).map_err(|_| ConfigError::MissingEnvVar(api_key_env.to_string()))
    }
}
