//! Configuration loading, validation, and management for patentrag.
//!
//! Loads configuration from `~/.patentrag/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use patentrag_core::DecodingParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Retrieval backend names accepted in `[retrieval].backends`.
pub const RETRIEVAL_BACKENDS: &[&str] = &["memory", "postgres", "none"];

/// The root configuration structure.
///
/// Maps directly to `~/.patentrag/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the OpenAI-compatible stack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Which remote stack serves embedding, classification and generation
    #[serde(default)]
    pub backend: ServiceBackend,

    #[serde(default)]
    pub model_server: ModelServerConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub prompt: PromptConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("backend", &self.backend)
            .field("model_server", &self.model_server)
            .field("openai", &self.openai)
            .field("retrieval", &self.retrieval)
            .field("routing", &self.routing)
            .field("prompt", &self.prompt)
            .field("memory", &self.memory)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceBackend {
    #[default]
    ModelServer,
    Openai,
}

impl std::str::FromStr for ServiceBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "model_server" | "model-server" => Ok(Self::ModelServer),
            "openai" => Ok(Self::Openai),
            other => Err(ConfigError::ValidationError(format!(
                "unknown backend '{other}' (expected model_server or openai)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelServerConfig {
    #[serde(default = "default_model_server_url")]
    pub url: String,

    /// Timeout for embed and classify calls
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_generate_timeout_secs")]
    pub generate_timeout_secs: u64,

    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

fn default_model_server_url() -> String {
    "http://localhost:8001".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_generate_timeout_secs() -> u64 {
    120
}
fn default_health_timeout_secs() -> u64 {
    5
}

impl Default for ModelServerConfig {
    fn default() -> Self {
        Self {
            url: default_model_server_url(),
            timeout_secs: default_timeout_secs(),
            generate_timeout_secs: default_generate_timeout_secs(),
            health_timeout_secs: default_health_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_url")]
    pub api_url: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_chat_model")]
    pub classifier_model: String,

    /// Output dimensions requested from the embedding endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dimensions: Option<usize>,
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-large".into()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_url: default_openai_url(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            classifier_model: default_chat_model(),
            embedding_dimensions: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Backends tried in order until one answers
    #[serde(default = "default_retrieval_backends")]
    pub backends: Vec<String>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Hits below this similarity are dropped
    #[serde(default)]
    pub min_score: f32,

    /// JSONL corpus for the in-memory backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after the first failed search
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_retrieval_backends() -> Vec<String> {
    vec!["memory".into()]
}
fn default_top_k() -> usize {
    3
}
fn default_table() -> String {
    "patent_rag_documents".into()
}
fn default_embedding_dim() -> usize {
    1024
}
fn default_retrieval_timeout_secs() -> u64 {
    10
}
fn default_retries() -> u32 {
    1
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backends: default_retrieval_backends(),
            top_k: default_top_k(),
            min_score: 0.0,
            index_path: None,
            database_url: None,
            table: default_table(),
            embedding_dim: default_embedding_dim(),
            timeout_secs: default_retrieval_timeout_secs(),
            retries: default_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Model serving the rejection route
    #[serde(default = "default_specialized_model")]
    pub specialized_model: String,

    /// Model serving the registration route and rejection fallback
    #[serde(default = "default_general_model")]
    pub general_model: String,

    #[serde(default = "DecodingParams::rejection")]
    pub rejection: DecodingParams,

    #[serde(default = "DecodingParams::registration")]
    pub registration: DecodingParams,
}

fn default_specialized_model() -> String {
    "sllm".into()
}
fn default_general_model() -> String {
    "base_model".into()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            specialized_model: default_specialized_model(),
            general_model: default_general_model(),
            rejection: DecodingParams::rejection(),
            registration: DecodingParams::registration(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Characters of each document's text shown to the generator
    #[serde(default = "default_doc_char_budget")]
    pub doc_char_budget: usize,

    /// Characters of the query sent to the embedder
    #[serde(default = "default_query_char_budget")]
    pub query_char_budget: usize,
}

fn default_doc_char_budget() -> usize {
    300
}
fn default_query_char_budget() -> usize {
    2000
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            doc_char_budget: default_doc_char_budget(),
            query_char_budget: default_query_char_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Number of trailing turns handed to the extractor
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_max_facts")]
    pub max_facts: usize,
}

fn default_history_window() -> usize {
    10
}
fn default_max_facts() -> usize {
    5
}

/// Upper bound on remembered facts per request.
pub const MAX_MEMORY_FACTS: usize = 5;

/// Accepted sizes of the history window handed to the memory extractor.
pub const HISTORY_WINDOW_TURNS: std::ops::RangeInclusive<usize> = 6..=10;

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_facts: default_max_facts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deadline for a whole request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub classify_timeout_secs: u64,

    /// Bound on the query embedding call; on expiry retrieval degrades
    #[serde(default = "default_timeout_secs")]
    pub embed_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    180
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            classify_timeout_secs: default_timeout_secs(),
            embed_timeout_secs: default_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.patentrag/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PATENTRAG_API_KEY`, then `OPENAI_API_KEY`
    /// - `PATENTRAG_MODEL_SERVER_URL`, then `MODEL_SERVER_URL`
    /// - `DATABASE_URL`
    /// - `PATENTRAG_BACKEND`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Takes a lookup function so tests can supply a fake environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("PATENTRAG_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(url) =
            lookup("PATENTRAG_MODEL_SERVER_URL").or_else(|| lookup("MODEL_SERVER_URL"))
        {
            self.model_server.url = url;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            self.retrieval.database_url = Some(url);
        }

        if let Some(backend) = lookup("PATENTRAG_BACKEND") {
            self.backend = backend.parse()?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".patentrag")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;
        if r.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be a positive integer".into(),
            ));
        }
        if r.backends.is_empty() {
            return Err(ConfigError::ValidationError(
                "retrieval.backends must name at least one backend".into(),
            ));
        }
        if let Some(unknown) = r
            .backends
            .iter()
            .find(|b| !RETRIEVAL_BACKENDS.contains(&b.as_str()))
        {
            return Err(ConfigError::ValidationError(format!(
                "unknown retrieval backend '{unknown}' (expected one of {})",
                RETRIEVAL_BACKENDS.join(", ")
            )));
        }
        if r.embedding_dim == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.embedding_dim must be > 0".into(),
            ));
        }

        if !(1..=MAX_MEMORY_FACTS).contains(&self.memory.max_facts) {
            return Err(ConfigError::ValidationError(format!(
                "memory.max_facts must be between 1 and {MAX_MEMORY_FACTS}"
            )));
        }
        if !HISTORY_WINDOW_TURNS.contains(&self.memory.history_window) {
            return Err(ConfigError::ValidationError(format!(
                "memory.history_window must be between {} and {} turns",
                HISTORY_WINDOW_TURNS.start(),
                HISTORY_WINDOW_TURNS.end()
            )));
        }
        if self.prompt.doc_char_budget == 0 || self.prompt.query_char_budget == 0 {
            return Err(ConfigError::ValidationError(
                "prompt character budgets must be > 0".into(),
            ));
        }

        for (route, params) in [
            ("rejection", &self.routing.rejection),
            ("registration", &self.routing.registration),
        ] {
            if !(0.0..=2.0).contains(&params.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "routing.{route}.temperature must be between 0.0 and 2.0"
                )));
            }
            if params.num_beams == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "routing.{route}.num_beams must be >= 1"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config --default` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            backend: ServiceBackend::default(),
            model_server: ModelServerConfig::default(),
            openai: OpenAiConfig::default(),
            retrieval: RetrievalConfig::default(),
            routing: RoutingConfig::default(),
            prompt: PromptConfig::default(),
            memory: MemoryConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
