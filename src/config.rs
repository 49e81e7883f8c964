//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! below. [`load_config`] reads the file and rejects inconsistent values
//! before anything connects to a backend.
//!
//! ```toml
//! [db]
//! path = "./data/docent.sqlite"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [llm]
//! provider = "openai"
//! model = "gpt-4o-mini"
//!
//! [retrieval]
//! top_k = 6
//! duplicate_threshold = 0.85
//! confidence_threshold = 0.7
//! ```

use anyhow::{Context, Result};
use docent_core::PipelineSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_connect_backoff_secs")]
    pub connect_backoff_secs: u64,
}

fn default_connect_attempts() -> u32 {
    3
}
fn default_connect_backoff_secs() -> u64 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Entries kept by the embedding cache; `0` means unbounded.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_cache_capacity() -> usize {
    4096
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Base URL of an OpenAI-compatible API. Defaults per provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl LlmConfig {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        let url = match (&self.url, self.provider.as_str()) {
            (Some(url), _) => url.as_str(),
            (None, "ollama") => "http://localhost:11434",
            (None, _) => "https://api.openai.com",
        };
        url.trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            duplicate_threshold: default_duplicate_threshold(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    6
}
fn default_duplicate_threshold() -> f32 {
    0.85
}
fn default_confidence_threshold() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Sessions kept in memory; least recently used are evicted. `0` = unbounded.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_max_sessions() -> usize {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_product_name")]
    pub product_name: String,
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            product_name: default_product_name(),
            fallback_url: default_fallback_url(),
        }
    }
}

fn default_product_name() -> String {
    "ApostropheCMS".to_string()
}
fn default_fallback_url() -> String {
    docent_core::document::DEFAULT_FALLBACK_URL.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Pipeline tunables derived from `[retrieval]` and `[assistant]`.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            top_k: self.retrieval.top_k,
            duplicate_threshold: self.retrieval.duplicate_threshold,
            confidence_threshold: self.retrieval.confidence_threshold,
            product_name: self.assistant.product_name.clone(),
            fallback_url: self.assistant.fallback_url.clone(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.connect_attempts == 0 {
        anyhow::bail!("db.connect_attempts must be >= 1");
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    for (name, value) in [
        ("duplicate_threshold", config.retrieval.duplicate_threshold),
        ("confidence_threshold", config.retrieval.confidence_threshold),
    ] {
        if !(-1.0..=1.0).contains(&value) {
            anyhow::bail!("retrieval.{} must be in [-1.0, 1.0]", name);
        }
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.assistant.fallback_url.trim().is_empty() {
        anyhow::bail!("assistant.fallback_url must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"./data/docent.sqlite\"\n").unwrap();
        assert_eq!(config.db.connect_attempts, 3);
        assert_eq!(config.db.connect_backoff_secs, 2);
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.retrieval.duplicate_threshold, 0.85);
        assert_eq!(config.retrieval.confidence_threshold, 0.7);
        assert_eq!(config.embedding.max_retries, 0);
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.assistant.fallback_url, "https://docs.apostrophecms.org/");
        assert_eq!(config.llm.base_url(), "https://api.openai.com");
    }

    #[test]
    fn thresholds_flow_into_pipeline_settings() {
        let config = parse(
            "[db]\npath = \"x\"\n[retrieval]\nduplicate_threshold = 0.9\nconfidence_threshold = 0.5\ntop_k = 3\n",
        )
        .unwrap();
        let settings = config.pipeline_settings();
        assert_eq!(settings.top_k, 3);
        assert_eq!(settings.duplicate_threshold, 0.9);
        assert_eq!(settings.confidence_threshold, 0.5);
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let err = parse("[db]\npath = \"x\"\n[retrieval]\nconfidence_threshold = 1.5\n")
            .unwrap_err();
        assert!(err.to_string().contains("confidence_threshold"));
    }

    #[test]
    fn enabled_embedding_requires_dims() {
        let err = parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn unknown_llm_provider_is_rejected() {
        let err = parse("[db]\npath = \"x\"\n[llm]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse(include_str!("../config/docent.example.toml")).unwrap();
        assert_eq!(config.embedding.dims, Some(1536));
        assert_eq!(config.server.request_timeout_secs, 120);
    }

    #[test]
    fn ollama_llm_defaults_to_local_url() {
        let config = parse("[db]\npath = \"x\"\n[llm]\nprovider = \"ollama\"\nmodel = \"llama3\"\n")
            .unwrap();
        assert_eq!(config.llm.base_url(), "http://localhost:11434");
    }
}
