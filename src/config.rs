use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::DEFAULT_MAX_CHARS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Provider API key, taken from `OPENAI_API_KEY`. Never read from the
    /// config file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            collection: default_collection(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/index.sqlite")
}

fn default_collection() -> String {
    "internal_docs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    #[serde(default = "default_feedback_path")]
    pub path: PathBuf,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            path: default_feedback_path(),
        }
    }
}

fn default_feedback_path() -> PathBuf {
    PathBuf::from("./data/feedback.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_secs() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_completion_model")]
    pub completion_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            embedding_model: default_embedding_model(),
            completion_model: default_completion_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// A minimal configuration for tests and tooling that never touch the
    /// corpus or providers.
    pub fn minimal(corpus_root: PathBuf) -> Self {
        Self {
            corpus: CorpusConfig {
                root: corpus_root,
                include_globs: default_include_globs(),
            },
            chunking: ChunkingConfig::default(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            feedback: FeedbackConfig::default(),
            retry: RetryConfig::default(),
            provider: ProviderConfig::default(),
            api_key: None,
        }
    }

    /// The provider API key, required for `serve` and `ingest`.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY environment variable is not set"))
    }
}

/// Load configuration from a TOML file and apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    apply_env_overrides(&mut config);

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }
    if config.retry.max_attempts == 0 {
        anyhow::bail!("retry.max_attempts must be >= 1");
    }

    Ok(config)
}

/// Apply the environment-variable configuration surface on top of the file.
///
/// An invalid retry base delay is coerced to the default with a logged
/// warning rather than failing startup.
fn apply_env_overrides(config: &mut Config) {
    config.api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());

    if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
        config.provider.embedding_model = model;
    }
    if let Ok(model) = std::env::var("COMPLETION_MODEL") {
        config.provider.completion_model = model;
    }
    if let Ok(origins) = std::env::var("CORS_ORIGINS") {
        config.server.cors_origins = origins
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
    }
    if let Ok(path) = std::env::var("FEEDBACK_DB") {
        config.feedback.path = PathBuf::from(path);
    }
    if let Ok(raw) = std::env::var("OPENAI_MAX_RETRIES") {
        match raw.parse::<u32>() {
            Ok(n) if n >= 1 => config.retry.max_attempts = n,
            _ => tracing::warn!(value = %raw, "invalid OPENAI_MAX_RETRIES, keeping configured value"),
        }
    }
    if let Ok(raw) = std::env::var("OPENAI_RETRY_BASE_DELAY") {
        match parse_base_delay(&raw) {
            Some(delay) => config.retry.base_delay_secs = delay,
            None => {
                tracing::warn!(
                    value = %raw,
                    "invalid OPENAI_RETRY_BASE_DELAY, falling back to default 1.0"
                );
                config.retry.base_delay_secs = default_base_delay_secs();
            }
        }
    }
}

/// Parse a retry base delay, accepting only finite positive values.
fn parse_base_delay(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}
