//! Configuration loading and component wiring.
//!
//! Configuration is read from YAML or JSON (by extension) at an explicit path
//! or `~/.p8/nl2sql.yaml`, then overridden by environment variables:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `P8_DEFAULT_LLM` | `llm.model` |
//! | `P8_DEFAULT_EMBEDDING` | `embedding.provider` |
//! | `P8_SQL_DATABASE` | `database.path` |
//! | `P8_SCHEMA_INDEX` | `index.path` |
//! | `MISTRAL_API_KEY` / `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` | `llm.api_key` (by provider) |

use crate::database::SqliteExecutor;
use crate::embeddings::{EmbeddingProvider, ProviderFactory};
use crate::index::SchemaIndex;
use crate::llm::client::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::llm::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::llm::{HttpLlmClient, LlmProvider, RateLimitRetry};
use crate::pipeline::PipelineConfig;
use crate::types::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "~/.p8/nl2sql.yaml";

/// Language model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Provider endpoint override
    pub endpoint: Option<String>,
    /// Usually taken from the provider's environment variable
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: 60,
            endpoint: None,
            api_key: None,
        }
    }
}

/// Rate-limit retry policy for model calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Total calls per model request, including the first
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider config string (`local:<model>`, `openai:<model>` or `hash:<dims>`)
    pub provider: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local:sentence-transformers/all-MiniLM-L6-v2".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Collection file (`~` expanded)
    pub path: String,
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: "~/.p8/nl2sql/schema-index.json".to_string(),
            collection: "dvdrental".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file (`~` expanded); must exist
    pub path: String,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.p8/nl2sql/dvdrental.db".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub rate_limit: RateLimitConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration and apply environment overrides.
    ///
    /// # Arguments
    ///
    /// * `path` - Explicit config file; `None` uses `~/.p8/nl2sql.yaml`
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConfigError` if an explicit file is missing,
    /// or any file is malformed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(PipelineError::config(format!("Config file not found: {}", path.display())));
                }
                Self::from_file(path)?
            }
            None => {
                let default = expand_path(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file, JSON if it ends in `.json`, YAML otherwise.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        Self::parse(&content, is_json)
            .map_err(|e| PipelineError::config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Parse config text.
    pub fn parse(content: &str, is_json: bool) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        if is_json {
            Ok(serde_json::from_str(content)?)
        } else {
            Ok(serde_yaml::from_str(content)?)
        }
    }

    /// Apply environment-style overrides.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Variable lookup (`std::env::var` in production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = get("P8_DEFAULT_LLM") {
            self.llm.model = model;
        }
        if let Some(provider) = get("P8_DEFAULT_EMBEDDING") {
            self.embedding.provider = provider;
        }
        if let Some(path) = get("P8_SQL_DATABASE") {
            self.database.path = path;
        }
        if let Some(path) = get("P8_SCHEMA_INDEX") {
            self.index.path = path;
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = get(LlmProvider::from_model(&self.llm.model).api_key_env());
        }
    }

    pub fn database_path(&self) -> PathBuf {
        expand_path(&self.database.path)
    }

    pub fn index_path(&self) -> PathBuf {
        expand_path(&self.index.path)
    }

    /// Build the rate-limited model client.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConfigError` if no API key is configured
    pub fn llm_client(&self) -> Result<RateLimitRetry<HttpLlmClient>> {
        let provider = LlmProvider::from_model(&self.llm.model);
        let api_key = self.llm.api_key.clone().ok_or_else(|| {
            PipelineError::config(format!(
                "{} environment variable not set (model {})",
                provider.api_key_env(),
                self.llm.model
            ))
        })?;

        let mut client = HttpLlmClient::new(api_key, self.llm.model.clone())
            .with_temperature(self.llm.temperature)
            .with_timeout(Duration::from_secs(self.llm.timeout_secs))?;
        if let Some(endpoint) = &self.llm.endpoint {
            client = client.with_endpoint(endpoint.clone());
        }

        Ok(RateLimitRetry::new(
            client,
            self.rate_limit.max_attempts,
            Duration::from_millis(self.rate_limit.delay_ms),
        ))
    }

    /// Build the configured embedding provider.
    pub fn embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(Arc::from(ProviderFactory::create(&self.embedding.provider)?))
    }

    /// Open the schema index from its collection file.
    pub fn schema_index(&self) -> Result<SchemaIndex> {
        SchemaIndex::open(&self.index_path(), self.embedder()?)
    }

    /// Build the SQLite executor.
    pub fn executor(&self) -> SqliteExecutor {
        SqliteExecutor::new(self.database_path()).with_busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }
}

/// Expand `~` and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}
