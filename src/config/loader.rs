//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.fitscore.toml` in the working directory
//! 4. `~/.config/fitscore/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::constants;
use crate::env::Env;
use crate::models::{parse_model_chain, ModelSpec, ProviderName};

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
}

/// Scoring behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fallback chain, primary first.
    pub models: Vec<ModelSpec>,
    pub temperature: f64,
    pub max_tokens: u64,
    pub min_justification_chars: usize,
    pub prompt_char_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            temperature: constants::DEFAULT_TEMPERATURE,
            max_tokens: constants::DEFAULT_MAX_TOKENS,
            min_justification_chars: constants::DEFAULT_MIN_JUSTIFICATION_CHARS,
            prompt_char_limit: constants::DEFAULT_PROMPT_CHAR_LIMIT,
        }
    }
}

fn default_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new(ProviderName::OpenAI, "gpt-4o-mini"),
        ModelSpec::new(ProviderName::Anthropic, "claude-3-5-haiku-latest"),
    ]
}

/// Transient-failure retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            initial_backoff_ms: constants::DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: constants::DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

/// Fast cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_days: u64,
    /// Overrides `~/.config/fitscore/cache`.
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_days: constants::DEFAULT_CACHE_TTL_DAYS,
            dir: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days.saturating_mul(86_400))
    }
}

/// Credentials shared by every chain entry.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Used for every provider when set; otherwise each provider's own env var.
    pub api_key: Option<String>,
    /// Default endpoint for `openai-compatible` entries without their own.
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, the local config in `dir`, then applies
    /// environment variable overrides.
    pub fn load(dir: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: local config
        if let Some(dir) = dir {
            let local_path = dir.join(constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        config.validate()?;
        Ok(config)
    }

    /// Load a config from a specific file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.models.is_empty() {
            return Err(ConfigError::Invalid(
                "engine.models must list at least one model".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.engine.temperature) {
            return Err(ConfigError::Invalid(format!(
                "engine.temperature must be between 0 and 2, got {}",
                self.engine.temperature
            )));
        }
        if self.engine.max_tokens == 0 {
            return Err(ConfigError::Invalid("engine.max_tokens must be positive".into()));
        }
        if self.engine.prompt_char_limit == 0 {
            return Err(ConfigError::Invalid(
                "engine.prompt_char_limit must be positive".into(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        let default_engine = EngineConfig::default();
        if other.engine.models != default_engine.models {
            self.engine.models = other.engine.models;
        }
        if other.engine.temperature != default_engine.temperature {
            self.engine.temperature = other.engine.temperature;
        }
        if other.engine.max_tokens != default_engine.max_tokens {
            self.engine.max_tokens = other.engine.max_tokens;
        }
        if other.engine.min_justification_chars != default_engine.min_justification_chars {
            self.engine.min_justification_chars = other.engine.min_justification_chars;
        }
        if other.engine.prompt_char_limit != default_engine.prompt_char_limit {
            self.engine.prompt_char_limit = other.engine.prompt_char_limit;
        }

        let default_retry = RetryConfig::default();
        if other.retry.max_retries != default_retry.max_retries {
            self.retry.max_retries = other.retry.max_retries;
        }
        if other.retry.initial_backoff_ms != default_retry.initial_backoff_ms {
            self.retry.initial_backoff_ms = other.retry.initial_backoff_ms;
        }
        if other.retry.max_backoff_ms != default_retry.max_backoff_ms {
            self.retry.max_backoff_ms = other.retry.max_backoff_ms;
        }

        // Cache settings (disabled overrides enabled)
        if !other.cache.enabled {
            self.cache.enabled = false;
        }
        if other.cache.ttl_days != CacheConfig::default().ttl_days {
            self.cache.ttl_days = other.cache.ttl_days;
        }
        if other.cache.dir.is_some() {
            self.cache.dir = other.cache.dir;
        }

        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(val) = env.var(constants::ENV_MODELS) {
            match parse_model_chain(&val) {
                Ok(models) if !models.is_empty() => self.engine.models = models,
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    variable = constants::ENV_MODELS,
                    error = %e,
                    "ignoring invalid model chain"
                ),
            }
        }
        if let Some(val) = env.var(constants::ENV_API_KEY) {
            self.provider.api_key = Some(val);
        }
        if let Some(val) = env.var(constants::ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }
        if let Some(val) = env.var(constants::ENV_CACHE_DIR) {
            self.cache.dir = Some(PathBuf::from(val));
        }
        if let Some(days) = env.parsed::<u64>(constants::ENV_CACHE_TTL_DAYS) {
            self.cache.ttl_days = days;
        }
        if let Some(retries) = env.parsed::<u32>(constants::ENV_MAX_RETRIES) {
            self.retry.max_retries = retries;
        }
        if let Some(min) = env.parsed::<usize>(constants::ENV_MIN_JUSTIFICATION) {
            self.engine.min_justification_chars = min;
        }
    }

    /// API key for `provider`: the shared key when set, otherwise the
    /// provider's conventional environment variable.
    pub fn resolve_api_key(&self, provider: ProviderName, env: &Env) -> Option<String> {
        self.provider
            .api_key
            .clone()
            .or_else(|| env.var(provider.api_key_env_var()))
    }

    /// Directory of the file-backed cache, if one can be determined.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache.dir.clone().or_else(|| {
            dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("cache"))
        })
    }
}
