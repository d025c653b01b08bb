//! rig-core integration for LLM-backed scoring.
//!
//! Uses rig-core's provider clients and Agent abstraction for multi-provider
//! support. Currently supports: Anthropic, OpenAI, Cohere, Gemini, Perplexity,
//! DeepSeek, xAI, Groq, and any OpenAI-compatible API. Each fallback-chain
//! entry names its own provider, so one chain can mix backends.

use std::collections::HashMap;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::Config;
use crate::env::Env;
use crate::models::{ModelSpec, ProviderName};

use super::{CompletionProvider, CompletionRequest, ProviderError};

/// Build a single-turn agent from a rig-core client and prompt it.
///
/// Always sets `max_tokens`: without it some providers (e.g. Gemini)
/// default to a low limit that truncates the ten justifications.
macro_rules! prompt_simple {
    ($client:expr, $model:expr, $request:expr, $label:expr, $json_mode:expr) => {{
        let mut builder = $client
            .agent($model)
            .preamble(&$request.system)
            .temperature($request.temperature)
            .max_tokens($request.max_tokens);
        if $json_mode {
            builder = builder.additional_params(serde_json::json!({
                "response_format": { "type": "json_object" }
            }));
        }
        let agent = builder.build();
        agent
            .prompt($request.user.as_str())
            .await
            .map_err(|e| ProviderError::ApiError(format!("{} API error: {e}", $label)))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            ProviderError::ApiError(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// rig-core based completion provider.
///
/// Holds one API key per provider; the model spec of each call selects
/// which rig-core client is built.
pub struct RigProvider {
    api_keys: HashMap<ProviderName, String>,
    /// Fallback endpoint for chain entries without their own `base_url`.
    default_base_url: Option<String>,
}

impl std::fmt::Debug for RigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.api_keys.keys().map(|p| p.to_string()).collect();
        providers.sort();
        f.debug_struct("RigProvider")
            .field("providers", &providers)
            .field("default_base_url", &self.default_base_url)
            .finish()
    }
}

impl RigProvider {
    /// Create a provider from explicit API keys.
    pub fn new(api_keys: HashMap<ProviderName, String>, default_base_url: Option<String>) -> Self {
        Self {
            api_keys,
            default_base_url,
        }
    }

    /// Resolve API keys for every provider in the configured chain.
    ///
    /// Fails only when no chain entry has a key at all; entries without one
    /// fail at call time and the chain moves past them.
    pub fn from_config(config: &Config, env: &Env) -> Result<Self, ProviderError> {
        let mut api_keys = HashMap::new();
        for spec in &config.engine.models {
            if let Some(key) = config.resolve_api_key(spec.provider, env) {
                api_keys.insert(spec.provider, key);
            }
        }
        if api_keys.is_empty() {
            let wanted: Vec<_> = config
                .engine
                .models
                .iter()
                .map(|m| m.provider.api_key_env_var())
                .collect();
            return Err(ProviderError::NotConfigured(format!(
                "no API key found for any configured model. Set {} or one of: {}",
                crate::constants::ENV_API_KEY,
                wanted.join(", ")
            )));
        }
        Ok(Self::new(api_keys, config.provider.base_url.clone()))
    }

    /// Get the API key for a provider or return an error.
    fn api_key(&self, provider: ProviderName) -> Result<&str, ProviderError> {
        self.api_keys.get(&provider).map(String::as_str).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no API key for provider '{provider}'. Set {} or {}.",
                crate::constants::ENV_API_KEY,
                provider.api_key_env_var()
            ))
        })
    }

    fn base_url<'a>(&'a self, spec: &'a ModelSpec) -> Option<&'a str> {
        spec.base_url
            .as_deref()
            .or(self.default_base_url.as_deref())
    }

    /// Require `base_url` for OpenAI-compatible providers.
    fn require_base_url<'a>(&'a self, spec: &'a ModelSpec) -> Result<&'a str, ProviderError> {
        self.base_url(spec).ok_or_else(|| {
            ProviderError::NotConfigured(
                "openai-compatible provider requires base_url to be set".to_string(),
            )
        })
    }

    /// Build an OpenAI-style client, optionally with a custom base URL.
    fn build_openai_client(
        api_key: &str,
        base_url: Option<&str>,
    ) -> Result<providers::openai::CompletionsClient, ProviderError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(base_url) = base_url {
            builder = builder.base_url(base_url);
        }
        let client: providers::openai::CompletionsClient = builder
            .build()
            .map_err(|e| ProviderError::ApiError(format!("failed to create OpenAI client: {e}")))?;
        Ok(client)
    }
}

#[async_trait]
impl CompletionProvider for RigProvider {
    async fn complete(
        &self,
        spec: &ModelSpec,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key(spec.provider)?;
        let model = spec.model.as_str();
        let json_mode = request.json_mode && spec.provider.supports_json_mode();

        match spec.provider {
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        ProviderError::ApiError(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_simple!(client, model, request, "Anthropic", json_mode)
            }
            ProviderName::OpenAI => {
                let client = Self::build_openai_client(api_key, self.base_url(spec))?;
                prompt_simple!(client, model, request, "OpenAI", json_mode)
            }
            ProviderName::OpenAICompatible => {
                let base_url = self.require_base_url(spec)?;
                let client = Self::build_openai_client(api_key, Some(base_url))?;
                prompt_simple!(client, model, request, "OpenAI-compatible", json_mode)
            }
            ProviderName::Cohere => {
                let client = new_client!(providers::cohere::Client, api_key, "Cohere")?;
                prompt_simple!(client, model, request, "Cohere", json_mode)
            }
            ProviderName::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_simple!(client, model, request, "Gemini", json_mode)
            }
            ProviderName::Perplexity => {
                let client = new_client!(providers::perplexity::Client, api_key, "Perplexity")?;
                prompt_simple!(client, model, request, "Perplexity", json_mode)
            }
            ProviderName::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, "DeepSeek")?;
                prompt_simple!(client, model, request, "DeepSeek", json_mode)
            }
            ProviderName::XAI => {
                let client = new_client!(providers::xai::Client, api_key, "xAI")?;
                prompt_simple!(client, model, request, "xAI", json_mode)
            }
            ProviderName::Groq => {
                let client = new_client!(providers::groq::Client, api_key, "Groq")?;
                prompt_simple!(client, model, request, "Groq", json_mode)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "system".into(),
            user: "user".into(),
            temperature: 0.2,
            max_tokens: 64,
            json_mode: true,
        }
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let provider = RigProvider::new(HashMap::new(), None);
        let spec = ModelSpec::new(ProviderName::Anthropic, "claude-3-5-haiku-latest");
        let err = provider.complete(&spec, &request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"), "got: {err}");
    }

    #[tokio::test]
    async fn openai_compatible_requires_base_url() {
        let provider = RigProvider::new(
            HashMap::from([(ProviderName::OpenAICompatible, "key".to_string())]),
            None,
        );
        let spec = ModelSpec::new(ProviderName::OpenAICompatible, "llama3:8b");
        let err = provider.complete(&spec, &request()).await.unwrap_err();
        assert!(err.to_string().contains("base_url"), "got: {err}");
    }

    #[test]
    fn model_base_url_overrides_default() {
        let provider = RigProvider::new(HashMap::new(), Some("https://gateway.example".into()));
        let mut spec = ModelSpec::new(ProviderName::OpenAICompatible, "m");
        assert_eq!(provider.base_url(&spec), Some("https://gateway.example"));
        spec.base_url = Some("https://local.example".into());
        assert_eq!(provider.base_url(&spec), Some("https://local.example"));
    }

    #[test]
    fn from_config_requires_some_key() {
        let config = Config::default();
        let env = Env::mock(Vec::<(&str, &str)>::new());
        let err = RigProvider::from_config(&config, &env).unwrap_err();
        assert!(err.to_string().contains("FITSCORE_API_KEY"), "got: {err}");
    }

    #[test]
    fn from_config_collects_keys_per_provider() {
        let config = Config::default();
        let env = Env::mock([("ANTHROPIC_API_KEY", "sk-ant")]);
        let provider = RigProvider::from_config(&config, &env).unwrap();
        assert_eq!(provider.api_key(ProviderName::Anthropic).unwrap(), "sk-ant");
        assert!(provider.api_key(ProviderName::OpenAI).is_err());
    }

    #[test]
    fn debug_does_not_leak_keys() {
        let provider = RigProvider::new(
            HashMap::from([(ProviderName::OpenAI, "sk-secret".to_string())]),
            None,
        );
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("openai"));
    }
}
