//! Shared types used across all modules.
//!
//! Defines the scoring output contract, the collaborator records the engine
//! consumes, and the model identifiers that make up a fallback chain. Other
//! modules import from here rather than reaching into each other's internals.

pub mod analysis;
pub mod candidate;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use analysis::{CompatibilityAnalysis, Dimension, DimensionScore, Recommendation};
pub use candidate::{CandidateRecord, Education, Job, Skill, UserProfile, WorkExperience};

/// Supported LLM provider backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Anthropic,
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    Cohere,
    Gemini,
    Perplexity,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "xai")]
    XAI,
    Groq,
    /// Any OpenAI-compatible API (e.g. Ollama, an inference gateway, local servers).
    #[serde(rename = "openai-compatible")]
    OpenAICompatible,
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderName::Anthropic => write!(f, "anthropic"),
            ProviderName::OpenAI => write!(f, "openai"),
            ProviderName::Cohere => write!(f, "cohere"),
            ProviderName::Gemini => write!(f, "gemini"),
            ProviderName::Perplexity => write!(f, "perplexity"),
            ProviderName::DeepSeek => write!(f, "deepseek"),
            ProviderName::XAI => write!(f, "xai"),
            ProviderName::Groq => write!(f, "groq"),
            ProviderName::OpenAICompatible => write!(f, "openai-compatible"),
        }
    }
}

impl std::str::FromStr for ProviderName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(ProviderName::Anthropic),
            "openai" => Ok(ProviderName::OpenAI),
            "cohere" => Ok(ProviderName::Cohere),
            "gemini" => Ok(ProviderName::Gemini),
            "perplexity" => Ok(ProviderName::Perplexity),
            "deepseek" => Ok(ProviderName::DeepSeek),
            "xai" => Ok(ProviderName::XAI),
            "groq" => Ok(ProviderName::Groq),
            "openai-compatible" => Ok(ProviderName::OpenAICompatible),
            other => Err(format!(
                "unsupported provider: '{other}'. Supported: anthropic, openai, cohere, \
                 gemini, perplexity, deepseek, xai, groq, openai-compatible"
            )),
        }
    }
}

impl ProviderName {
    /// Returns the provider-specific environment variable name for the API key.
    ///
    /// These match the env var names used by rig-core's `from_env()` implementations.
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            ProviderName::Anthropic => "ANTHROPIC_API_KEY",
            ProviderName::OpenAI | ProviderName::OpenAICompatible => "OPENAI_API_KEY",
            ProviderName::Cohere => "COHERE_API_KEY",
            ProviderName::Gemini => "GEMINI_API_KEY",
            ProviderName::Perplexity => "PERPLEXITY_API_KEY",
            ProviderName::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderName::XAI => "XAI_API_KEY",
            ProviderName::Groq => "GROQ_API_KEY",
        }
    }

    /// Whether the provider accepts OpenAI's `response_format` JSON-object switch.
    pub fn supports_json_mode(self) -> bool {
        matches!(
            self,
            ProviderName::OpenAI
                | ProviderName::OpenAICompatible
                | ProviderName::DeepSeek
                | ProviderName::Groq
                | ProviderName::XAI
        )
    }
}

/// One entry of the fallback chain: a provider plus a model identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: ProviderName,
    pub model: String,
    /// Endpoint override, required for `openai-compatible`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ModelSpec {
    pub fn new(provider: ProviderName, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// Parses `provider:model`. Only the first colon separates, so model
/// names such as `llama3:8b` survive.
impl std::str::FromStr for ModelSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("invalid model '{s}': expected <provider>:<model>"))?;
        let model = model.trim();
        if model.is_empty() {
            return Err(format!("invalid model '{s}': model name is empty"));
        }
        Ok(ModelSpec::new(provider.parse()?, model))
    }
}

/// Parse a comma-separated fallback chain such as `openai:gpt-4o,anthropic:claude-3-5-haiku-latest`.
pub fn parse_model_chain(value: &str) -> Result<Vec<ModelSpec>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name_display() {
        assert_eq!(ProviderName::Anthropic.to_string(), "anthropic");
        assert_eq!(ProviderName::OpenAI.to_string(), "openai");
        assert_eq!(ProviderName::XAI.to_string(), "xai");
        assert_eq!(
            ProviderName::OpenAICompatible.to_string(),
            "openai-compatible"
        );
    }

    #[test]
    fn provider_name_from_str_case_insensitive() {
        assert_eq!(
            "ANTHROPIC".parse::<ProviderName>().unwrap(),
            ProviderName::Anthropic
        );
        assert_eq!(
            "OpenAI".parse::<ProviderName>().unwrap(),
            ProviderName::OpenAI
        );
    }

    #[test]
    fn provider_name_from_str_invalid() {
        let err = "invalid".parse::<ProviderName>().unwrap_err();
        assert!(err.contains("unsupported provider"));
        assert!(err.contains("invalid"));
    }

    #[test]
    fn provider_name_api_key_env_var() {
        assert_eq!(
            ProviderName::Anthropic.api_key_env_var(),
            "ANTHROPIC_API_KEY"
        );
        assert_eq!(ProviderName::OpenAI.api_key_env_var(), "OPENAI_API_KEY");
        assert_eq!(
            ProviderName::OpenAICompatible.api_key_env_var(),
            "OPENAI_API_KEY"
        );
    }

    #[test]
    fn json_mode_only_for_openai_family() {
        assert!(ProviderName::OpenAI.supports_json_mode());
        assert!(ProviderName::OpenAICompatible.supports_json_mode());
        assert!(!ProviderName::Anthropic.supports_json_mode());
        assert!(!ProviderName::Gemini.supports_json_mode());
    }

    #[test]
    fn provider_name_serde_roundtrip() {
        let json = serde_json::to_string(&ProviderName::OpenAICompatible).unwrap();
        assert_eq!(json, "\"openai-compatible\"");
        let back: ProviderName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ProviderName::OpenAICompatible);
    }

    #[test]
    fn model_spec_parses_provider_and_model() {
        let spec: ModelSpec = "anthropic:claude-3-5-haiku-latest".parse().unwrap();
        assert_eq!(spec.provider, ProviderName::Anthropic);
        assert_eq!(spec.model, "claude-3-5-haiku-latest");
        assert_eq!(spec.to_string(), "anthropic:claude-3-5-haiku-latest");
    }

    #[test]
    fn model_spec_keeps_colons_in_model_name() {
        let spec: ModelSpec = "openai-compatible:llama3:8b".parse().unwrap();
        assert_eq!(spec.provider, ProviderName::OpenAICompatible);
        assert_eq!(spec.model, "llama3:8b");
    }

    #[test]
    fn model_spec_rejects_missing_model() {
        assert!("openai".parse::<ModelSpec>().is_err());
        assert!("openai:".parse::<ModelSpec>().is_err());
        assert!("nope:gpt".parse::<ModelSpec>().is_err());
    }

    #[test]
    fn parse_chain_preserves_order() {
        let chain = parse_model_chain("openai:gpt-4o, anthropic:claude-3-5-haiku-latest,").unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].provider, ProviderName::OpenAI);
        assert_eq!(chain[1].provider, ProviderName::Anthropic);
    }
}
