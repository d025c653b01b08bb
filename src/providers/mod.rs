//! CompletionProvider trait and LLM integration.
//!
//! Provides an abstraction layer over rig-core so the engine (and its
//! tests) only see "send these messages to that model, get text back".
//!
//! Provider-side prompt caching (the short-lived cache some providers and
//! gateways keep for repeated prompt prefixes) lives entirely behind this
//! boundary. The engine never manages it; it only benefits when an identical
//! system prompt is resent within the provider's window.

pub mod rig;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ModelSpec;

/// Errors from the completion provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// One scoring call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instructions.
    pub system: String,
    /// User content.
    pub user: String,
    pub temperature: f64,
    pub max_tokens: u64,
    /// Ask the provider to emit a single JSON object when it supports it.
    pub json_mode: bool,
}

/// Trait for LLM-backed text completion.
///
/// Implementations return the model's raw text; they do not parse or
/// validate it.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        model: &ModelSpec,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError>;
}

/// Check whether a provider error is transient and worth retrying.
///
/// Matches HTTP status codes commonly used for rate limiting and
/// temporary unavailability (429, 502, 503, 529) and connection/timeout
/// errors. Configuration problems are never retried.
pub fn is_retryable(err: &ProviderError) -> bool {
    classify_error(err).is_some()
}

/// Transient HTTP status codes, matched as whole numbers only.
static STATUS_RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"\b(429|500|502|503|529)\b").expect("status regex is valid")
});

/// Classifies a provider error into a short, user-friendly message.
///
/// Returns `Some(message)` for transient/retryable errors, `None` otherwise.
pub fn classify_error(err: &ProviderError) -> Option<&'static str> {
    match err {
        ProviderError::ApiError(msg) => {
            let msg_lower = msg.to_lowercase();
            let status = STATUS_RE
                .captures(&msg_lower)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str());
            if status == Some("429")
                || msg_lower.contains("rate limit")
                || msg_lower.contains("too many requests")
            {
                Some("Rate limited by API")
            } else if status == Some("503")
                || msg_lower.contains("service unavailable")
                || msg_lower.contains("high demand")
            {
                Some("High model load")
            } else if status == Some("529") || msg_lower.contains("overloaded") {
                Some("API overloaded")
            } else if matches!(status, Some("500" | "502")) || msg_lower.contains("bad gateway") {
                Some("API gateway error")
            } else if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
                Some("Request timed out")
            } else if msg_lower.contains("connection") {
                Some("Connection error")
            } else if msg_lower.contains("temporarily") || msg_lower.contains("try again") {
                Some("Temporary API error")
            } else {
                None
            }
        }
        ProviderError::NotConfigured(_) => None,
    }
}
