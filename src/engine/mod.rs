//! Scoring engine: cache lookup, model fallback chain, validation, write-back.
//!
//! One call to [`ScoringEngine::analyze`] walks the configured models strictly
//! in order. Each model gets one prompt, driven through the retry loop for
//! transport failures only; its output is validated and the first valid
//! analysis wins. When every model fails the result is `None`, which is an
//! ordinary outcome rather than an error.

pub mod retry;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::cache::store::StoreError;
use crate::cache::{self, CacheEngine};
use crate::config::Config;
use crate::models::{CandidateRecord, CompatibilityAnalysis, Job, ModelSpec};
use crate::prompt::{self, PromptError, PromptOptions, ScoringPrompt};
use crate::providers::{CompletionProvider, CompletionRequest};
use crate::validate::{self, Rejection, ValidationRules};
use retry::{call_with_retry, RetryPolicy};

/// Errors from the engine. Model misbehaviour is never one of them.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Prompt(#[from] PromptError),

    #[error("cache error: {0}")]
    Cache(#[from] StoreError),
}

/// Everything the engine needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Fallback chain, primary first.
    pub models: Vec<ModelSpec>,
    pub temperature: f64,
    pub max_tokens: u64,
    pub prompt: PromptOptions,
    pub rules: ValidationRules,
    pub retry: RetryPolicy,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            models: config.engine.models.clone(),
            temperature: config.engine.temperature,
            max_tokens: config.engine.max_tokens,
            prompt: PromptOptions {
                char_limit: config.engine.prompt_char_limit,
                min_justification_chars: config.engine.min_justification_chars,
            },
            rules: ValidationRules {
                min_justification_chars: config.engine.min_justification_chars,
            },
            retry: RetryPolicy {
                max_retries: config.retry.max_retries,
                initial_backoff: std::time::Duration::from_millis(config.retry.initial_backoff_ms),
                max_backoff: std::time::Duration::from_millis(config.retry.max_backoff_ms),
            },
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    /// Skip the cache read. The fresh result is still written back.
    pub refresh: bool,
}

/// Where an accepted analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Cache,
    Model,
}

impl fmt::Display for AnalysisSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisSource::Cache => write!(f, "cache"),
            AnalysisSource::Model => write!(f, "model"),
        }
    }
}

/// How one model in the chain fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted,
    /// The model answered but the answer failed validation.
    Rejected(Rejection),
    /// The call never completed, even after retries.
    CallFailed(String),
}

/// One model's turn in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub model: String,
    /// Calls made to this model, retries included.
    pub calls: u32,
    pub outcome: AttemptOutcome,
}

/// Result of one analysis plus how it was obtained.
#[derive(Debug)]
pub struct AnalysisReport {
    pub cache_key: String,
    /// `None` when the chain was exhausted.
    pub analysis: Option<CompatibilityAnalysis>,
    /// `provider:model` that produced the analysis.
    pub model: Option<String>,
    pub source: Option<AnalysisSource>,
    /// Set for cache hits.
    pub cached_at: Option<DateTime<Utc>>,
    /// Empty for cache hits.
    pub attempts: Vec<AttemptRecord>,
    /// Pending cache write for a fresh analysis.
    pub write_back: Option<JoinHandle<()>>,
}

impl AnalysisReport {
    pub fn is_available(&self) -> bool {
        self.analysis.is_some()
    }

    /// Wait for the detached cache write, if one was started.
    ///
    /// Call this before the runtime shuts down, or the write may never run.
    pub async fn finish_write_back(&mut self) {
        if let Some(handle) = self.write_back.take() {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "cache write task did not complete");
            }
        }
    }
}

/// Fallback chain states. Terminal states carry the chain's result.
#[derive(Debug)]
enum ChainState {
    NotStarted,
    TryingModel(usize),
    Validating {
        index: usize,
        raw: String,
        calls: u32,
    },
    NextModel(usize),
    Accepted {
        index: usize,
        analysis: CompatibilityAnalysis,
    },
    Exhausted,
}

/// The scoring engine.
pub struct ScoringEngine {
    provider: Arc<dyn CompletionProvider>,
    cache: Arc<CacheEngine>,
    settings: EngineSettings,
}

impl ScoringEngine {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        cache: CacheEngine,
        settings: EngineSettings,
    ) -> Self {
        Self {
            provider,
            cache: Arc::new(cache),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Score `candidate` against `job`.
    ///
    /// Returns `Ok(None)` when no model produced a valid analysis. Errors are
    /// reserved for inputs that cannot be rendered.
    pub async fn analyze(
        &self,
        job: &Job,
        candidate: &CandidateRecord,
    ) -> Result<Option<CompatibilityAnalysis>, EngineError> {
        let report = self
            .analyze_with_report(job, candidate, AnalyzeOptions::default())
            .await?;
        Ok(report.analysis)
    }

    /// Like [`analyze`](Self::analyze), but also reports the cache key,
    /// provenance and every model attempt.
    pub async fn analyze_with_report(
        &self,
        job: &Job,
        candidate: &CandidateRecord,
        options: AnalyzeOptions,
    ) -> Result<AnalysisReport, EngineError> {
        let prompt = prompt::build_prompt(job, candidate, &self.settings.prompt)?;
        let key = cache::cache_key(&prompt.document, self.settings.prompt.char_limit);

        if options.refresh {
            tracing::debug!(key = %key, "cache read skipped");
        } else if let Some(entry) = self.cache.get(&key).await {
            tracing::info!(key = %key, model = %entry.model, "cache hit");
            return Ok(AnalysisReport {
                cache_key: key,
                analysis: Some(entry.analysis),
                model: Some(entry.model),
                source: Some(AnalysisSource::Cache),
                cached_at: Some(entry.cached_at),
                attempts: Vec::new(),
                write_back: None,
            });
        } else {
            tracing::debug!(key = %key, "cache miss");
        }

        let (accepted, attempts) = self.run_chain(&prompt).await;

        let Some((index, analysis)) = accepted else {
            tracing::warn!(
                key = %key,
                models = attempts.len(),
                "every model failed, no analysis available"
            );
            return Ok(AnalysisReport {
                cache_key: key,
                analysis: None,
                model: None,
                source: None,
                cached_at: None,
                attempts,
                write_back: None,
            });
        };

        let model = self.settings.models[index].to_string();
        // Detached: the caller never waits on the store.
        let write_back = self.cache.put(&key, &analysis, &model);

        Ok(AnalysisReport {
            cache_key: key,
            analysis: Some(analysis),
            model: Some(model),
            source: Some(AnalysisSource::Model),
            cached_at: None,
            attempts,
            write_back,
        })
    }

    /// The cache key `analyze` would use for this pair.
    pub fn cache_key_for(&self, job: &Job, candidate: &CandidateRecord) -> Result<String, EngineError> {
        let limit = self.settings.prompt.char_limit;
        let document = prompt::render_document(job, candidate, limit)?;
        Ok(cache::cache_key(&document, limit))
    }

    /// Drop the cached analysis for this pair. Returns whether one existed.
    pub async fn invalidate(&self, job: &Job, candidate: &CandidateRecord) -> Result<bool, EngineError> {
        let key = self.cache_key_for(job, candidate)?;
        Ok(self.cache.invalidate(&key).await?)
    }

    /// Walk the fallback chain until a model is accepted or none remain.
    async fn run_chain(
        &self,
        prompt: &ScoringPrompt,
    ) -> (Option<(usize, CompatibilityAnalysis)>, Vec<AttemptRecord>) {
        let models = &self.settings.models;
        let mut attempts = Vec::with_capacity(models.len());
        let mut state = ChainState::NotStarted;

        loop {
            state = match state {
                ChainState::NotStarted => {
                    if models.is_empty() {
                        ChainState::Exhausted
                    } else {
                        ChainState::TryingModel(0)
                    }
                }
                ChainState::TryingModel(index) => {
                    let spec = &models[index];
                    let label = spec.to_string();
                    let request = self.request_for(spec, prompt);
                    tracing::debug!(model = %label, position = index + 1, "calling model");

                    let outcome = call_with_retry(&self.settings.retry, &label, || {
                        self.provider.complete(spec, &request)
                    })
                    .await;

                    match outcome.result {
                        Ok(raw) => ChainState::Validating {
                            index,
                            raw,
                            calls: outcome.calls,
                        },
                        Err(e) => {
                            tracing::warn!(model = %label, calls = outcome.calls, error = %e, "model call failed");
                            attempts.push(AttemptRecord {
                                model: label,
                                calls: outcome.calls,
                                outcome: AttemptOutcome::CallFailed(e.to_string()),
                            });
                            ChainState::NextModel(index)
                        }
                    }
                }
                ChainState::Validating { index, raw, calls } => {
                    let label = models[index].to_string();
                    match validate::validate_response(&raw, &self.settings.rules) {
                        Ok(analysis) => {
                            attempts.push(AttemptRecord {
                                model: label,
                                calls,
                                outcome: AttemptOutcome::Accepted,
                            });
                            ChainState::Accepted { index, analysis }
                        }
                        Err(rejection) => {
                            tracing::warn!(model = %label, reason = %rejection, "model output rejected");
                            attempts.push(AttemptRecord {
                                model: label,
                                calls,
                                outcome: AttemptOutcome::Rejected(rejection),
                            });
                            ChainState::NextModel(index)
                        }
                    }
                }
                ChainState::NextModel(index) => {
                    if index + 1 < models.len() {
                        ChainState::TryingModel(index + 1)
                    } else {
                        ChainState::Exhausted
                    }
                }
                ChainState::Accepted { index, analysis } => {
                    tracing::info!(
                        model = %models[index],
                        score = analysis.overall_score,
                        "analysis accepted"
                    );
                    return (Some((index, analysis)), attempts);
                }
                ChainState::Exhausted => return (None, attempts),
            };
        }
    }

    fn request_for(&self, spec: &ModelSpec, prompt: &ScoringPrompt) -> CompletionRequest {
        CompletionRequest {
            system: prompt.system.clone(),
            user: prompt.user.clone(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            json_mode: spec.provider.supports_json_mode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use crate::models::{Dimension, ProviderName};
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays a fixed script of responses and records which models were called.
    struct Scripted {
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        async fn complete(
            &self,
            model: &ModelSpec,
            _request: &CompletionRequest,
        ) -> Result<String, ProviderError> {
            self.calls.lock().unwrap().push(model.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::ApiError("script exhausted".into())))
        }
    }

    fn valid_json(score: u8, label: &str) -> String {
        let dims: serde_json::Map<String, serde_json::Value> = Dimension::all()
            .map(|d| {
                (
                    d.key().to_string(),
                    serde_json::json!({
                        "score": 7,
                        "justification": "The candidate's history lines up with this requirement."
                    }),
                )
            })
            .collect();
        serde_json::json!({
            "overallScore": score,
            "recommendation": label,
            "dimensions": dims,
            "strengths": ["one", "two", "three"],
            "gaps": ["four", "five", "six"],
            "redFlags": []
        })
        .to_string()
    }

    fn settings(models: &[&str]) -> EngineSettings {
        EngineSettings {
            models: models.iter().map(|m| m.parse().unwrap()).collect(),
            retry: RetryPolicy {
                max_retries: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
            ..EngineSettings::default()
        }
    }

    fn job() -> Job {
        Job {
            title: "Backend Engineer".into(),
            company: "Acme".into(),
            required_skills: vec!["Rust".into()],
            ..Job::default()
        }
    }

    fn engine(provider: Arc<Scripted>, models: &[&str]) -> ScoringEngine {
        ScoringEngine::new(
            provider,
            CacheEngine::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600)),
            settings(models),
        )
    }

    #[test]
    fn settings_follow_config() {
        let mut config = Config::default();
        config.engine.min_justification_chars = 12;
        config.retry.max_retries = 0;
        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.rules.min_justification_chars, 12);
        assert_eq!(settings.prompt.min_justification_chars, 12);
        assert_eq!(settings.retry.max_retries, 0);
        assert_eq!(settings.models[0].provider, ProviderName::OpenAI);
    }

    #[tokio::test]
    async fn first_valid_wins() {
        let provider = Arc::new(Scripted::new(vec![
            Ok(valid_json(80, "Strong Match")),
            Ok(valid_json(20, "Weak Match")),
        ]));
        let engine = engine(provider.clone(), &["openai:a", "anthropic:b"]);

        let report = engine
            .analyze_with_report(&job(), &CandidateRecord::default(), AnalyzeOptions::default())
            .await
            .unwrap();

        assert_eq!(report.analysis.unwrap().overall_score, 80);
        assert_eq!(report.model.as_deref(), Some("openai:a"));
        assert_eq!(report.source, Some(AnalysisSource::Model));
        assert_eq!(provider.calls(), vec!["openai:a"]);
    }

    #[tokio::test]
    async fn rejected_output_advances_without_retry() {
        let provider = Arc::new(Scripted::new(vec![
            Ok("not json at all".into()),
            Ok(valid_json(55, "Possible Match")),
        ]));
        let engine = engine(provider.clone(), &["openai:a", "anthropic:b"]);

        let report = engine
            .analyze_with_report(&job(), &CandidateRecord::default(), AnalyzeOptions::default())
            .await
            .unwrap();

        assert_eq!(provider.calls(), vec!["openai:a", "anthropic:b"]);
        assert_eq!(report.model.as_deref(), Some("anthropic:b"));
        assert_eq!(report.attempts.len(), 2);
        assert!(matches!(
            report.attempts[0].outcome,
            AttemptOutcome::Rejected(Rejection::MalformedJson { .. })
        ));
        assert_eq!(report.attempts[0].calls, 1);
        assert_eq!(report.attempts[1].outcome, AttemptOutcome::Accepted);
    }

    #[tokio::test]
    async fn permanent_call_failure_advances() {
        let provider = Arc::new(Scripted::new(vec![
            Err(ProviderError::NotConfigured("no key".into())),
            Ok(valid_json(70, "Good Match")),
        ]));
        let engine = engine(provider.clone(), &["openai:a", "anthropic:b"]);

        let report = engine
            .analyze_with_report(&job(), &CandidateRecord::default(), AnalyzeOptions::default())
            .await
            .unwrap();

        assert_eq!(provider.calls(), vec!["openai:a", "anthropic:b"]);
        assert!(matches!(report.attempts[0].outcome, AttemptOutcome::CallFailed(_)));
        assert_eq!(report.analysis.unwrap().overall_score, 70);
    }

    #[tokio::test]
    async fn exhaustion_is_none() {
        let provider = Arc::new(Scripted::new(vec![
            Ok("{}".into()),
            Ok(valid_json(150, "Strong Match")),
        ]));
        let engine = engine(provider.clone(), &["openai:a", "anthropic:b"]);

        let result = engine.analyze(&job(), &CandidateRecord::default()).await.unwrap();
        assert!(result.is_none());
        assert_eq!(provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn empty_chain_is_exhausted() {
        let provider = Arc::new(Scripted::new(vec![]));
        let engine = engine(provider.clone(), &[]);
        let report = engine
            .analyze_with_report(&job(), &CandidateRecord::default(), AnalyzeOptions::default())
            .await
            .unwrap();
        assert!(!report.is_available());
        assert!(report.attempts.is_empty());
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_job_field_is_an_error() {
        let provider = Arc::new(Scripted::new(vec![]));
        let engine = engine(provider.clone(), &["openai:a"]);
        let bad = Job {
            title: "  ".into(),
            company: "Acme".into(),
            ..Job::default()
        };
        let err = engine.analyze(&bad, &CandidateRecord::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::Prompt(PromptError::MissingJobField("title"))));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn refresh_skips_cache_read() {
        let provider = Arc::new(Scripted::new(vec![
            Ok(valid_json(80, "Strong Match")),
            Ok(valid_json(62, "Good Match")),
        ]));
        let engine = engine(provider.clone(), &["openai:a"]);
        let key = engine.cache_key_for(&job(), &CandidateRecord::default()).unwrap();
        engine
            .cache
            .put_and_wait(&key, &validate::validate_response(&valid_json(10, "Weak Match"), &ValidationRules::default()).unwrap(), "openai:a")
            .await
            .unwrap();

        let cached = engine
            .analyze_with_report(&job(), &CandidateRecord::default(), AnalyzeOptions::default())
            .await
            .unwrap();
        assert_eq!(cached.source, Some(AnalysisSource::Cache));
        assert_eq!(cached.analysis.unwrap().overall_score, 10);
        assert!(provider.calls().is_empty());

        let fresh = engine
            .analyze_with_report(&job(), &CandidateRecord::default(), AnalyzeOptions { refresh: true })
            .await
            .unwrap();
        assert_eq!(fresh.source, Some(AnalysisSource::Model));
        assert_eq!(fresh.analysis.unwrap().overall_score, 80);
    }

    #[tokio::test]
    async fn invalidate_drops_entry() {
        let provider = Arc::new(Scripted::new(vec![]));
        let engine = engine(provider, &["openai:a"]);
        assert!(!engine.invalidate(&job(), &CandidateRecord::default()).await.unwrap());

        let key = engine.cache_key_for(&job(), &CandidateRecord::default()).unwrap();
        let analysis = validate::validate_response(&valid_json(50, "Possible Match"), &ValidationRules::default()).unwrap();
        engine.cache.put_and_wait(&key, &analysis, "m").await.unwrap();
        assert!(engine.invalidate(&job(), &CandidateRecord::default()).await.unwrap());
    }

    #[tokio::test]
    async fn finished_write_back_is_readable() {
        let provider = Arc::new(Scripted::new(vec![Ok(valid_json(71, "Good Match"))]));
        let engine = engine(provider, &["openai:a"]);

        let mut report = engine
            .analyze_with_report(&job(), &CandidateRecord::default(), AnalyzeOptions::default())
            .await
            .unwrap();
        report.finish_write_back().await;

        let key = engine.cache_key_for(&job(), &CandidateRecord::default()).unwrap();
        assert_eq!(key, report.cache_key);
        let entry = engine.cache.get(&key).await.unwrap();
        assert_eq!(entry.analysis.overall_score, 71);
        assert_eq!(entry.model, "openai:a");
    }

    #[tokio::test]
    async fn exhausted_chain_has_no_write_back() {
        let provider = Arc::new(Scripted::new(vec![Ok("nope".into())]));
        let engine = engine(provider, &["openai:a"]);
        let report = engine
            .analyze_with_report(&job(), &CandidateRecord::default(), AnalyzeOptions::default())
            .await
            .unwrap();
        assert!(!report.is_available());
        assert!(report.write_back.is_none());
    }

    #[test]
    fn json_mode_follows_provider() {
        let provider = Arc::new(Scripted::new(vec![]));
        let engine = engine(provider, &["openai:a"]);
        let prompt = prompt::build_prompt(&job(), &CandidateRecord::default(), &PromptOptions::default()).unwrap();
        let openai = engine.request_for(&"openai:a".parse().unwrap(), &prompt);
        let anthropic = engine.request_for(&"anthropic:b".parse().unwrap(), &prompt);
        assert!(openai.json_mode);
        assert!(!anthropic.json_mode);
        assert_eq!(openai.temperature, crate::constants::DEFAULT_TEMPERATURE);
    }
}
