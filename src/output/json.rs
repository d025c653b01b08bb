//! JSON output renderer.
//!
//! Outputs `{"analysis": {...} | null, "meta": {...}}` format.

use crate::engine::{AnalysisReport, AttemptOutcome};
use crate::output::OutputRenderer;

/// JSON output renderer.
pub struct JsonRenderer;

impl OutputRenderer for JsonRenderer {
    fn render(&self, report: &AnalysisReport) -> String {
        let attempts: Vec<_> = report
            .attempts
            .iter()
            .map(|a| {
                let (outcome, reason) = match &a.outcome {
                    AttemptOutcome::Accepted => ("accepted", None),
                    AttemptOutcome::Rejected(r) => ("rejected", Some(r.to_string())),
                    AttemptOutcome::CallFailed(e) => ("failed", Some(e.clone())),
                };
                serde_json::json!({
                    "model": a.model,
                    "calls": a.calls,
                    "outcome": outcome,
                    "reason": reason,
                })
            })
            .collect();

        let output = serde_json::json!({
            "analysis": report.analysis,
            "meta": {
                "cacheKey": report.cache_key,
                "model": report.model,
                "source": report.source,
                "cachedAt": report.cached_at,
                "attempts": attempts,
            },
        });

        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }
}
