//! Response validation for model output.
//!
//! Turns raw model text into a [`CompatibilityAnalysis`] or a [`Rejection`].
//! Rejections are ordinary outcomes of unreliable output, not errors; the
//! fallback chain reacts to them by moving on to the next model. The rules
//! are identical for every model.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::analysis::{DIMENSION_SCORE_RANGE, OVERALL_SCORE_RANGE, SUMMARY_ENTRIES};
use crate::models::{CompatibilityAnalysis, Dimension, DimensionScore, Recommendation};

/// Maximum length of model text echoed back in a rejection.
const PREVIEW_LEN: usize = 200;

/// Thresholds applied by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    /// Minimum characters (after trimming) of each dimension justification.
    pub min_justification_chars: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_justification_chars: crate::constants::DEFAULT_MIN_JUSTIFICATION_CHARS,
        }
    }
}

/// Why a model response was not accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("response is not valid JSON: {preview}")]
    MalformedJson { preview: String },

    #[error("response JSON is not an object")]
    NotAnObject,

    #[error("`overallScore` is missing")]
    MissingOverallScore,

    #[error("`overallScore` is not an integer: {0}")]
    NonIntegerOverallScore(String),

    #[error("`overallScore` {0} is outside 0-100")]
    OverallScoreOutOfRange(String),

    #[error("`recommendation` {0} is not one of the allowed labels")]
    UnknownRecommendation(String),

    #[error("`dimensions` object is missing")]
    MissingDimensions,

    #[error("dimension `{0}` is missing")]
    MissingDimension(Dimension),

    #[error("dimension `{dimension}` has an invalid score: {value}")]
    InvalidDimensionScore { dimension: Dimension, value: String },

    #[error("dimension `{dimension}` justification is {len} characters, need at least {min}")]
    ShortJustification {
        dimension: Dimension,
        len: usize,
        min: usize,
    },

    #[error("`{field}` must have exactly {expected} entries, found {found}")]
    WrongEntryCount {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("`{0}` must be an array of non-empty strings")]
    InvalidEntries(&'static str),
}

/// Validate raw model output against every structural and semantic rule.
pub fn validate_response(
    raw: &str,
    rules: &ValidationRules,
) -> Result<CompatibilityAnalysis, Rejection> {
    let value = parse_json_object(raw)?;
    validate_value(&value, rules)
}

/// Validate an already-parsed JSON value.
pub fn validate_value(
    value: &Value,
    rules: &ValidationRules,
) -> Result<CompatibilityAnalysis, Rejection> {
    let obj = value.as_object().ok_or(Rejection::NotAnObject)?;

    let overall_score = overall_score(obj)?;

    let recommendation = match obj.get("recommendation") {
        Some(Value::String(label)) => Recommendation::from_label(label)
            .ok_or_else(|| Rejection::UnknownRecommendation(format!("{label:?}")))?,
        Some(other) => return Err(Rejection::UnknownRecommendation(other.to_string())),
        None => return Err(Rejection::UnknownRecommendation("<missing>".to_string())),
    };

    let dims = obj
        .get("dimensions")
        .and_then(Value::as_object)
        .ok_or(Rejection::MissingDimensions)?;
    // Presence of all ten keys is checked before any per-dimension content.
    if let Some(missing) = Dimension::all().find(|d| !dims.contains_key(d.key())) {
        return Err(Rejection::MissingDimension(missing));
    }
    let mut dimensions = IndexMap::with_capacity(10);
    for dimension in Dimension::all() {
        let entry = &dims[dimension.key()];
        dimensions.insert(dimension, dimension_score(dimension, entry, rules)?);
    }

    let strengths = string_list(obj, "strengths")?;
    if strengths.len() != SUMMARY_ENTRIES {
        return Err(Rejection::WrongEntryCount {
            field: "strengths",
            expected: SUMMARY_ENTRIES,
            found: strengths.len(),
        });
    }
    let gaps = string_list(obj, "gaps")?;
    if gaps.len() != SUMMARY_ENTRIES {
        return Err(Rejection::WrongEntryCount {
            field: "gaps",
            expected: SUMMARY_ENTRIES,
            found: gaps.len(),
        });
    }
    let red_flags = match obj.get("redFlags") {
        None | Some(Value::Null) => Vec::new(),
        Some(_) => string_list(obj, "redFlags")?,
    };

    Ok(CompatibilityAnalysis {
        overall_score,
        recommendation,
        dimensions,
        strengths,
        gaps,
        red_flags,
    })
}

fn overall_score(obj: &Map<String, Value>) -> Result<u8, Rejection> {
    let raw = match obj.get("overallScore") {
        None | Some(Value::Null) => return Err(Rejection::MissingOverallScore),
        Some(v) => v,
    };
    let Value::Number(n) = raw else {
        return Err(Rejection::NonIntegerOverallScore(raw.to_string()));
    };
    if n.is_f64() {
        return Err(Rejection::NonIntegerOverallScore(n.to_string()));
    }
    match n.as_i64() {
        Some(score) if OVERALL_SCORE_RANGE.contains(&score) => Ok(score as u8),
        // Integers too large for i64 land here as well.
        _ => Err(Rejection::OverallScoreOutOfRange(n.to_string())),
    }
}

fn dimension_score(
    dimension: Dimension,
    entry: &Value,
    rules: &ValidationRules,
) -> Result<DimensionScore, Rejection> {
    let invalid = |value: String| Rejection::InvalidDimensionScore { dimension, value };

    let score = match entry.get("score") {
        Some(Value::Number(n)) if !n.is_f64() => match n.as_i64() {
            Some(s) if DIMENSION_SCORE_RANGE.contains(&s) => s as u8,
            _ => return Err(invalid(n.to_string())),
        },
        Some(other) => return Err(invalid(other.to_string())),
        None => return Err(invalid("<missing>".to_string())),
    };

    let justification = entry
        .get("justification")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    let len = justification.chars().count();
    if len < rules.min_justification_chars {
        return Err(Rejection::ShortJustification {
            dimension,
            len,
            min: rules.min_justification_chars,
        });
    }

    Ok(DimensionScore {
        score,
        justification: justification.to_string(),
    })
}

fn string_list(obj: &Map<String, Value>, field: &'static str) -> Result<Vec<String>, Rejection> {
    let Some(Value::Array(items)) = obj.get(field) else {
        return Err(Rejection::InvalidEntries(field));
    };
    items
        .iter()
        .map(|item| match item.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(Rejection::InvalidEntries(field)),
        })
        .collect()
}

/// Parse the first JSON object among the candidates extracted from `raw`.
///
/// Models occasionally wrap the object in a markdown fence or a sentence
/// of prose even when told not to; those wrappers are peeled off, but the
/// object itself must still parse. Candidates that parse to something other
/// than an object are skipped.
pub fn parse_json_object(raw: &str) -> Result<Value, Rejection> {
    let trimmed = raw.trim();
    let mut parsed_other = false;
    for candidate in extract_json_candidates(trimmed) {
        match serde_json::from_str::<Value>(&candidate) {
            Ok(value) if value.is_object() => return Ok(value),
            Ok(_) => parsed_other = true,
            Err(_) => {}
        }
    }
    if parsed_other {
        return Err(Rejection::NotAnObject);
    }
    Err(Rejection::MalformedJson {
        preview: trimmed.chars().take(PREVIEW_LEN).collect(),
    })
}

/// Regex for extracting content inside markdown code fences.
///
/// The closing ``` must appear at the start of a line so triple-backticks
/// inside JSON string values are not mistaken for the end of the block.
static FENCE_RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n```").expect("fence regex is valid")
});

/// Candidate JSON strings in priority order: the raw text, fenced blocks,
/// then the outermost `{...}` span.
fn extract_json_candidates(text: &str) -> Vec<String> {
    let mut candidates = vec![text.to_string()];

    for cap in FENCE_RE.captures_iter(text) {
        if let Some(inner) = cap.get(1) {
            let inner = inner.as_str().trim();
            if !inner.is_empty() {
                candidates.push(inner.to_string());
            }
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(text[start..=end].to_string());
        }
    }

    candidates
}
