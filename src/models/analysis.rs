//! The scoring output contract.
//!
//! A [`CompatibilityAnalysis`] only ever comes out of
//! [`crate::validate::validate_response`] (or back out of the cache after
//! having passed it once), so every instance satisfies the range and
//! cardinality rules enforced there.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Number of entries required in `strengths` and in `gaps`.
pub const SUMMARY_ENTRIES: usize = 3;

/// Inclusive bounds of the overall score.
pub const OVERALL_SCORE_RANGE: std::ops::RangeInclusive<i64> = 0..=100;

/// Inclusive bounds of a per-dimension score.
pub const DIMENSION_SCORE_RANGE: std::ops::RangeInclusive<i64> = 1..=10;

/// The ten fixed scoring dimensions.
///
/// Declaration order is the order used in prompts and rendered output.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Dimension {
    SkillMatch,
    IndustryMatch,
    ExperienceLevel,
    LocationMatch,
    Seniority,
    Education,
    SoftSkills,
    EmploymentStability,
    GrowthPotential,
    CompanyScaleAlignment,
}

impl Dimension {
    /// JSON key of this dimension (`skillMatch`, `industryMatch`, …).
    pub fn key(self) -> &'static str {
        self.into()
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Dimension::SkillMatch => "Skill match",
            Dimension::IndustryMatch => "Industry match",
            Dimension::ExperienceLevel => "Experience level",
            Dimension::LocationMatch => "Location match",
            Dimension::Seniority => "Seniority",
            Dimension::Education => "Education & certifications",
            Dimension::SoftSkills => "Soft skills & leadership",
            Dimension::EmploymentStability => "Employment stability",
            Dimension::GrowthPotential => "Growth potential",
            Dimension::CompanyScaleAlignment => "Company scale alignment",
        }
    }

    /// What the model should weigh when scoring this dimension.
    pub fn rubric(self) -> &'static str {
        match self {
            Dimension::SkillMatch => {
                "overlap between the candidate's skills and the required/preferred skills"
            }
            Dimension::IndustryMatch => {
                "whether past employers and domains resemble the hiring company's industry"
            }
            Dimension::ExperienceLevel => {
                "years of relevant experience against the stated experience level"
            }
            Dimension::LocationMatch => {
                "candidate location versus job location and remote policy"
            }
            Dimension::Seniority => "scope and titles of past roles versus the role's seniority",
            Dimension::Education => "degrees and certifications relevant to the role",
            Dimension::SoftSkills => {
                "evidence of communication, collaboration, mentoring, or leadership"
            }
            Dimension::EmploymentStability => "tenure pattern and unexplained gaps across roles",
            Dimension::GrowthPotential => "trajectory of responsibilities and learning over time",
            Dimension::CompanyScaleAlignment => {
                "size and stage of past employers versus the hiring company"
            }
        }
    }

    /// All ten dimensions in canonical order.
    pub fn all() -> impl Iterator<Item = Dimension> {
        Dimension::iter()
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Categorical verdict. The label set is a fixed contract with callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString)]
pub enum Recommendation {
    #[serde(rename = "Strong Match")]
    #[strum(serialize = "Strong Match")]
    StrongMatch,
    #[serde(rename = "Good Match")]
    #[strum(serialize = "Good Match")]
    GoodMatch,
    #[serde(rename = "Possible Match")]
    #[strum(serialize = "Possible Match")]
    PossibleMatch,
    #[serde(rename = "Weak Match")]
    #[strum(serialize = "Weak Match")]
    WeakMatch,
}

impl Recommendation {
    pub fn label(self) -> &'static str {
        match self {
            Recommendation::StrongMatch => "Strong Match",
            Recommendation::GoodMatch => "Good Match",
            Recommendation::PossibleMatch => "Possible Match",
            Recommendation::WeakMatch => "Weak Match",
        }
    }

    /// Exact, case-sensitive label lookup.
    pub fn from_label(label: &str) -> Option<Self> {
        label.parse().ok()
    }

    /// Every label, quoted, for prompt text and error messages.
    pub fn quoted_labels() -> String {
        Recommendation::iter()
            .map(|r| format!("\"{}\"", r.label()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Score and reasoning for one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// 1–10 inclusive.
    pub score: u8,
    pub justification: String,
}

/// A fully validated compatibility assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityAnalysis {
    /// 0–100 inclusive.
    pub overall_score: u8,
    pub recommendation: Recommendation,
    /// Exactly one entry per [`Dimension`], in canonical order.
    pub dimensions: IndexMap<Dimension, DimensionScore>,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

impl CompatibilityAnalysis {
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionScore> {
        self.dimensions.get(&dimension)
    }
}
