//! Job and candidate records supplied by the application's data layer.
//!
//! The engine assumes these were already validated and sanitised upstream;
//! it only renders them into prompt text.

use serde::{Deserialize, Serialize};

/// A job posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Job {
    pub title: String,
    pub company: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    /// e.g. "Entry", "Mid", "Senior", "Lead".
    pub experience_level: Option<String>,
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub industry: Option<String>,
    /// e.g. "Startup (11-50)", "Enterprise (10k+)".
    pub company_size: Option<String>,
    pub employment_type: Option<String>,
}

/// Candidate identity and self-description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
}

impl UserProfile {
    /// Full name, or `None` when both parts are blank.
    pub fn display_name(&self) -> Option<String> {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// One position in the candidate's work history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkExperience {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    /// Free-form date string as stored upstream (e.g. `2019-04`).
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub current: bool,
    pub description: Option<String>,
    pub accomplishments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub institution: String,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Skill {
    pub name: String,
    /// e.g. "beginner", "intermediate", "expert".
    pub proficiency: Option<String>,
    pub years_of_experience: Option<f32>,
}

/// Everything the engine needs to know about one candidate.
///
/// Also the on-disk format of `--candidate` files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateRecord {
    pub profile: UserProfile,
    pub work_experience: Vec<WorkExperience>,
    pub education: Vec<Education>,
    pub skills: Vec<Skill>,
}
