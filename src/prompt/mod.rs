//! Prompt construction for compatibility scoring.
//!
//! The job and candidate are rendered into one deterministic "candidate
//! document". That document is both the user message body and the input to
//! [`crate::cache::cache_key`]. Rendering is bounded per field and per
//! section, so a long job posting can never push the candidate out of the
//! text, and the key always describes exactly what the model saw.

use std::borrow::Cow;

use thiserror::Error;

use crate::models::analysis::SUMMARY_ENTRIES;
use crate::models::{CandidateRecord, Dimension, Job, Recommendation};

/// Appended to a section cut at its budget.
const SECTION_MARKER: &str = "\n[Section truncated]\n";

/// Input that cannot be rendered. This is a caller contract violation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("job is missing required field `{0}`")]
    MissingJobField(&'static str),
}

/// Knobs that shape the prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptOptions {
    /// Ceiling (in characters) applied to the candidate document.
    pub char_limit: usize,
    /// Minimum justification length the model is told to respect.
    pub min_justification_chars: usize,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            char_limit: crate::constants::DEFAULT_PROMPT_CHAR_LIMIT,
            min_justification_chars: crate::constants::DEFAULT_MIN_JUSTIFICATION_CHARS,
        }
    }
}

/// The role-tagged messages sent to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringPrompt {
    pub system: String,
    pub user: String,
    /// The bounded candidate document (cache key input).
    pub document: String,
    /// Whether any field or section was shortened to fit.
    pub truncated: bool,
}

/// Cut `text` to at most `limit` characters (Unicode scalar values).
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the system and user messages for one job × candidate pair.
pub fn build_prompt(
    job: &Job,
    candidate: &CandidateRecord,
    options: &PromptOptions,
) -> Result<ScoringPrompt, PromptError> {
    let (document, truncated) = render(job, candidate, options.char_limit)?;

    let mut user = String::with_capacity(document.len() + 512);
    user.push_str(&document);
    if truncated {
        user.push_str("\n\n[Input truncated]\n");
    }
    user.push_str(&format!(
        "\n## Task\n\n\
         Score how well the candidate above fits the \"{}\" role at {}. \
         Ground every justification in specific facts from the job posting and \
         the candidate's history; do not invent facts that are not present. \
         Respond with the JSON object only.\n",
        job.title.trim(),
        job.company.trim(),
    ));

    Ok(ScoringPrompt {
        system: build_system_prompt(options.min_justification_chars),
        user,
        document,
        truncated,
    })
}

/// Render the job and candidate in a fixed field order, within `char_limit`.
///
/// Missing optional fields render as fixed placeholders so that the same
/// records always yield byte-identical text. Long free-text fields are
/// clipped to a quarter of the limit each. The job section gets at most two
/// fifths of the limit and the candidate section gets the rest.
pub fn render_document(
    job: &Job,
    candidate: &CandidateRecord,
    char_limit: usize,
) -> Result<String, PromptError> {
    render(job, candidate, char_limit).map(|(document, _)| document)
}

fn render(
    job: &Job,
    candidate: &CandidateRecord,
    char_limit: usize,
) -> Result<(String, bool), PromptError> {
    if job.title.trim().is_empty() {
        return Err(PromptError::MissingJobField("title"));
    }
    if job.company.trim().is_empty() {
        return Err(PromptError::MissingJobField("company"));
    }

    let mut clip = Clipper::new(char_limit / 4);

    let job_section = bound_section(render_job(job, &mut clip), char_limit * 2 / 5, &mut clip);
    let remaining = char_limit.saturating_sub(job_section.chars().count());
    let candidate_section = bound_section(render_candidate(candidate, &mut clip), remaining, &mut clip);

    let mut doc = job_section;
    doc.push_str(&candidate_section);
    Ok((doc, clip.truncated))
}

/// Clips free-text fields and remembers whether it had to.
struct Clipper {
    field_limit: usize,
    truncated: bool,
}

impl Clipper {
    fn new(field_limit: usize) -> Self {
        Self {
            field_limit,
            truncated: false,
        }
    }

    fn clip<'a>(&mut self, text: &'a str) -> Cow<'a, str> {
        if text.chars().count() <= self.field_limit {
            return Cow::Borrowed(text);
        }
        self.truncated = true;
        let kept = truncate_chars(text, self.field_limit.saturating_sub(1));
        Cow::Owned(format!("{kept}…"))
    }
}

/// Cut a rendered section to `budget` characters, marker included.
fn bound_section(section: String, budget: usize, clip: &mut Clipper) -> String {
    if section.chars().count() <= budget {
        return section;
    }
    clip.truncated = true;
    let keep = budget.saturating_sub(SECTION_MARKER.chars().count());
    let mut out = truncate_chars(&section, keep).to_string();
    out.push_str(SECTION_MARKER);
    out
}

fn render_job(job: &Job, clip: &mut Clipper) -> String {
    let mut doc = String::new();

    doc.push_str("## Job Posting\n\n");
    doc.push_str(&format!("Title: {}\n", job.title.trim()));
    doc.push_str(&format!("Company: {}\n", job.company.trim()));
    doc.push_str(&format!(
        "Experience level: {}\n",
        or_unspecified(job.experience_level.as_deref())
    ));
    let location = or_unspecified(job.location.as_deref());
    match job.remote {
        Some(true) => doc.push_str(&format!("Location: {location} (remote allowed)\n")),
        Some(false) => doc.push_str(&format!("Location: {location} (on-site)\n")),
        None => doc.push_str(&format!("Location: {location}\n")),
    }
    doc.push_str(&format!("Industry: {}\n", or_unspecified(job.industry.as_deref())));
    doc.push_str(&format!(
        "Company size: {}\n",
        or_unspecified(job.company_size.as_deref())
    ));
    doc.push_str(&format!(
        "Employment type: {}\n",
        or_unspecified(job.employment_type.as_deref())
    ));
    doc.push_str(&format!("Required skills: {}\n", join_or_none(&job.required_skills)));
    doc.push_str(&format!("Preferred skills: {}\n", join_or_none(&job.preferred_skills)));
    let description = non_blank(&job.description)
        .map(|d| clip.clip(d))
        .unwrap_or(Cow::Borrowed("No description provided."));
    doc.push_str(&format!("\n### Description\n\n{description}\n\n"));

    doc
}

fn render_candidate(candidate: &CandidateRecord, clip: &mut Clipper) -> String {
    let mut doc = String::new();

    let profile = &candidate.profile;
    doc.push_str("## Candidate\n\n");
    doc.push_str(&format!(
        "Name: {}\n",
        profile.display_name().as_deref().unwrap_or("Not provided")
    ));
    doc.push_str(&format!("Headline: {}\n", or_unspecified(profile.headline.as_deref())));
    doc.push_str(&format!("Location: {}\n", or_unspecified(profile.location.as_deref())));
    let summary = profile
        .summary
        .as_deref()
        .and_then(non_blank)
        .map(|s| clip.clip(s))
        .unwrap_or(Cow::Borrowed("No summary provided."));
    doc.push_str(&format!("\n### Summary\n\n{summary}\n\n"));

    doc.push_str("### Work Experience\n\n");
    if candidate.work_experience.is_empty() {
        doc.push_str("None listed.\n");
    }
    for (i, role) in candidate.work_experience.iter().enumerate() {
        let start = role.start_date.as_deref().and_then(non_blank).unwrap_or("?");
        let end = if role.current {
            "Present"
        } else {
            role.end_date.as_deref().and_then(non_blank).unwrap_or("?")
        };
        doc.push_str(&format!(
            "{}. {} at {} ({start} – {end})",
            i + 1,
            role.title.trim(),
            role.company.trim()
        ));
        if let Some(loc) = role.location.as_deref().and_then(non_blank) {
            doc.push_str(&format!(", {loc}"));
        }
        doc.push('\n');
        if let Some(desc) = role.description.as_deref().and_then(non_blank) {
            doc.push_str(&format!("   {}\n", clip.clip(desc)));
        }
        for item in role.accomplishments.iter().filter_map(|a| non_blank(a)) {
            doc.push_str(&format!("   - {}\n", clip.clip(item)));
        }
    }

    doc.push_str("\n### Education\n\n");
    if candidate.education.is_empty() {
        doc.push_str("None listed.\n");
    }
    for edu in &candidate.education {
        let degree = match (
            edu.degree.as_deref().and_then(non_blank),
            edu.field_of_study.as_deref().and_then(non_blank),
        ) {
            (Some(d), Some(f)) => format!("{d} in {f}"),
            (Some(d), None) => d.to_string(),
            (None, Some(f)) => f.to_string(),
            (None, None) => "Studies".to_string(),
        };
        doc.push_str(&format!("- {degree}, {}", edu.institution.trim()));
        if let (Some(start), Some(end)) = (edu.start_date.as_deref(), edu.end_date.as_deref()) {
            doc.push_str(&format!(" ({start} – {end})"));
        } else if let Some(end) = edu.end_date.as_deref() {
            doc.push_str(&format!(" ({end})"));
        }
        if let Some(grade) = edu.grade.as_deref().and_then(non_blank) {
            doc.push_str(&format!(", grade {grade}"));
        }
        doc.push('\n');
    }

    doc.push_str("\n### Skills\n\n");
    if candidate.skills.is_empty() {
        doc.push_str("None listed.\n");
    }
    for skill in &candidate.skills {
        let mut details = Vec::new();
        if let Some(p) = skill.proficiency.as_deref().and_then(non_blank) {
            details.push(p.to_string());
        }
        if let Some(years) = skill.years_of_experience {
            details.push(format!("{years} years"));
        }
        if details.is_empty() {
            doc.push_str(&format!("- {}\n", skill.name.trim()));
        } else {
            doc.push_str(&format!("- {} ({})\n", skill.name.trim(), details.join(", ")));
        }
    }

    doc
}

/// Instructions shared by every scoring call.
fn build_system_prompt(min_justification_chars: usize) -> String {
    let mut prompt = String::from(
        "You are an experienced technical recruiter scoring how well a candidate \
         fits a job posting. Be specific, evidence-based and calibrated: a high \
         score requires concrete supporting evidence in the candidate's history.\n\n\
         ## Dimensions\n\n\
         Score each of these ten dimensions from 1 (poor fit) to 10 (excellent fit):\n\n",
    );
    for dimension in Dimension::all() {
        prompt.push_str(&format!(
            "- `{}` ({}): {}\n",
            dimension.key(),
            dimension.label(),
            dimension.rubric()
        ));
    }

    prompt.push_str(&format!(
        "\n## Output Format\n\n\
         Return a single JSON object and nothing else (no markdown, no prose) with exactly these fields:\n\
         - \"overallScore\": integer from 0 to 100\n\
         - \"recommendation\": MUST be exactly one of: {}\n\
         - \"dimensions\": an object with all ten keys above; each value is \
         {{\"score\": <integer 1-10>, \"justification\": \"<at least {min_justification_chars} characters citing concrete facts>\"}}\n\
         - \"strengths\": an array of exactly {SUMMARY_ENTRIES} short strings\n\
         - \"gaps\": an array of exactly {SUMMARY_ENTRIES} short strings\n\
         - \"redFlags\": an array of strings (empty if there are none)\n\n\
         Use \"Strong Match\" for overall scores of 75 and above, \"Good Match\" for 60-74, \
         \"Possible Match\" for 40-59 and \"Weak Match\" below 40.\n",
        Recommendation::quoted_labels(),
    ));

    prompt
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

fn or_unspecified(value: Option<&str>) -> &str {
    value.and_then(non_blank).unwrap_or("Not specified")
}

fn join_or_none(items: &[String]) -> String {
    let parts: Vec<&str> = items.iter().filter_map(|s| non_blank(s)).collect();
    if parts.is_empty() {
        "None listed".to_string()
    } else {
        parts.join(", ")
    }
}
