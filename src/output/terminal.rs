//! Terminal renderer: styled flowing text, one line per dimension.

use colored::Colorize;

use crate::engine::{AnalysisReport, AnalysisSource, AttemptOutcome};
use crate::models::{CompatibilityAnalysis, Recommendation};
use crate::output::OutputRenderer;

/// Terminal output renderer with colored, flowing text.
pub struct TerminalRenderer;

impl OutputRenderer for TerminalRenderer {
    fn render(&self, report: &AnalysisReport) -> String {
        let Some(analysis) = &report.analysis else {
            return render_unavailable(report);
        };

        let mut output = String::new();
        output.push_str(&format!(
            " {} {}  {}\n\n",
            format!("{:>3}/100", analysis.overall_score).bold(),
            recommendation_label(analysis.recommendation),
            provenance(report).dimmed(),
        ));

        for (dimension, score) in &analysis.dimensions {
            output.push_str(&format!(
                "   {} {} {}\n",
                score_bar(score.score),
                format!("{:<27}", dimension.label()).bold(),
                score.justification.trim(),
            ));
        }

        render_list(&mut output, "Strengths", "+".green().bold().to_string(), &analysis.strengths);
        render_list(&mut output, "Gaps", "-".yellow().bold().to_string(), &analysis.gaps);
        if !analysis.red_flags.is_empty() {
            render_list(&mut output, "Red flags", "!".red().bold().to_string(), &analysis.red_flags);
        }

        output.push_str(&format!("\n{}\n", "───────────────────────────────────".dimmed()));
        output.push_str(&format!(" {}\n", summary_line(analysis)));
        output.push_str(&format!(
            " {}\n",
            crate::constants::AI_DISCLOSURE.dimmed()
        ));

        output
    }
}

fn render_unavailable(report: &AnalysisReport) -> String {
    let mut output = format!(
        "  {} {}\n",
        "✖".red().bold(),
        "Analysis unavailable: no model produced a valid result.".bold()
    );
    for attempt in &report.attempts {
        let reason = match &attempt.outcome {
            AttemptOutcome::Accepted => continue,
            AttemptOutcome::Rejected(rejection) => format!("rejected: {rejection}"),
            AttemptOutcome::CallFailed(error) => format!("failed: {error}"),
        };
        output.push_str(&format!(
            "   {} {} {}\n",
            "→".cyan(),
            attempt.model.bold(),
            reason.dimmed()
        ));
    }
    output
}

fn render_list(output: &mut String, title: &str, bullet: String, entries: &[String]) {
    output.push_str(&format!("\n {}\n", title.bold()));
    for entry in entries {
        output.push_str(&format!("   {bullet} {entry}\n"));
    }
}

fn recommendation_label(recommendation: Recommendation) -> String {
    let label = recommendation.label();
    match recommendation {
        Recommendation::StrongMatch => label.green().bold().to_string(),
        Recommendation::GoodMatch => label.cyan().bold().to_string(),
        Recommendation::PossibleMatch => label.yellow().bold().to_string(),
        Recommendation::WeakMatch => label.red().bold().to_string(),
    }
}

fn provenance(report: &AnalysisReport) -> String {
    let model = report.model.as_deref().unwrap_or("unknown model");
    match (report.source, report.cached_at) {
        (Some(AnalysisSource::Cache), Some(at)) => {
            format!("{model}, cached {}", at.format("%Y-%m-%d"))
        }
        (Some(AnalysisSource::Cache), None) => format!("{model}, cached"),
        _ => model.to_string(),
    }
}

/// Ten-cell bar for a 1-10 score.
fn score_bar(score: u8) -> String {
    let filled = usize::from(score.min(10));
    let bar = format!("{}{}", "■".repeat(filled), "·".repeat(10 - filled));
    match score {
        8..=10 => bar.green().to_string(),
        5..=7 => bar.yellow().to_string(),
        _ => bar.red().to_string(),
    }
}

fn summary_line(analysis: &CompatibilityAnalysis) -> String {
    let flags = analysis.red_flags.len();
    format!(
        "{} {}, {} {}",
        flags.to_string().bold(),
        if flags == 1 { "red flag" } else { "red flags" },
        analysis.dimensions.len().to_string().bold(),
        "dimensions scored",
    )
}
