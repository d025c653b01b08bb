//! Output renderers: terminal and JSON.

pub mod json;
pub mod terminal;

use crate::engine::AnalysisReport;

/// Trait for rendering an analysis report to an output format.
pub trait OutputRenderer {
    /// Render the report to a string.
    fn render(&self, report: &AnalysisReport) -> String;
}
