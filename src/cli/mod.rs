//! CLI command definitions, argument parsing, and input file loading.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use fitscore::models::{CandidateRecord, Job};

/// Read and deserialize a JSON input file.
fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {what} file {}", path.display()))
}

/// Load the job and candidate records named by `pair`.
pub fn load_pair(pair: &args::PairArgs) -> Result<(Job, CandidateRecord)> {
    let job = read_json(&pair.job, "job")?;
    let candidate = read_json(&pair.candidate, "candidate")?;
    Ok((job, candidate))
}
