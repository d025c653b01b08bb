//! Clap argument types and CLI-layer config overrides.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use fitscore::config::Config;
use fitscore::engine::AnalysisReport;
use fitscore::models::ModelSpec;

/// Job/candidate compatibility scoring CLI.
#[derive(Parser, Debug)]
#[command(
    name = "fitscore",
    version = fitscore::constants::VERSION,
    about = "Score how well a candidate fits a job posting, using a chain of language models.",
)]
pub struct Cli {
    /// Directory holding `.fitscore.toml` (default: current directory).
    #[arg(long, global = true, default_value = ".")]
    pub path: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Score a candidate against a job posting.
    Analyze(AnalyzeArgs),

    /// Validate a saved model response against the analysis rules.
    Validate(ValidateArgs),

    /// Print the cache key for a job × candidate pair.
    Key(PairArgs),

    /// Print the prompt that would be sent to the models.
    Prompt(PairArgs),

    /// Manage the analysis cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print version and build information.
    Version,
}

/// A job file plus a candidate file.
#[derive(Parser, Debug, Clone)]
pub struct PairArgs {
    /// Job posting JSON file.
    #[arg(long)]
    pub job: PathBuf,

    /// Candidate JSON file (`profile`, `workExperience`, `education`, `skills`).
    #[arg(long)]
    pub candidate: PathBuf,
}

/// Arguments for the `analyze` subcommand.
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Output format.
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,

    /// Fallback chain as `provider:model`, primary first. Replaces the configured chain.
    #[arg(long = "model", value_name = "PROVIDER:MODEL", value_delimiter = ',')]
    pub models: Vec<ModelSpec>,

    /// Ignore any cached analysis and ask the models again.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,

    /// Disable result caching.
    #[arg(long, default_value_t = false, conflicts_with = "refresh")]
    pub no_cache: bool,

    /// Minimum characters per dimension justification.
    #[arg(long)]
    pub min_justification: Option<usize>,

    /// Additional attempts per model after a transient failure.
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl AnalyzeArgs {
    /// Apply CLI overrides on top of the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if !self.models.is_empty() {
            config.engine.models = self.models.clone();
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        if let Some(min) = self.min_justification {
            config.engine.min_justification_chars = min;
        }
        if let Some(retries) = self.max_retries {
            config.retry.max_retries = retries;
        }
    }
}

/// Arguments for the `validate` subcommand.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// File holding raw model output.
    pub file: PathBuf,

    /// Minimum characters per dimension justification.
    #[arg(long)]
    pub min_justification: Option<usize>,
}

/// Cache management subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum CacheAction {
    /// Remove all cached analyses.
    Clear,
    /// Show cache statistics (entry count and size).
    Stats,
    /// Print the cache directory path.
    Path,
    /// Remove the cached analysis for one job × candidate pair.
    Invalidate(PairArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Json,
}

impl OutputFormat {
    /// Render a report using the renderer for this format.
    pub fn render(&self, report: &AnalysisReport) -> String {
        use fitscore::output::OutputRenderer;
        match self {
            OutputFormat::Terminal => fitscore::output::terminal::TerminalRenderer.render(report),
            OutputFormat::Json => fitscore::output::json::JsonRenderer.render(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitscore::models::ProviderName;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fitscore").chain(args.iter().copied())).unwrap()
    }

    fn analyze_args(args: &[&str]) -> AnalyzeArgs {
        match parse(args).command {
            Command::Analyze(a) => a,
            other => panic!("expected analyze, got {other:?}"),
        }
    }

    #[test]
    fn analyze_defaults() {
        let args = analyze_args(&["analyze", "--job", "job.json", "--candidate", "c.json"]);
        assert_eq!(args.pair.job, PathBuf::from("job.json"));
        assert_eq!(args.format, OutputFormat::Terminal);
        assert!(args.models.is_empty());
        assert!(!args.refresh);
        assert!(!args.no_cache);
    }

    #[test]
    fn analyze_requires_both_files() {
        let result = Cli::try_parse_from(["fitscore", "analyze", "--job", "job.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn model_flag_parses_chain() {
        let args = analyze_args(&[
            "analyze",
            "--job",
            "j.json",
            "--candidate",
            "c.json",
            "--model",
            "anthropic:claude-3-5-haiku-latest,openai-compatible:llama3:8b",
            "--model",
            "groq:llama-3.1-8b-instant",
        ]);
        assert_eq!(args.models.len(), 3);
        assert_eq!(args.models[0].provider, ProviderName::Anthropic);
        assert_eq!(args.models[1].model, "llama3:8b");
        assert_eq!(args.models[2].provider, ProviderName::Groq);
    }

    #[test]
    fn model_flag_rejects_garbage() {
        let result = Cli::try_parse_from([
            "fitscore", "analyze", "--job", "j", "--candidate", "c", "--model", "gpt-4o",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn refresh_conflicts_with_no_cache() {
        let result = Cli::try_parse_from([
            "fitscore", "analyze", "--job", "j", "--candidate", "c", "--refresh", "--no-cache",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn apply_overrides_config() {
        let args = analyze_args(&[
            "analyze",
            "--job",
            "j",
            "--candidate",
            "c",
            "--model",
            "deepseek:deepseek-chat",
            "--no-cache",
            "--min-justification",
            "12",
            "--max-retries",
            "0",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.engine.models.len(), 1);
        assert_eq!(config.engine.models[0].provider, ProviderName::DeepSeek);
        assert!(!config.cache.enabled);
        assert_eq!(config.engine.min_justification_chars, 12);
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn apply_without_flags_keeps_config() {
        let args = analyze_args(&["analyze", "--job", "j", "--candidate", "c"]);
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.engine.models, Config::default().engine.models);
        assert!(config.cache.enabled);
    }

    #[test]
    fn cache_invalidate_takes_pair() {
        let cli = parse(&["cache", "invalidate", "--job", "j", "--candidate", "c"]);
        match cli.command {
            Command::Cache {
                action: CacheAction::Invalidate(pair),
            } => assert_eq!(pair.candidate, PathBuf::from("c")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn validate_takes_file() {
        let cli = parse(&["validate", "response.json", "--min-justification", "5"]);
        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.file, PathBuf::from("response.json"));
                assert_eq!(args.min_justification, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
