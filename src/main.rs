//! fitscore — job/candidate compatibility scoring CLI.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use fitscore::cache;
use fitscore::config;
use fitscore::constants;
use fitscore::engine;
use fitscore::env;
use fitscore::prompt;
use fitscore::providers;
use fitscore::validate;

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cache::store::FileStore;
use cache::CacheEngine;
use cli::args::{AnalyzeArgs, CacheAction, Cli, Command, PairArgs, ValidateArgs};
use config::Config;
use engine::{AnalyzeOptions, EngineSettings, ScoringEngine};
use env::Env;
use providers::rig::RigProvider;

/// Exit code when every model in the chain failed.
const EXIT_UNAVAILABLE: i32 = 2;

#[tokio::main]
async fn main() {
    init_tracing();

    match run().await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

/// Log to stderr, filtered by `FITSCORE_LOG` (default: warnings only).
fn init_tracing() {
    let filter = EnvFilter::try_from_env(constants::ENV_LOG)
        .unwrap_or_else(|_| EnvFilter::new(format!("{}=warn", constants::APP_NAME)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let dir = cli.path.as_path();

    match cli.command {
        Command::Analyze(args) => run_analyze(dir, args).await,
        Command::Validate(args) => run_validate(dir, args),
        Command::Key(pair) => run_key(dir, &pair),
        Command::Prompt(pair) => run_prompt(dir, &pair),
        Command::Cache { action } => run_cache(dir, action).await,
        Command::Version => run_version(),
    }
}

fn load_config(dir: &Path) -> Result<Config> {
    Config::load(Some(dir), &Env::real()).context("failed to load configuration")
}

/// File-backed store at the configured location.
fn file_store(config: &Config) -> FileStore {
    match config.cache_dir() {
        Some(dir) => FileStore::new_with_dir(dir),
        None => FileStore::new(),
    }
}

fn build_cache(config: &Config) -> CacheEngine {
    if !config.cache.enabled {
        return CacheEngine::disabled();
    }
    CacheEngine::new(Arc::new(file_store(config)), config.cache.ttl())
}

/// Score a candidate against a job.
async fn run_analyze(dir: &Path, args: AnalyzeArgs) -> Result<i32> {
    let env = Env::real();
    let mut config = load_config(dir)?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let (job, candidate) = cli::load_pair(&args.pair)?;

    let provider = RigProvider::from_config(&config, &env)
        .context("failed to initialize LLM provider")?;
    let engine = ScoringEngine::new(
        Arc::new(provider),
        build_cache(&config),
        EngineSettings::from_config(&config),
    );

    let mut report = engine
        .analyze_with_report(
            &job,
            &candidate,
            AnalyzeOptions {
                refresh: args.refresh,
            },
        )
        .await?;

    print!("{}", args.format.render(&report));
    // The runtime stops with `process::exit`, so flush the cache write first.
    report.finish_write_back().await;

    if report.is_available() {
        Ok(0)
    } else {
        Ok(EXIT_UNAVAILABLE)
    }
}

/// Validate a saved model response.
fn run_validate(dir: &Path, args: ValidateArgs) -> Result<i32> {
    use colored::Colorize;

    let config = load_config(dir)?;
    let rules = validate::ValidationRules {
        min_justification_chars: args
            .min_justification
            .unwrap_or(config.engine.min_justification_chars),
    };

    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    match validate::validate_response(&raw, &rules) {
        Ok(analysis) => {
            println!(
                "  {} {}  {}",
                "✔".green().bold(),
                format!("{}/100", analysis.overall_score).bold(),
                analysis.recommendation.label().dimmed(),
            );
            println!(
                "         {}  {}",
                "red flags:".cyan(),
                analysis.red_flags.len()
            );
            Ok(0)
        }
        Err(rejection) => {
            bail!(
                "{} {}",
                "✖".red().bold(),
                format!("Invalid response: {rejection}").red()
            );
        }
    }
}

/// Print the cache key for a pair.
fn run_key(dir: &Path, pair: &PairArgs) -> Result<i32> {
    let config = load_config(dir)?;
    let (job, candidate) = cli::load_pair(pair)?;
    let limit = config.engine.prompt_char_limit;
    let document = prompt::render_document(&job, &candidate, limit)?;
    println!("{}", cache::cache_key(&document, limit));
    Ok(0)
}

/// Print the messages the models would receive.
fn run_prompt(dir: &Path, pair: &PairArgs) -> Result<i32> {
    use colored::Colorize;

    let config = load_config(dir)?;
    let (job, candidate) = cli::load_pair(pair)?;
    let settings = EngineSettings::from_config(&config);
    let built = prompt::build_prompt(&job, &candidate, &settings.prompt)?;

    println!("{}", "--- system ---".dimmed());
    println!("{}", built.system);
    println!("{}", "--- user ---".dimmed());
    println!("{}", built.user);
    Ok(0)
}

/// Manage the analysis cache.
async fn run_cache(dir: &Path, action: CacheAction) -> Result<i32> {
    let config = load_config(dir)?;
    let store = file_store(&config);

    match action {
        CacheAction::Clear => {
            let stats = store.clear().context("failed to clear cache")?;
            println!(
                "Cleared {} cached entry/entries ({}).",
                stats.entries,
                stats.human_size(),
            );
        }
        CacheAction::Stats => {
            let stats = store.stats().context("failed to read cache stats")?;
            println!("Cache entries: {}", stats.entries);
            println!("Cache size:    {}", stats.human_size());
            println!("Entry TTL:     {} days", config.cache.ttl_days);
        }
        CacheAction::Path => match store.path() {
            Some(p) => println!("{}", p.display()),
            None => bail!("cache directory could not be determined"),
        },
        CacheAction::Invalidate(pair) => {
            let (job, candidate) = cli::load_pair(&pair)?;
            let limit = config.engine.prompt_char_limit;
            let document = prompt::render_document(&job, &candidate, limit)?;
            let key = cache::cache_key(&document, limit);
            let cache = CacheEngine::new(Arc::new(store), config.cache.ttl());
            if cache
                .invalidate(&key)
                .await
                .context("failed to invalidate cache entry")?
            {
                println!("Removed cached analysis {key}.");
            } else {
                println!("No cached analysis for {key}.");
            }
        }
    }

    Ok(0)
}

/// Print detailed version and build information.
fn run_version() -> Result<i32> {
    use colored::Colorize;

    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    println!("{}     {}", "target:".dimmed(), constants::TARGET);
    Ok(0)
}
