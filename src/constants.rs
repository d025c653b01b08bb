//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and built-in defaults so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "fitscore";

/// Crate version baked in at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compilation target triple (exported by `build.rs`).
pub const TARGET: &str = env!("TARGET");

/// Local config filename (e.g. `.fitscore.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".fitscore.toml";

/// Directory name under `~/.config/` for global config and cache.
pub const CONFIG_DIR: &str = "fitscore";

/// Footer printed under every rendered analysis.
pub const AI_DISCLOSURE: &str =
    "Scores are produced by a language model and may vary between runs.";

// ── Engine defaults ─────────────────────────────────────────────────

/// Minimum characters of a dimension justification.
pub const DEFAULT_MIN_JUSTIFICATION_CHARS: usize = 30;

/// Input ceiling applied to the candidate document before hashing and prompting.
pub const DEFAULT_PROMPT_CHAR_LIMIT: usize = 8_000;

/// Sampling temperature for scoring calls.
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Output token budget: ten justifications plus summary fields.
pub const DEFAULT_MAX_TOKENS: u64 = 2_048;

/// Additional attempts after the first call fails transiently.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;

/// Fast cache entry lifetime.
pub const DEFAULT_CACHE_TTL_DAYS: u64 = 30;

// ── Environment variable names ──────────────────────────────────────

pub const ENV_MODELS: &str = "FITSCORE_MODELS";
pub const ENV_API_KEY: &str = "FITSCORE_API_KEY";
pub const ENV_BASE_URL: &str = "FITSCORE_BASE_URL";
pub const ENV_CACHE_DIR: &str = "FITSCORE_CACHE_DIR";
pub const ENV_CACHE_TTL_DAYS: &str = "FITSCORE_CACHE_TTL_DAYS";
pub const ENV_MAX_RETRIES: &str = "FITSCORE_MAX_RETRIES";
pub const ENV_MIN_JUSTIFICATION: &str = "FITSCORE_MIN_JUSTIFICATION";
pub const ENV_LOG: &str = "FITSCORE_LOG";
