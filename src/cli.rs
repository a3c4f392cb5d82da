//! Command-line interface argument parsing.
//!
//! Every run setting can come from a flag or an environment variable; values
//! left unset fall through to the config file and then to built-in defaults.

use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// SubPulse - sentiment snapshot of a subreddit's newest posts
///
/// Fetches recent posts, scores each one with an OpenAI-compatible model,
/// and publishes posts.json, summary.json and wordfreq.json for a static
/// dashboard.
///
/// Examples:
///   OPENAI_API_KEY=sk-... subpulse
///   subpulse --subreddit GlobalOffensive --post-limit 100 --max-age-hours 24
///   subpulse --dry-run
///   subpulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Subreddit to sample, without the r/ prefix
    #[arg(short, long, env = "SUBREDDIT", value_name = "NAME")]
    pub subreddit: Option<String>,

    /// Maximum number of posts per run
    #[arg(short = 'n', long, env = "POST_LIMIT", value_name = "COUNT")]
    pub post_limit: Option<Unset<usize>>,

    /// Skip posts older than this many hours (0 keeps everything)
    #[arg(long, env = "MAX_AGE_HOURS", value_name = "HOURS")]
    pub max_age_hours: Option<Unset<u64>>,

    /// API key for the analysis service
    ///
    /// Required unless --dry-run is used. Never written to any output.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, value_name = "KEY")]
    pub api_key: Option<ApiKey>,

    /// Chat model used for scoring
    #[arg(short, long, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// Root of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Directory the artifacts are published to
    #[arg(short, long, env = "SUBPULSE_OUTPUT_DIR", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of concurrent scoring calls
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Wall-clock budget for fetching and scoring, in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub run_timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .subpulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: fetch and list posts without scoring or writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .subpulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// A credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl FromStr for ApiKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// A number that may be given as an empty string.
///
/// Schedulers and CI templates often export `POST_LIMIT=` with no value;
/// that reads as "not set" rather than as a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unset<T>(Option<T>);

impl<T> Unset<T> {
    pub fn value(self) -> Option<T> {
        self.0
    }
}

impl<T> FromStr for Unset<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self(None));
        }
        trimmed
            .parse()
            .map(|v| Self(Some(v)))
            .map_err(|e| format!("invalid number '{}': {}", trimmed, e))
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The API key, if one was given and is not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(ApiKey::expose)
            .filter(|key| !key.is_empty())
    }

    pub fn post_limit(&self) -> Option<usize> {
        self.post_limit.and_then(Unset::value)
    }

    pub fn max_age_hours(&self) -> Option<u64> {
        self.max_age_hours.and_then(Unset::value)
    }

    /// Validate the parsed arguments.
    ///
    /// Settings that may also come from the config file are checked after
    /// merging, in `Config::validate`.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if !self.dry_run && self.api_key().is_none() {
            return Err(
                "OPENAI_API_KEY is missing. Set it in the environment or pass --api-key."
                    .to_string(),
            );
        }

        if self.post_limit() == Some(0) {
            return Err("Post limit must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
