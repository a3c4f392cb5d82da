//! Configuration file handling.
//!
//! Settings come from `.subpulse.toml` (or `--config`), then CLI flags and
//! environment variables override them. The API key is deliberately absent
//! here: it is only ever taken from the command line or the environment.

use crate::analysis::{AggregateOptions, Tokenizer};
use crate::pipeline::{RunSettings, DEFAULT_RUN_TIMEOUT};
use crate::reddit::{FetchOptions, RetryPolicy};
use crate::scoring::{OpenAiSettings, ScorerOptions};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".subpulse.toml";

/// Longest accepted age window, in hours (about a century).
const MAX_AGE_HOURS_LIMIT: u64 = 876_000;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub reddit: RedditConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Run-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Budget for fetch, score and aggregate. 0 disables it.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Words ignored by the word-frequency table on top of the built-in list.
    #[serde(default)]
    pub extra_stop_words: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            run_timeout_seconds: default_run_timeout(),
            verbose: false,
            extra_stop_words: Vec::new(),
        }
    }
}

fn default_run_timeout() -> u64 {
    DEFAULT_RUN_TIMEOUT.as_secs()
}

/// Listing fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default = "default_subreddit")]
    pub subreddit: String,

    /// Maximum posts per run.
    #[serde(default = "default_post_limit")]
    pub post_limit: usize,

    /// Skip posts older than this many hours. Unset or 0 keeps everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_hours: Option<u64>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Pause between listing pages.
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            subreddit: default_subreddit(),
            post_limit: default_post_limit(),
            max_age_hours: None,
            user_agent: default_user_agent(),
            page_delay_ms: default_page_delay(),
            timeout_seconds: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

fn default_subreddit() -> String {
    "CallOfDutyMobile".to_string()
}

fn default_post_limit() -> usize {
    50
}

fn default_user_agent() -> String {
    concat!(
        "subpulse/",
        env!("CARGO_PKG_VERSION"),
        " (subreddit sentiment snapshot)"
    )
    .to_string()
}

fn default_page_delay() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_retry_base_delay() -> u64 {
    RetryPolicy::default().base_delay.as_millis() as u64
}

fn default_retry_max_delay() -> u64 {
    RetryPolicy::default().max_delay.as_millis() as u64
}

/// Analysis service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub name: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,

    /// Maximum in-flight scoring calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Body characters sent per post.
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,

    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            base_url: default_base_url(),
            timeout_seconds: default_request_timeout(),
            concurrency: default_concurrency(),
            max_body_chars: default_max_body_chars(),
            max_completion_tokens: default_max_completion_tokens(),
        }
    }
}

fn default_model() -> String {
    crate::scoring::openai::DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    crate::scoring::openai::DEFAULT_BASE_URL.to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_max_body_chars() -> usize {
    crate::scoring::scorer::DEFAULT_MAX_BODY_CHARS
}

fn default_max_completion_tokens() -> u32 {
    250
}

/// Published artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the dashboard reads from.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_wordfreq_limit")]
    pub wordfreq_limit: usize,

    #[serde(default = "default_top_items_limit")]
    pub top_items_limit: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            wordfreq_limit: default_wordfreq_limit(),
            top_items_limit: default_top_items_limit(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_wordfreq_limit() -> usize {
    crate::analysis::wordfreq::DEFAULT_WORDFREQ_LIMIT
}

fn default_top_items_limit() -> usize {
    crate::analysis::aggregator::DEFAULT_TOP_ITEMS_LIMIT
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Apply CLI flags and environment variables on top of the file.
    ///
    /// Only values that were actually given override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref subreddit) = args.subreddit {
            self.reddit.subreddit = subreddit.trim().to_string();
        }
        if let Some(limit) = args.post_limit() {
            self.reddit.post_limit = limit;
        }
        if let Some(hours) = args.max_age_hours() {
            self.reddit.max_age_hours = Some(hours);
        }
        if let Some(timeout) = args.timeout {
            self.reddit.timeout_seconds = timeout;
            self.model.timeout_seconds = timeout;
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref base_url) = args.api_base_url {
            self.model.base_url = base_url.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.model.concurrency = concurrency;
        }

        if let Some(ref dir) = args.output_dir {
            self.output.dir = dir.clone();
        }

        if let Some(run_timeout) = args.run_timeout {
            self.general.run_timeout_seconds = run_timeout;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the merged settings.
    pub fn validate(&self) -> Result<()> {
        validate_subreddit(&self.reddit.subreddit)?;

        if self.reddit.post_limit == 0 {
            bail!("Post limit must be at least 1");
        }
        if let Some(hours) = self.reddit.max_age_hours {
            if hours > MAX_AGE_HOURS_LIMIT {
                bail!("Max age must be at most {} hours", MAX_AGE_HOURS_LIMIT);
            }
        }
        if self.reddit.retry_attempts == 0 {
            bail!("Retry attempts must be at least 1");
        }
        if self.reddit.timeout_seconds == 0 || self.model.timeout_seconds == 0 {
            bail!("Timeout must be at least 1 second");
        }
        if self.model.concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }
        if !self.model.base_url.starts_with("http://") && !self.model.base_url.starts_with("https://")
        {
            bail!("API base URL must start with 'http://' or 'https://'");
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.reddit.retry_attempts,
            base_delay: Duration::from_millis(self.reddit.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.reddit.retry_max_delay_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            subreddit: self.reddit.subreddit.clone(),
            limit: self.reddit.post_limit,
            max_age: self
                .reddit
                .max_age_hours
                .filter(|hours| *hours > 0)
                .map(|hours| chrono::Duration::hours(hours as i64)),
            page_delay: Duration::from_millis(self.reddit.page_delay_ms),
            retry: self.retry_policy(),
        }
    }

    pub fn scorer_options(&self) -> ScorerOptions {
        ScorerOptions {
            subreddit: self.reddit.subreddit.clone(),
            concurrency: self.model.concurrency,
            max_body_chars: self.model.max_body_chars,
        }
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            top_items_limit: self.output.top_items_limit,
            wordfreq_limit: self.output.wordfreq_limit,
            tokenizer: Tokenizer::new(&self.general.extra_stop_words),
            ..AggregateOptions::new(self.reddit.subreddit.clone())
        }
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            fetch: self.fetch_options(),
            aggregate: self.aggregate_options(),
            run_timeout: match self.general.run_timeout_seconds {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    pub fn openai_settings(&self, api_key: String) -> OpenAiSettings {
        OpenAiSettings {
            api_key,
            model: self.model.name.clone(),
            base_url: self.model.base_url.clone(),
            timeout: Duration::from_secs(self.model.timeout_seconds),
            max_completion_tokens: self.model.max_completion_tokens,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Subreddit names are 2 to 21 ASCII letters, digits or underscores.
fn validate_subreddit(name: &str) -> Result<()> {
    let len = name.chars().count();
    if !(2..=21).contains(&len) {
        bail!("Subreddit name must be 2 to 21 characters: {:?}", name);
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!(
            "Subreddit name may only contain letters, digits and underscores: {:?}",
            name
        );
    }
    Ok(())
}
