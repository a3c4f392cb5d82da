//! SubPulse - subreddit sentiment snapshot
//!
//! A CLI that fetches a subreddit's newest posts, scores each one with an
//! OpenAI-compatible model, and publishes JSON artifacts for a static
//! dashboard.
//!
//! Exit codes:
//!   0 - Snapshot published (or dry run / init-config completed)
//!   1 - Fatal error (invalid arguments, missing key, fetch or publish
//!       failure, time budget exceeded)

mod analysis;
mod cli;
mod config;
mod models;
mod pipeline;
mod reddit;
mod report;
mod scoring;
mod text;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use pipeline::RunSettings;
use reddit::RedditClient;
use report::console::{render_dry_run, render_summary};
use report::Publisher;
use scoring::{OpenAiAnalyzer, Scorer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let loaded = load_config(&args);
    init_logging(&args, loaded.as_ref().map(|c| c.general.verbose).unwrap_or(false));

    info!("SubPulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = match loaded {
        Ok(config) => run_snapshot(args, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .subpulse.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   The API key is not stored there; keep it in OPENAI_API_KEY.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity flags when set.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = if config_verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Fetch, score, aggregate and publish one snapshot.
async fn run_snapshot(args: Args, mut config: Config) -> Result<()> {
    config.merge_with_args(&args);
    config.validate()?;

    let settings = config.run_settings();
    let client = RedditClient::new(
        &config.reddit.user_agent,
        Duration::from_secs(config.reddit.timeout_seconds),
    )?;

    // Handle --dry-run: fetch and list, no scoring, no writes
    if args.dry_run {
        return handle_dry_run(&settings, &client).await;
    }

    let api_key = args
        .api_key()
        .context("OPENAI_API_KEY is missing. Set it in the environment or pass --api-key.")?;
    let analyzer = OpenAiAnalyzer::new(config.openai_settings(api_key.to_string()))?;

    if !args.quiet {
        println!("📥 Fetching r/{} newest posts...", config.reddit.subreddit);
        println!("   Limit: {}", config.reddit.post_limit);
        if let Some(hours) = config.reddit.max_age_hours.filter(|h| *h > 0) {
            println!("   Max age: {}h", hours);
        }
        println!("🤖 Scoring with {}", config.model.name);
    }

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        create_progress_bar()
    };
    let scorer = Scorer::new(Arc::new(analyzer), config.scorer_options()).with_progress(progress);
    let publisher = Publisher::new(&config.output.dir);

    let outcome = pipeline::run(&settings, &client, &scorer, &publisher).await?;

    if !args.quiet {
        print!("{}", render_summary(&outcome.summary, outcome.fallbacks));
        println!("   Duration: {:.1}s", outcome.duration.as_secs_f64());
        println!("\n✅ Snapshot published:");
        for path in outcome.artifacts.paths() {
            println!("   {}", path.display());
        }
    }

    Ok(())
}

/// Handle --dry-run: fetch posts, print what would be scored, exit.
async fn handle_dry_run(settings: &RunSettings, client: &RedditClient) -> Result<()> {
    println!(
        "\n🔍 Dry run: fetching r/{} (no analysis calls)...",
        settings.fetch.subreddit
    );

    let posts = pipeline::collect_posts(settings, client, Utc::now()).await?;
    print!("{}", render_dry_run(&settings.fetch.subreddit, &posts));
    Ok(())
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => debug!("Falling back to the default progress style: {}", e),
    }
    pb
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            // logging is not up yet
            eprintln!(
                "⚠️  Failed to load {}: {:#}. Using defaults.",
                DEFAULT_CONFIG_FILE, e
            );
            Ok(Config::default())
        }
    }
}
