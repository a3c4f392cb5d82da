//! One end-to-end run: fetch, score, aggregate, publish.
//!
//! Fetching, scoring and aggregation share a single wall-clock budget.
//! Publishing happens only once a complete snapshot exists, so any earlier
//! failure leaves the previously published artifacts exactly as they were.

use crate::analysis::{build_snapshot, AggregateOptions};
use crate::models::{format_timestamp, RawPost, Snapshot, Summary};
use crate::reddit::{fetch_recent_posts, FetchOptions, ListingSource};
use crate::report::{PublishedArtifacts, Publisher};
use crate::scoring::Scorer;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info};

/// Default wall-clock budget for fetch, score and aggregate.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(1800);

/// Parameters for a run that are not owned by a collaborator.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub fetch: FetchOptions,
    pub aggregate: AggregateOptions,
    /// Budget for fetch, score and aggregate. `None` means unlimited.
    pub run_timeout: Option<Duration>,
}

/// Result of a published run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: Summary,
    pub artifacts: PublishedArtifacts,
    /// Posts that were published with the fallback score.
    pub fallbacks: usize,
    pub duration: Duration,
}

/// Fetch only. Used by `--dry-run`.
pub async fn collect_posts(
    settings: &RunSettings,
    source: &dyn ListingSource,
    now: DateTime<Utc>,
) -> Result<Vec<RawPost>> {
    within_budget(
        settings.run_timeout,
        fetch_recent_posts(source, &settings.fetch, now),
    )
    .await?
    .with_context(|| format!("Failed to fetch r/{}", settings.fetch.subreddit))
}

async fn within_budget<F: Future>(budget: Option<Duration>, work: F) -> Result<F::Output> {
    match budget {
        Some(budget) => timeout(budget, work).await.map_err(|_| {
            anyhow!(
                "Run exceeded its {}s time budget; nothing was published",
                budget.as_secs()
            )
        }),
        None => Ok(work.await),
    }
}

async fn build_run_snapshot(
    settings: &RunSettings,
    source: &dyn ListingSource,
    scorer: &Scorer,
    now: DateTime<Utc>,
) -> Result<(Snapshot, usize)> {
    let raw_posts = fetch_recent_posts(source, &settings.fetch, now)
        .await
        .with_context(|| format!("Failed to fetch r/{}", settings.fetch.subreddit))?;

    let scored = scorer.score_posts(raw_posts).await;
    debug!(
        "Scored {} posts ({} fallbacks)",
        scored.posts.len(),
        scored.fallbacks
    );

    let generated_at = format_timestamp(now);
    let snapshot = build_snapshot(scored.posts, &settings.aggregate, &generated_at);
    Ok((snapshot, scored.fallbacks))
}

/// Run the whole pipeline and publish the result.
pub async fn run(
    settings: &RunSettings,
    source: &dyn ListingSource,
    scorer: &Scorer,
    publisher: &Publisher,
) -> Result<RunOutcome> {
    let started = Instant::now();
    let now = Utc::now();

    info!(
        "Starting run for r/{} (limit {})",
        settings.fetch.subreddit, settings.fetch.limit
    );

    let (snapshot, fallbacks) = within_budget(
        settings.run_timeout,
        build_run_snapshot(settings, source, scorer, now),
    )
    .await??;

    let artifacts = publisher.publish(&snapshot)?;

    let duration = started.elapsed();
    info!("Run finished in {:.2}s", duration.as_secs_f64());

    Ok(RunOutcome {
        summary: snapshot.summary,
        artifacts,
        fallbacks,
        duration,
    })
}
