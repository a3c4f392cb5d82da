//! Paginated, age-bounded collection of a subreddit's newest posts.

use super::client::{ListingSource, MAX_PAGE_SIZE};
use super::error::FetchError;
use super::retry::{with_retry, RetryPolicy};
use crate::models::RawPost;
use chrono::{DateTime, Duration as AgeLimit, Utc};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Parameters for one listing walk.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub subreddit: String,
    /// Maximum posts to return.
    pub limit: usize,
    /// Posts older than this are excluded. `None` disables the cutoff.
    pub max_age: Option<AgeLimit>,
    /// Pause between page requests.
    pub page_delay: Duration,
    pub retry: RetryPolicy,
}

/// Collect up to `limit` posts newer than the cutoff, newest first.
///
/// Each page request is retried according to `options.retry`; a page that
/// still fails aborts the whole walk. Duplicate ids (the listing shifting
/// while we page through it) keep their first occurrence.
pub async fn fetch_recent_posts(
    source: &dyn ListingSource,
    options: &FetchOptions,
    now: DateTime<Utc>,
) -> Result<Vec<RawPost>, FetchError> {
    let cutoff = options.max_age.map(|age| now - age);
    let mut posts: Vec<RawPost> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut after: Option<String> = None;
    let mut page_number = 0usize;

    while posts.len() < options.limit {
        if page_number > 0 && !options.page_delay.is_zero() {
            sleep(options.page_delay).await;
        }
        page_number += 1;

        let page_size = (options.limit - posts.len()).min(MAX_PAGE_SIZE);
        let operation = format!("r/{} page {}", options.subreddit, page_number);
        let cursor = after.clone();

        let page = with_retry(&options.retry, &operation, || {
            source.fetch_page(&options.subreddit, page_size, cursor.as_deref())
        })
        .await?;

        debug!(
            "{}: {} posts, next cursor {:?}",
            operation,
            page.posts.len(),
            page.after
        );

        if page.posts.is_empty() {
            break;
        }

        let mut reached_cutoff = false;
        let mut added = 0usize;
        for post in page.posts {
            if let Some(cutoff) = cutoff {
                if post.created_at() < cutoff {
                    reached_cutoff = true;
                    continue;
                }
            }
            if posts.len() >= options.limit {
                break;
            }
            if seen.insert(post.id.clone()) {
                posts.push(post);
                added += 1;
            } else {
                debug!("Skipping duplicate post {}", post.id);
            }
        }

        // The listing is newest-first, so later pages are older still.
        if reached_cutoff {
            break;
        }

        // A page of nothing but repeats means the cursor is not advancing.
        if added == 0 {
            debug!("{} added no new posts, stopping", operation);
            break;
        }

        match page.after {
            Some(next) => after = Some(next),
            None => break,
        }
    }

    info!(
        "Fetched {} posts from r/{} in {} page(s)",
        posts.len(),
        options.subreddit,
        page_number
    );

    Ok(posts)
}
