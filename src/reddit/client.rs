//! HTTP client for the public, unauthenticated subreddit listing.

use super::error::FetchError;
use crate::models::RawPost;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default public endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";

/// Largest page size the listing endpoint honours.
pub const MAX_PAGE_SIZE: usize = 100;

/// One page of the `/new` listing.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub posts: Vec<RawPost>,
    /// Cursor for the next (older) page, if any.
    pub after: Option<String>,
}

/// Anything that can serve pages of a subreddit's newest posts.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch one page of at most `limit` posts, starting after `after`.
    async fn fetch_page(
        &self,
        subreddit: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<ListingPage, FetchError>;
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    kind: String,
    data: RawPost,
}

impl From<Listing> for ListingPage {
    fn from(listing: Listing) -> Self {
        let posts = listing
            .data
            .children
            .into_iter()
            .filter(|child| child.kind == "t3")
            .map(|child| child.data)
            .collect();

        Self {
            posts,
            after: listing.data.after.filter(|a| !a.is_empty()),
        }
    }
}

/// Client for `https://www.reddit.com/r/<subreddit>/new.json`.
#[derive(Debug, Clone)]
pub struct RedditClient {
    http_client: Client,
    base_url: String,
}

impl RedditClient {
    /// Build a client that identifies itself with `user_agent`.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        Self::with_base_url(user_agent, timeout, DEFAULT_BASE_URL)
    }

    /// Build a client against a different listing host.
    pub fn with_base_url(user_agent: &str, timeout: Duration, base_url: &str) -> Result<Self> {
        // Unknown subreddits redirect to a search page; treat that as an error.
        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn listing_url(&self, subreddit: &str) -> String {
        format!("{}/r/{}/new.json", self.base_url, subreddit)
    }
}

#[async_trait]
impl ListingSource for RedditClient {
    async fn fetch_page(
        &self,
        subreddit: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<ListingPage, FetchError> {
        let url = self.listing_url(subreddit);
        let limit = limit.clamp(1, MAX_PAGE_SIZE).to_string();

        let mut query: Vec<(&str, &str)> = vec![("limit", limit.as_str()), ("raw_json", "1")];
        if let Some(cursor) = after {
            query.push(("after", cursor));
        }

        debug!("GET {} limit={} after={:?}", url, limit, after);

        let response = self.http_client.get(&url).query(&query).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(FetchError::RateLimited { retry_after });
        }

        if status.is_server_error() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::ClientError {
                status: status.as_u16(),
                subreddit: subreddit.to_string(),
            });
        }

        let body = response.text().await?;
        parse_listing(&body)
    }
}

/// Parse a listing body into a page.
pub fn parse_listing(body: &str) -> Result<ListingPage, FetchError> {
    let listing: Listing =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
    Ok(listing.into())
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}
