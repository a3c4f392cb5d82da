//! Reddit listing access.
//!
//! This module fetches a subreddit's newest posts from the public JSON
//! listing, with pagination, an age cutoff and bounded retries.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod retry;

pub use client::{ListingPage, ListingSource, RedditClient};
pub use error::FetchError;
pub use fetcher::{fetch_recent_posts, FetchOptions};
pub use retry::RetryPolicy;
