//! Data models for the sentiment pipeline.
//!
//! This module contains the records that flow between the stages of a run:
//! raw listing posts from Reddit, the per-post assessment returned by the
//! scorer, and the three artifacts published for the dashboard.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Score assigned when the analysis service fails or returns garbage.
pub const FALLBACK_SENTIMENT: u8 = 3;

/// Lowest valid sentiment score.
pub const MIN_SENTIMENT: u8 = 1;

/// Highest valid sentiment score.
pub const MAX_SENTIMENT: u8 = 5;

/// Origin used to turn site-relative permalinks into absolute links.
pub const REDDIT_ORIGIN: &str = "https://www.reddit.com";

/// A post as it appears in the `/new.json` listing.
///
/// Only the fields the pipeline needs are modelled; everything else in the
/// listing payload is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
}

impl RawPost {
    /// Creation time as a UTC timestamp. Unparsable values map to the epoch.
    pub fn created_at(&self) -> DateTime<Utc> {
        let secs = self.created_utc.trunc() as i64;
        let nanos = (self.created_utc.fract() * 1e9) as u32;
        Utc.timestamp_opt(secs, nanos)
            .single()
            .unwrap_or_default()
    }

    /// Absolute link to the post's comment page.
    pub fn absolute_permalink(&self) -> String {
        if self.permalink.starts_with('/') {
            format!("{}{}", REDDIT_ORIGIN, self.permalink)
        } else {
            self.permalink.clone()
        }
    }
}

/// Result of analysing one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    /// Sentiment in `[1, 5]`.
    pub sentiment: u8,
    /// Short justification, empty on fallback.
    pub reason: String,
    /// Requested-item phrases, possibly empty.
    pub requested_items: Vec<String>,
}

impl Assessment {
    /// The neutral assessment substituted when scoring fails.
    pub fn fallback() -> Self {
        Self {
            sentiment: FALLBACK_SENTIMENT,
            reason: String::new(),
            requested_items: Vec::new(),
        }
    }
}

/// A scored post, serialized into `posts.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub author: String,
    pub selftext: String,
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    pub created_iso: String,
    pub score: i64,
    pub num_comments: u64,
    pub sentiment_1_5: u8,
    pub sentiment_reason: String,
    pub requested_items: Vec<String>,
}

impl Post {
    /// Combine a raw listing post with its assessment.
    pub fn from_raw(raw: RawPost, assessment: Assessment) -> Self {
        let created_iso = format_timestamp(raw.created_at());
        let permalink = raw.absolute_permalink();
        Self {
            id: raw.id,
            title: raw.title,
            author: raw.author,
            selftext: raw.selftext,
            url: raw.url,
            permalink,
            created_utc: raw.created_utc,
            created_iso,
            score: raw.score,
            num_comments: raw.num_comments,
            sentiment_1_5: assessment
                .sentiment
                .clamp(MIN_SENTIMENT, MAX_SENTIMENT),
            sentiment_reason: assessment.reason,
            requested_items: assessment.requested_items,
        }
    }
}

/// A `{term, count}` pair, used by both `wordfreq.json` and the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

/// Aggregate statistics, serialized into `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub subreddit: String,
    pub post_count: usize,
    pub avg_sentiment: f64,
    /// Keys "1" through "5", always all present.
    pub sentiment_histogram: BTreeMap<String, usize>,
    pub top_requested_items: Vec<TermCount>,
    pub generated_at_utc: String,
}

/// Everything one run publishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub posts: Vec<Post>,
    pub summary: Summary,
    pub wordfreq: Vec<TermCount>,
}

/// Render a timestamp in the fixed artifact format (`2024-05-01T12:00:00Z`).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
