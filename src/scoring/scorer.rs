//! Per-post scoring with bounded concurrency and a neutral fallback.

use super::analyzer::{AnalysisRequest, SentimentAnalyzer};
use crate::models::{Assessment, Post, RawPost};
use crate::text::{clean_text, truncate_with_ellipsis};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::sync::Arc;
use tracing::{info, warn};

/// Body characters sent to the analysis service.
pub const DEFAULT_MAX_BODY_CHARS: usize = 1200;

/// Reddit caps titles at 300 characters; anything longer is not a real title.
pub const MAX_TITLE_CHARS: usize = 300;

/// Scoring parameters.
#[derive(Debug, Clone)]
pub struct ScorerOptions {
    pub subreddit: String,
    /// Maximum in-flight analysis calls.
    pub concurrency: usize,
    pub max_body_chars: usize,
}

/// Posts with their assessments, in fetch order.
#[derive(Debug, Clone)]
pub struct ScoredPosts {
    pub posts: Vec<Post>,
    /// How many posts received the fallback assessment.
    pub fallbacks: usize,
}

pub struct Scorer {
    analyzer: Arc<dyn SentimentAnalyzer>,
    options: ScorerOptions,
    progress: ProgressBar,
}

impl Scorer {
    pub fn new(analyzer: Arc<dyn SentimentAnalyzer>, options: ScorerOptions) -> Self {
        Self {
            analyzer,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report progress through `progress` instead of a hidden bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Build the analysis input for one post: links stripped, title and
    /// body capped.
    pub fn build_request(&self, post: &RawPost) -> AnalysisRequest {
        let title = clean_text(&post.title);
        let body = clean_text(&post.selftext);
        AnalysisRequest {
            subreddit: self.options.subreddit.clone(),
            title: truncate_with_ellipsis(&title, MAX_TITLE_CHARS),
            body: truncate_with_ellipsis(&body, self.options.max_body_chars),
        }
    }

    /// Assess one post, substituting the fallback on any failure.
    async fn assess(&self, post: &RawPost) -> (Assessment, bool) {
        let request = self.build_request(post);
        let result = self.analyzer.assess(&request).await;
        self.progress.inc(1);

        match result {
            Ok(assessment) => (assessment, false),
            Err(e) => {
                warn!("Scoring failed for post {}, using fallback: {:#}", post.id, e);
                (Assessment::fallback(), true)
            }
        }
    }

    /// Score every post. Output order always matches input order.
    pub async fn score_posts(&self, posts: Vec<RawPost>) -> ScoredPosts {
        let total = posts.len();
        self.progress.set_length(total as u64);
        info!(
            "Scoring {} posts with {} (concurrency {})",
            total,
            self.analyzer.model_name(),
            self.options.concurrency
        );

        let results: Vec<(RawPost, Assessment, bool)> = stream::iter(posts)
            .map(|post| async move {
                let (assessment, failed) = self.assess(&post).await;
                (post, assessment, failed)
            })
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await;

        self.progress.finish_and_clear();

        let fallbacks = results.iter().filter(|(_, _, failed)| *failed).count();
        let posts = results
            .into_iter()
            .map(|(raw, assessment, _)| Post::from_raw(raw, assessment))
            .collect();

        if fallbacks > 0 {
            warn!("{} of {} posts used the fallback score", fallbacks, total);
        }

        ScoredPosts { posts, fallbacks }
    }
}
