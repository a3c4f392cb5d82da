//! The seam between the scorer and whatever produces assessments.

use crate::models::Assessment;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// What the analysis service sees for one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    pub subreddit: String,
    pub title: String,
    pub body: String,
}

/// Produces a sentiment assessment for a single post.
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Assess one post. Any error is absorbed by the scorer.
    async fn assess(&self, request: &AnalysisRequest) -> Result<Assessment>;
}
