//! Sentiment scoring.
//!
//! Each post is sent to the analysis service once; failures degrade to a
//! neutral assessment instead of failing the run.

pub mod analyzer;
pub mod openai;
pub mod parse;
pub mod scorer;

pub use analyzer::{AnalysisRequest, SentimentAnalyzer};
pub use openai::{OpenAiAnalyzer, OpenAiSettings};
pub use scorer::{Scorer, ScorerOptions};
