//! Errors raised while fetching the subreddit listing.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Rate limited by Reddit (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Reddit server error: HTTP {status}")]
    ServerError { status: u16 },

    #[error("Reddit rejected request for r/{subreddit}: HTTP {status}")]
    ClientError { status: u16, subreddit: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid listing response: {0}")]
    InvalidResponse(String),

    #[error("Giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RateLimited { .. }
            | FetchError::ServerError { .. }
            | FetchError::Timeout
            | FetchError::Transport(_)
            | FetchError::InvalidResponse(_) => true,
            FetchError::ClientError { .. } | FetchError::RetriesExhausted { .. } => false,
        }
    }

    /// Server-requested wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::InvalidResponse(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}
