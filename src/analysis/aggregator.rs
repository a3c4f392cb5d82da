//! Summary statistics over a run's scored posts.
//!
//! Everything here is a pure function of the post list: no I/O, no clock,
//! no randomness. The run timestamp is passed in by the caller.

use super::wordfreq::{build_word_frequency, Tokenizer, DEFAULT_WORDFREQ_LIMIT};
use crate::models::{Post, Snapshot, Summary, TermCount, MAX_SENTIMENT, MIN_SENTIMENT};
use crate::text::normalize_phrase;
use std::collections::{BTreeMap, HashMap};

/// Entries kept in `summary.top_requested_items`.
pub const DEFAULT_TOP_ITEMS_LIMIT: usize = 30;

/// Aggregation parameters.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub subreddit: String,
    pub top_items_limit: usize,
    pub wordfreq_limit: usize,
    pub tokenizer: Tokenizer,
}

impl AggregateOptions {
    pub fn new(subreddit: impl Into<String>) -> Self {
        Self {
            subreddit: subreddit.into(),
            top_items_limit: DEFAULT_TOP_ITEMS_LIMIT,
            wordfreq_limit: DEFAULT_WORDFREQ_LIMIT,
            tokenizer: Tokenizer::default(),
        }
    }
}

/// Counts terms while remembering the order they were first seen in.
#[derive(Debug, Default)]
pub struct TermCounter {
    index: HashMap<String, usize>,
    entries: Vec<TermCount>,
}

impl TermCounter {
    pub fn add(&mut self, term: &str, weight: usize) {
        match self.index.get(term) {
            Some(&i) => self.entries[i].count += weight,
            None => {
                self.index.insert(term.to_string(), self.entries.len());
                self.entries.push(TermCount {
                    term: term.to_string(),
                    count: weight,
                });
            }
        }
    }

    /// Top `limit` terms by count. Ties keep first-seen order.
    pub fn ranked(self, limit: usize) -> Vec<TermCount> {
        let mut entries = self.entries;
        // sort_by_key is stable, so equal counts stay in insertion order
        entries.sort_by_key(|e| std::cmp::Reverse(e.count));
        entries.truncate(limit);
        entries
    }
}

/// Mean sentiment, or 0.0 when there are no posts.
pub fn average_sentiment(posts: &[Post]) -> f64 {
    if posts.is_empty() {
        return 0.0;
    }
    let total: u64 = posts.iter().map(|p| p.sentiment_1_5 as u64).sum();
    total as f64 / posts.len() as f64
}

/// Post counts per score, with every bucket present.
pub fn sentiment_histogram(posts: &[Post]) -> BTreeMap<String, usize> {
    let mut histogram: BTreeMap<String, usize> = (MIN_SENTIMENT..=MAX_SENTIMENT)
        .map(|score| (score.to_string(), 0))
        .collect();

    for post in posts {
        let bucket = post.sentiment_1_5.clamp(MIN_SENTIMENT, MAX_SENTIMENT);
        *histogram.entry(bucket.to_string()).or_insert(0) += 1;
    }

    histogram
}

/// Most frequently requested items across all posts, normalized.
pub fn top_requested_items(posts: &[Post], limit: usize) -> Vec<TermCount> {
    let mut counter = TermCounter::default();

    for post in posts {
        for item in &post.requested_items {
            let term = normalize_phrase(item);
            if !term.is_empty() {
                counter.add(&term, 1);
            }
        }
    }

    counter.ranked(limit)
}

/// Build the run's summary.
pub fn build_summary(posts: &[Post], options: &AggregateOptions, generated_at: &str) -> Summary {
    Summary {
        subreddit: options.subreddit.clone(),
        post_count: posts.len(),
        avg_sentiment: average_sentiment(posts),
        sentiment_histogram: sentiment_histogram(posts),
        top_requested_items: top_requested_items(posts, options.top_items_limit),
        generated_at_utc: generated_at.to_string(),
    }
}

/// Assemble all three artifacts for a run.
pub fn build_snapshot(posts: Vec<Post>, options: &AggregateOptions, generated_at: &str) -> Snapshot {
    let summary = build_summary(&posts, options, generated_at);
    let wordfreq = build_word_frequency(&posts, &options.tokenizer, options.wordfreq_limit);

    Snapshot {
        posts,
        summary,
        wordfreq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAMP: &str = "2024-05-01T12:00:00Z";

    fn create_test_post(id: &str, sentiment: u8, items: &[&str]) -> Post {
        Post {
            id: id.to_string(),
            title: format!("Post about {}", id),
            author: "someone".to_string(),
            selftext: "Ranked matchmaking feels rough".to_string(),
            url: String::new(),
            permalink: format!("https://www.reddit.com/r/test/comments/{}/", id),
            created_utc: 1_714_564_800.0,
            created_iso: STAMP.to_string(),
            score: 1,
            num_comments: 0,
            sentiment_1_5: sentiment,
            sentiment_reason: String::new(),
            requested_items: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_scores_one_three_five() {
        let posts = vec![
            create_test_post("a", 1, &[]),
            create_test_post("b", 3, &[]),
            create_test_post("c", 5, &[]),
        ];
        let summary = build_summary(&posts, &AggregateOptions::new("test"), STAMP);

        assert_eq!(summary.avg_sentiment, 3.0);
        let expected: BTreeMap<String, usize> =
            [("1", 1), ("2", 0), ("3", 1), ("4", 0), ("5", 1)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
        assert_eq!(summary.sentiment_histogram, expected);
    }

    #[test]
    fn test_histogram_sums_to_post_count() {
        let posts: Vec<Post> = (0..37)
            .map(|i| create_test_post(&i.to_string(), (i % 5 + 1) as u8, &[]))
            .collect();
        let summary = build_summary(&posts, &AggregateOptions::new("test"), STAMP);

        let total: usize = summary.sentiment_histogram.values().sum();
        assert_eq!(total, summary.post_count);
        assert_eq!(summary.post_count, 37);
    }

    #[test]
    fn test_average_matches_mean() {
        let scores = [2u8, 2, 3, 5, 4, 1, 1];
        let posts: Vec<Post> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| create_test_post(&i.to_string(), *s, &[]))
            .collect();

        let expected = scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64;
        assert!((average_sentiment(&posts) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_run() {
        let snapshot = build_snapshot(Vec::new(), &AggregateOptions::new("test"), STAMP);

        assert!(snapshot.posts.is_empty());
        assert!(snapshot.wordfreq.is_empty());
        assert_eq!(snapshot.summary.post_count, 0);
        assert_eq!(snapshot.summary.avg_sentiment, 0.0);
        assert_eq!(snapshot.summary.sentiment_histogram.len(), 5);
        assert!(snapshot.summary.sentiment_histogram.values().all(|v| *v == 0));
        assert!(snapshot.summary.top_requested_items.is_empty());
    }

    #[test]
    fn test_top_items_normalized_and_stable() {
        let posts = vec![
            create_test_post("a", 3, &["Ranked Mode", "new maps"]),
            create_test_post("b", 3, &["  ranked   mode ", "Sniper buff"]),
            create_test_post("c", 3, &["sniper buff", "New Maps", "battle pass"]),
        ];
        let top = top_requested_items(&posts, 30);

        let terms: Vec<_> = top.iter().map(|t| (t.term.as_str(), t.count)).collect();
        assert_eq!(
            terms,
            vec![
                ("ranked mode", 2),
                ("new maps", 2),
                ("sniper buff", 2),
                ("battle pass", 1)
            ]
        );
        assert!(top.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn test_top_items_truncated() {
        let posts = vec![create_test_post("a", 3, &["one", "two", "three", "four"])];
        assert_eq!(top_requested_items(&posts, 2).len(), 2);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let posts = vec![
            create_test_post("a", 2, &["Ranked Mode", "new maps"]),
            create_test_post("b", 4, &["sniper buff"]),
            create_test_post("c", 5, &["new maps"]),
        ];
        let options = AggregateOptions::new("test");

        let first = build_snapshot(posts.clone(), &options, STAMP);
        let second = build_snapshot(posts, &options, STAMP);

        assert_eq!(
            serde_json::to_string(&first.summary).unwrap(),
            serde_json::to_string(&second.summary).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&first.wordfreq).unwrap(),
            serde_json::to_string(&second.wordfreq).unwrap()
        );
    }

    #[test]
    fn test_term_counter_weights() {
        let mut counter = TermCounter::default();
        counter.add("b", 1);
        counter.add("a", 3);
        counter.add("b", 2);
        let ranked = counter.ranked(10);
        assert_eq!(ranked[0], TermCount { term: "b".to_string(), count: 3 });
        assert_eq!(ranked[1], TermCount { term: "a".to_string(), count: 3 });
    }
}
