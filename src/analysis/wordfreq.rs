//! Word-frequency table for the dashboard's word cloud.

use super::aggregator::TermCounter;
use crate::models::{Post, TermCount};
use crate::text::normalize_phrase;
use regex::Regex;
use std::collections::HashSet;

/// Entries kept in `wordfreq.json`.
pub const DEFAULT_WORDFREQ_LIMIT: usize = 120;

/// Weight of a whole requested-item phrase relative to a single word.
pub const REQUESTED_ITEM_WEIGHT: usize = 3;

/// Tokens shorter than this are ignored.
const MIN_TOKEN_CHARS: usize = 3;

/// Replaced with a space, in order, before splitting: links first, then
/// anything that is not a word character, `-`, `+`, `&`, `'` or `/`.
const SCRUB_PATTERNS: &[&str] = &[r"https?://\S+", r"[^a-z0-9\s\-+&'/]"];

/// Words that carry no signal in a gaming subreddit.
pub const STOP_WORDS: &[&str] = &[
    // function words
    "the", "a", "an", "and", "or", "but", "if", "then", "else", "when", "while", "to", "of",
    "in", "on", "for", "with", "without", "is", "are", "was", "were", "be", "been", "being",
    "i", "you", "he", "she", "they", "we", "it", "this", "that", "these", "those", "my",
    "your", "our", "their", "not", "can", "has", "have", "had", "its", "it's", "i'm", "don't",
    "what", "how", "why", "who", "there", "from", "about", "into", "out", "all", "any", "get",
    "got", "will", "would", "could", "should", "also", "some", "one", "now", "only", "more",
    "than", "too", "did", "does", "just",
    // courtesy
    "pls", "please", "thanks", "thank",
    // generic community words
    "codm", "cod", "mobile", "call", "duty", "callofdutymobile", "like", "game", "gameplay",
    "player", "players", "really", "very", "much",
];

/// Splits free text into lowercase word tokens.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: HashSet<String>,
    scrubbers: Vec<Regex>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl Tokenizer {
    /// Tokenizer with the built-in stop words plus `extra_stop_words`.
    pub fn new(extra_stop_words: &[String]) -> Self {
        let stop_words = STOP_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(extra_stop_words.iter().map(|w| w.trim().to_lowercase()))
            .collect();
        let scrubbers = SCRUB_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            stop_words,
            scrubbers,
        }
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    /// Tokenize `text`: lowercase, drop links and punctuation, drop short,
    /// numeric and stop-word tokens.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let mut scrubbed = text.to_lowercase();
        for re in &self.scrubbers {
            scrubbed = re.replace_all(&scrubbed, " ").into_owned();
        }

        scrubbed
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| c == '-' || c == '\'' || c == '"'))
            .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
            .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
            .filter(|t| !self.is_stop_word(t))
            .map(String::from)
            .collect()
    }
}

/// Build the word-frequency table.
///
/// Requested items count as whole phrases with extra weight; title and body
/// words count once each. Sorted by count, ties in first-seen order.
pub fn build_word_frequency(posts: &[Post], tokenizer: &Tokenizer, limit: usize) -> Vec<TermCount> {
    let mut counter = TermCounter::default();

    for post in posts {
        for item in &post.requested_items {
            let phrase = normalize_phrase(item);
            if phrase.chars().count() >= MIN_TOKEN_CHARS {
                counter.add(&phrase, REQUESTED_ITEM_WEIGHT);
            }
        }
    }

    for post in posts {
        for token in tokenizer.tokens(&post.title) {
            counter.add(&token, 1);
        }
        for token in tokenizer.tokens(&post.selftext) {
            counter.add(&token, 1);
        }
    }

    counter.ranked(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, body: &str, items: &[&str]) -> Post {
        Post {
            id: title.to_string(),
            title: title.to_string(),
            author: "someone".to_string(),
            selftext: body.to_string(),
            url: String::new(),
            permalink: String::new(),
            created_utc: 0.0,
            created_iso: "1970-01-01T00:00:00Z".to_string(),
            score: 0,
            num_comments: 0,
            sentiment_1_5: 3,
            sentiment_reason: String::new(),
            requested_items: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_tokenizer_filters() {
        let tokenizer = Tokenizer::default();
        let tokens = tokenizer.tokens(
            "The NEW Ranked season is great!! See https://youtu.be/x 2024 ok co-op -- 'quoted'",
        );
        assert_eq!(tokens, vec!["new", "ranked", "season", "great", "see", "co-op", "quoted"]);
    }

    #[test]
    fn test_scrub_patterns_compile() {
        assert_eq!(Tokenizer::default().scrubbers.len(), SCRUB_PATTERNS.len());
    }

    #[test]
    fn test_tokenizer_keeps_joined_words() {
        let tokenizer = Tokenizer::default();
        assert_eq!(
            tokenizer.tokens("M&M's drop-rate +50% buff/nerf (http://x.io/a?b=1) é"),
            vec!["m&m's", "drop-rate", "+50", "buff/nerf"]
        );
    }

    #[test]
    fn test_tokenizer_extra_stop_words() {
        let tokenizer = Tokenizer::new(&["Season".to_string()]);
        assert_eq!(tokenizer.tokens("ranked season"), vec!["ranked"]);
    }

    #[test]
    fn test_requested_items_weighted() {
        let posts = vec![
            post("Bring back maps", "", &["Crash Map"]),
            post("Another request", "", &["crash  map"]),
        ];
        let table = build_word_frequency(&posts, &Tokenizer::default(), 120);

        assert_eq!(table[0].term, "crash map");
        assert_eq!(table[0].count, 6);
    }

    #[test]
    fn test_counts_descending_with_stable_ties() {
        let posts = vec![post("zebra apple", "apple mango", &[])];
        let table = build_word_frequency(&posts, &Tokenizer::default(), 120);
        let terms: Vec<_> = table.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["apple", "zebra", "mango"]);
    }

    #[test]
    fn test_limit_applied() {
        let words: Vec<String> = (0..300).map(|i| format!("word{}", i)).collect();
        let posts = vec![post(&words.join(" "), "", &[])];
        let table = build_word_frequency(&posts, &Tokenizer::default(), 120);
        assert_eq!(table.len(), 120);
    }

    #[test]
    fn test_empty_posts() {
        assert!(build_word_frequency(&[], &Tokenizer::default(), 120).is_empty());
    }
}
