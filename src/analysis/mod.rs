//! Aggregation of scored posts into dashboard statistics.

pub mod aggregator;
pub mod wordfreq;

pub use aggregator::{build_snapshot, AggregateOptions};
pub use wordfreq::Tokenizer;
