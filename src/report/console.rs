//! Plain-text run summaries printed to stdout.

use crate::models::{format_timestamp, RawPost, Summary, MAX_SENTIMENT, MIN_SENTIMENT};
use crate::text::truncate_with_ellipsis;

/// Requested items shown in the console summary.
const CONSOLE_TOP_ITEMS: usize = 10;

/// Width of the widest histogram bar.
const BAR_WIDTH: usize = 30;

/// Render the end-of-run summary.
pub fn render_summary(summary: &Summary, fallbacks: usize) -> String {
    let mut output = String::new();

    output.push_str(&format!("\nr/{} sentiment snapshot\n", summary.subreddit));
    output.push_str(&format!("  Generated:  {}\n", summary.generated_at_utc));
    output.push_str(&format!("  Posts:      {}\n", summary.post_count));
    if fallbacks > 0 {
        output.push_str(&format!("  Fallbacks:  {}\n", fallbacks));
    }
    output.push_str(&format!("  Average:    {:.2}\n", summary.avg_sentiment));

    output.push_str(&render_histogram(summary));

    if !summary.top_requested_items.is_empty() {
        output.push_str("\n  Top requests:\n");
        for item in summary.top_requested_items.iter().take(CONSOLE_TOP_ITEMS) {
            output.push_str(&format!("    {:>3}  {}\n", item.count, item.term));
        }
    }

    output
}

fn render_histogram(summary: &Summary) -> String {
    let mut section = String::from("\n  Sentiment:\n");
    let max = summary
        .sentiment_histogram
        .values()
        .copied()
        .max()
        .unwrap_or(0)
        .max(1);

    for score in MIN_SENTIMENT..=MAX_SENTIMENT {
        let count = summary
            .sentiment_histogram
            .get(&score.to_string())
            .copied()
            .unwrap_or(0);
        let bar = "#".repeat(count * BAR_WIDTH / max);
        section.push_str(&format!("    {}  {:<width$} {}\n", score, bar, count, width = BAR_WIDTH));
    }

    section
}

/// Render the post list for `--dry-run`.
pub fn render_dry_run(subreddit: &str, posts: &[RawPost]) -> String {
    let mut output = format!("\nDry run: {} posts from r/{}\n", posts.len(), subreddit);

    for post in posts {
        output.push_str(&format!(
            "  {}  {:<8} {}\n",
            format_timestamp(post.created_at()),
            post.id,
            truncate_with_ellipsis(post.title.trim(), 80)
        ));
    }

    output.push_str("\nNo analysis calls were made and nothing was written.\n");
    output
}
