//! Parsing and validation of the analysis service's reply.
//!
//! The model is asked for a small JSON object. Replies are not trusted: the
//! score is coerced into `[1, 5]`, the reason and items are cleaned and
//! capped, and anything that is not JSON at all is an error so the caller
//! can substitute the neutral fallback.

use crate::models::{Assessment, FALLBACK_SENTIMENT, MAX_SENTIMENT, MIN_SENTIMENT};
use crate::text::{clean_text, truncate_chars};
use anyhow::{anyhow, Context, Result};
use serde_json::Value;

/// Longest reason kept, in characters.
pub const MAX_REASON_CHARS: usize = 200;

/// Most requested items kept per post.
pub const MAX_ITEMS: usize = 5;

/// Longest requested item kept, in characters.
pub const MAX_ITEM_CHARS: usize = 60;

/// Parse a model reply into an assessment.
///
/// The first `{` through the last `}` is taken as the JSON object, which
/// tolerates models that wrap their answer in prose or code fences.
pub fn parse_assessment(reply: &str) -> Result<Assessment> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(anyhow!("No JSON object in reply")),
    };

    let value: Value = serde_json::from_str(json).context("Reply is not valid JSON")?;
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("Reply JSON is not an object"))?;

    let sentiment = object
        .get("sentiment_1_5")
        .and_then(coerce_sentiment)
        .unwrap_or(FALLBACK_SENTIMENT);

    let reason = object
        .get("sentiment_reason")
        .map(value_as_text)
        .unwrap_or_default();
    let reason = truncate_chars(reason.trim(), MAX_REASON_CHARS)
        .trim_end()
        .to_string();

    let requested_items = object
        .get("requested_items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(MAX_ITEMS)
                .map(|item| sanitize_item(&value_as_text(item)))
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(Assessment {
        sentiment,
        reason,
        requested_items,
    })
}

/// Accept integers, floats and numeric strings; clamp into range.
fn coerce_sentiment(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })?
        }
        _ => return None,
    };

    Some(raw.clamp(MIN_SENTIMENT as i64, MAX_SENTIMENT as i64) as u8)
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Strip links and punctuation noise from a requested-item phrase.
pub fn sanitize_item(item: &str) -> String {
    let cleaned: String = clean_text(item)
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || "_-+&'/".contains(*c))
        .collect();
    truncate_chars(cleaned.trim(), MAX_ITEM_CHARS)
        .trim_end()
        .to_string()
}
