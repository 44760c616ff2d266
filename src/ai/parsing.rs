//! AI response parsing and utility functions
//!
//! JSON object extraction from chatty model output, plus the retry-delay and
//! backoff helpers used by callers that choose to retry.

use std::time::Duration;

use crate::ai::types::{MAX_RETRY_DELAY_MS, RETRY_BASE_DELAY_MS};

/// Locate the JSON object inside a model reply.
///
/// A bare object is returned as-is (trimmed). Otherwise the slice from the
/// first `{` to the last `}` inclusive is the candidate, which tolerates
/// prose and markdown fences on either side.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}

/// First `max_chars` characters of `text`, safe on multi-byte boundaries
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Parse retry delay from error response (supports "4s", "4.5s", seconds as number)
pub fn parse_retry_delay(text: &str) -> Option<u32> {
    // "retryDelay": "Xs"
    if let Some(idx) = text.find("retryDelay") {
        let after = &text[idx..];
        for word in after.split_whitespace().take(5) {
            let clean = word.trim_matches(|c: char| !c.is_numeric() && c != '.');
            if let Ok(secs) = clean.parse::<f64>() {
                return Some(secs.ceil() as u32);
            }
        }
    }
    // "retry in X"
    if let Some(idx) = text.find("retry in") {
        let after = &text[idx + 8..];
        for word in after.split_whitespace().take(3) {
            let clean = word.trim_matches(|c: char| !c.is_numeric() && c != '.');
            if let Ok(secs) = clean.parse::<f64>() {
                return Some(secs.ceil() as u32);
            }
        }
    }
    None
}

/// Calculate exponential backoff delay
pub fn calculate_backoff_delay(attempt: u32) -> Duration {
    let delay_ms = 2u64
        .checked_pow(attempt)
        .and_then(|factor| RETRY_BASE_DELAY_MS.checked_mul(factor))
        .unwrap_or(MAX_RETRY_DELAY_MS);
    Duration::from_millis(delay_ms.min(MAX_RETRY_DELAY_MS))
}
