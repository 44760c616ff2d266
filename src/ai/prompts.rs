//! AI prompt building functions
//!
//! Builds the sentiment-report instruction and the matching response schema
//! for constrained decoding.

use serde_json::{json, Value};

use crate::ai::normalizer::sanitize_symbol_for_prompt;

/// Number of themes expected on each side
pub const THEME_COUNT: usize = 3;

/// Number of weekly trend points expected
pub const TREND_WEEKS: usize = 4;

/// Build the sentiment report instruction for a normalized ticker symbol.
///
/// The model must either reject the symbol or return the full report as a
/// single JSON object. The sum constraint is stated but only advisory; the
/// validator enforces it.
pub fn build_sentiment_prompt(symbol: &str) -> String {
    let symbol = sanitize_symbol_for_prompt(symbol);

    format!(
        r#"Act as an expert financial sentiment analysis tool. Your first and most important task is to validate the stock symbol provided.

**Step 1: Validation**
Silently determine whether "{symbol}" is a real, publicly traded stock symbol that has an active community comments page on Yahoo Finance.

**Step 2: Response**
Reply with exactly ONE JSON object and nothing else. No explanatory text, no markdown.

- If the symbol is INVALID or has no community discussion, return ONLY this object and stop:
{{
  "validSymbol": false,
  "error": "The symbol '{symbol}' is not a valid stock ticker or has no community data on Yahoo Finance."
}}

- If and only if the symbol is VALID, analyze the community comments for "{symbol}" over the last 30 days and return:
{{
  "validSymbol": true,
  "error": null,
  "totalComments": <integer, number of meaningful comments>,
  "positiveComments": <integer>,
  "negativeComments": <integer>,
  "neutralComments": <integer>,
  "positiveThemes": [<{themes} short strings, key bullish themes>],
  "negativeThemes": [<{themes} short strings, key bearish themes>],
  "sentimentTrend": [<{weeks} objects, oldest to newest>]
}}

Each "sentimentTrend" object has exactly the keys "week", "positive", "negative" and "neutral". Use descriptive week labels: "4 Weeks Ago", "3 Weeks Ago", "2 Weeks Ago", "Last Week".

**Analysis rules:**
1. Sarcasm: "Fantastic, another 10% dive" is negative.
2. Context: read whole threads, a reply can change the meaning of a comment.
3. Noise: discount repetitive low-effort comments from bots or spam accounts.

All counts are non-negative integers. positiveComments + negativeComments + neutralComments MUST exactly equal totalComments."#,
        symbol = symbol,
        themes = THEME_COUNT,
        weeks = TREND_WEEKS,
    )
}

/// Response schema covering both the rejection and the acceptance shape.
///
/// Only `validSymbol` is required; everything else is nullable so the model
/// can answer with the short rejection object.
pub fn sentiment_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "validSymbol": { "type": "BOOLEAN" },
            "error": { "type": "STRING", "nullable": true },
            "totalComments": { "type": "INTEGER", "nullable": true },
            "positiveComments": { "type": "INTEGER", "nullable": true },
            "negativeComments": { "type": "INTEGER", "nullable": true },
            "neutralComments": { "type": "INTEGER", "nullable": true },
            "positiveThemes": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "nullable": true
            },
            "negativeThemes": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "nullable": true
            },
            "sentimentTrend": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "week": { "type": "STRING" },
                        "positive": { "type": "INTEGER" },
                        "negative": { "type": "INTEGER" },
                        "neutral": { "type": "INTEGER" }
                    },
                    "required": ["week", "positive", "negative", "neutral"]
                },
                "nullable": true
            }
        },
        "required": ["validSymbol"]
    })
}
