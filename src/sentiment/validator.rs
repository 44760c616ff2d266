//! Response validation for sentiment reports.
//!
//! Model output is treated as adversarial input. Gates run in order and the
//! first failing gate decides the error:
//!
//! 1. extraction of the JSON object from the reply text
//! 2. parsing into a JSON object
//! 3. explicit rejection (`validSymbol: false`)
//! 4. completeness and basic types of every acceptance field
//! 5. non-negative counts, top level and per week
//! 6. positive + negative + neutral == total
//! 7. exactly 3 + 3 themes and 4 trend points
//!
//! Validation is pure: the same text always yields the same outcome.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{SentimentReport, SentimentTrendPoint};
use crate::ai::normalizer::normalize_ai_response;
use crate::ai::parsing::{excerpt, extract_json_object};
use crate::ai::prompts::{THEME_COUNT, TREND_WEEKS};
use crate::ai::types::{SentimentError, LOG_EXCERPT_CHARS};

/// The model's answer after parsing, split on its discriminant.
///
/// A rejection never has its data fields examined; an acceptance claim must
/// carry all of them.
#[derive(Debug)]
enum RawModelResponse {
    Rejected { error: Option<String> },
    Accepted(Map<String, Value>),
}

/// Acceptance fields with their basic types. Counts stay signed here so a
/// negative number is reported as inconsistent rather than mistyped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedPayload {
    total_comments: i64,
    positive_comments: i64,
    negative_comments: i64,
    neutral_comments: i64,
    positive_themes: Vec<String>,
    negative_themes: Vec<String>,
    sentiment_trend: Vec<RawTrendPoint>,
}

#[derive(Debug, Deserialize)]
struct RawTrendPoint {
    week: String,
    positive: i64,
    negative: i64,
    neutral: i64,
}

/// Validate raw model text for `symbol` into a trusted report
pub fn validate_response(raw: &str, symbol: &str) -> Result<SentimentReport, SentimentError> {
    let result = run_gates(raw, symbol);
    if let Err(e) = &result {
        log::warn!("Rejected AI response for {} ({:?}): {}", symbol, e.kind(), e);
        log::debug!("Raw AI response: {}", excerpt(raw, LOG_EXCERPT_CHARS));
    }
    result
}

fn run_gates(raw: &str, symbol: &str) -> Result<SentimentReport, SentimentError> {
    // Gate 1
    let candidate = extract_json_object(raw)
        .map(normalize_ai_response)
        .ok_or_else(|| SentimentError::malformed("no JSON object found", raw))?;

    // Gate 2
    let object = match serde_json::from_str::<Value>(&candidate) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(SentimentError::malformed("top-level JSON value is not an object", raw)),
        Err(e) => return Err(SentimentError::malformed(e.to_string(), raw)),
    };

    // Gate 3
    let fields = match classify(object) {
        RawModelResponse::Rejected { error } => {
            return Err(SentimentError::SymbolRejected(rejection_message(error, symbol)));
        }
        RawModelResponse::Accepted(fields) => fields,
    };

    // Gate 4
    let payload: AcceptedPayload = serde_json::from_value(Value::Object(fields)).map_err(|e| {
        SentimentError::IncompleteData(format!("missing or mistyped field for a valid symbol ({})", e))
    })?;

    // Gate 5
    let total = non_negative("totalComments", payload.total_comments)?;
    let positive = non_negative("positiveComments", payload.positive_comments)?;
    let negative = non_negative("negativeComments", payload.negative_comments)?;
    let neutral = non_negative("neutralComments", payload.neutral_comments)?;

    let mut trend = Vec::with_capacity(payload.sentiment_trend.len());
    for (i, point) in payload.sentiment_trend.into_iter().enumerate() {
        trend.push(SentimentTrendPoint {
            positive: non_negative(&format!("sentimentTrend[{}].positive", i), point.positive)?,
            negative: non_negative(&format!("sentimentTrend[{}].negative", i), point.negative)?,
            neutral: non_negative(&format!("sentimentTrend[{}].neutral", i), point.neutral)?,
            week: point.week,
        });
    }

    // Gate 6
    let sum = positive
        .checked_add(negative)
        .and_then(|s| s.checked_add(neutral))
        .ok_or_else(|| SentimentError::InconsistentData("comment counts overflow".to_string()))?;
    if sum != total {
        return Err(SentimentError::InconsistentData(format!(
            "comment totals do not match ({} + {} + {} = {}, expected {})",
            positive, negative, neutral, sum, total
        )));
    }

    // Gate 7
    let positive_themes = exact::<String, THEME_COUNT>("positiveThemes", payload.positive_themes)?;
    let negative_themes = exact::<String, THEME_COUNT>("negativeThemes", payload.negative_themes)?;
    let sentiment_trend = exact::<SentimentTrendPoint, TREND_WEEKS>("sentimentTrend", trend)?;

    Ok(SentimentReport {
        total_comments: total,
        positive_comments: positive,
        negative_comments: negative,
        neutral_comments: neutral,
        positive_themes,
        negative_themes,
        sentiment_trend,
    })
}

/// Only an explicit boolean `false` is a rejection; anything else claims acceptance.
fn classify(mut object: Map<String, Value>) -> RawModelResponse {
    if !matches!(object.get("validSymbol"), Some(Value::Bool(false))) {
        return RawModelResponse::Accepted(object);
    }

    let error = match object.remove("error") {
        Some(Value::String(message)) => Some(message),
        _ => None,
    };
    RawModelResponse::Rejected { error }
}

fn rejection_message(error: Option<String>, symbol: &str) -> String {
    match error {
        Some(message) if !message.trim().is_empty() => message,
        _ => format!("The symbol \"{}\" is not valid.", symbol),
    }
}

fn non_negative(field: &str, value: i64) -> Result<u64, SentimentError> {
    u64::try_from(value)
        .map_err(|_| SentimentError::InconsistentData(format!("{} is negative ({})", field, value)))
}

fn exact<T, const N: usize>(field: &str, items: Vec<T>) -> Result<[T; N], SentimentError> {
    let len = items.len();
    items.try_into().map_err(|_| {
        SentimentError::InconsistentData(format!(
            "incorrect number of entries in {} (expected {}, got {})",
            field, N, len
        ))
    })
}
