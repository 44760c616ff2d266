//! AI module type definitions
//!
//! This module contains the type definitions shared across the AI module:
//! request/reply types for the generation service and the structured error
//! taxonomy reported to the dashboard.

use serde::Serialize;
use thiserror::Error;

use crate::ai::parsing::excerpt;

// ============================================================================
// Request Configuration Constants
// ============================================================================

/// Request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Base delay for exponential backoff (milliseconds)
pub const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Upper bound for a single backoff delay (milliseconds)
pub const MAX_RETRY_DELAY_MS: u64 = 10_000;

/// Characters of raw model output kept on a malformed response
pub const RAW_DIAGNOSTIC_CHARS: usize = 2000;

/// Characters of provider or model text that may appear in log lines
pub const LOG_EXCERPT_CHARS: usize = 200;

// ============================================================================
// Generation Request / Reply
// ============================================================================

/// One outbound call to the generation service
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub instruction: String,
    /// Structural hint for constrained decoding, never trusted on its own
    pub response_schema: Option<serde_json::Value>,
}

/// What the generation service handed back, before any interpretation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReply {
    pub text: String,
    /// `promptFeedback.blockReason` when the provider refused the prompt
    pub block_reason: Option<String>,
    /// `finishReason` of the first candidate
    pub finish_reason: Option<String>,
    pub tokens_used: Option<u32>,
}

// ============================================================================
// Structured Errors
// ============================================================================

/// Category of an analysis failure
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptySymbol,
    TransportFailure,
    ServiceBlocked,
    EmptyResponse,
    MalformedResponse,
    SymbolRejected,
    IncompleteData,
    InconsistentData,
}

/// Types of transport-level failures
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Rate limit exceeded - too many requests, retry after delay
    RateLimit,
    /// Quota/credits exhausted
    QuotaExceeded,
    /// Invalid or expired API key
    InvalidApiKey,
    /// Model not found or not available
    ModelNotFound,
    /// Server error on provider side
    ServerError,
    /// Network/connection error
    NetworkError,
    /// Other/unknown error
    Other,
}

/// Every way an analysis can fail. Nothing here is ever swallowed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SentimentError {
    #[error("Please enter a stock symbol.")]
    EmptySymbol,

    #[error("{message}")]
    TransportFailure {
        kind: TransportKind,
        message: String,
        /// Suggested retry delay in seconds (for rate limit errors)
        retry_after_secs: Option<u32>,
    },

    #[error("The AI service declined to answer ({reason}).")]
    ServiceBlocked { reason: String },

    #[error("The AI service returned an empty response.")]
    EmptyResponse,

    /// `raw` holds the offending model output for diagnostics only.
    #[error("AI response did not contain a valid JSON object: {reason}")]
    MalformedResponse { reason: String, raw: String },

    #[error("{0}")]
    SymbolRejected(String),

    #[error("AI data inconsistency: {0}")]
    IncompleteData(String),

    #[error("AI data inconsistency: {0}")]
    InconsistentData(String),
}

impl SentimentError {
    pub fn rate_limit(retry_after: Option<u32>) -> Self {
        Self::TransportFailure {
            kind: TransportKind::RateLimit,
            message: "Too many requests. Please wait a moment.".to_string(),
            retry_after_secs: retry_after,
        }
    }

    pub fn quota_exceeded() -> Self {
        Self::TransportFailure {
            kind: TransportKind::QuotaExceeded,
            message: "Quota exhausted for the AI service.".to_string(),
            retry_after_secs: None,
        }
    }

    pub fn invalid_api_key() -> Self {
        Self::TransportFailure {
            kind: TransportKind::InvalidApiKey,
            message: "Invalid API key. Please check your configuration.".to_string(),
            retry_after_secs: None,
        }
    }

    pub fn model_not_found(model: &str) -> Self {
        Self::TransportFailure {
            kind: TransportKind::ModelNotFound,
            message: format!("Model '{}' is not available.", model),
            retry_after_secs: None,
        }
    }

    pub fn server_error(details: &str) -> Self {
        Self::TransportFailure {
            kind: TransportKind::ServerError,
            message: format!("AI service error: {}", details),
            retry_after_secs: Some(5),
        }
    }

    pub fn network_error(details: &str) -> Self {
        Self::TransportFailure {
            kind: TransportKind::NetworkError,
            message: format!("Network error: {}", details),
            retry_after_secs: Some(3),
        }
    }

    pub fn transport_other(message: &str) -> Self {
        Self::TransportFailure {
            kind: TransportKind::Other,
            message: message.to_string(),
            retry_after_secs: None,
        }
    }

    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: excerpt(raw, RAW_DIAGNOSTIC_CHARS),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptySymbol => ErrorKind::EmptySymbol,
            Self::TransportFailure { .. } => ErrorKind::TransportFailure,
            Self::ServiceBlocked { .. } => ErrorKind::ServiceBlocked,
            Self::EmptyResponse => ErrorKind::EmptyResponse,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::SymbolRejected(_) => ErrorKind::SymbolRejected,
            Self::IncompleteData(_) => ErrorKind::IncompleteData,
            Self::InconsistentData(_) => ErrorKind::InconsistentData,
        }
    }

    /// Soft, user-correctable failure: shown as a notice, not as an error
    pub fn is_validation_notice(&self) -> bool {
        matches!(self, Self::SymbolRejected(_))
    }

    /// Check if a caller-side retry could help
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure {
                kind: TransportKind::RateLimit | TransportKind::ServerError | TransportKind::NetworkError,
                ..
            }
        )
    }

    pub fn retry_after_secs(&self) -> Option<u32> {
        match self {
            Self::TransportFailure { retry_after_secs, .. } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Serializable view of a [`SentimentError`] for the dashboard
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    pub validation_notice: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_kind: Option<TransportKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u32>,
}

impl From<&SentimentError> for ErrorPayload {
    fn from(err: &SentimentError) -> Self {
        let transport_kind = match err {
            SentimentError::TransportFailure { kind, .. } => Some(*kind),
            _ => None,
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            validation_notice: err.is_validation_notice(),
            transport_kind,
            retry_after_secs: err.retry_after_secs(),
        }
    }
}

impl From<SentimentError> for ErrorPayload {
    fn from(err: SentimentError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_symbol_rejection_is_a_notice() {
        assert!(SentimentError::SymbolRejected("bad ticker".into()).is_validation_notice());
        assert!(!SentimentError::EmptyResponse.is_validation_notice());
        assert!(!SentimentError::InconsistentData("x".into()).is_validation_notice());
        assert!(!SentimentError::rate_limit(None).is_validation_notice());
    }

    #[test]
    fn test_retryable_transport_kinds() {
        assert!(SentimentError::rate_limit(Some(4)).is_retryable());
        assert!(SentimentError::server_error("HTTP 503").is_retryable());
        assert!(SentimentError::network_error("timeout").is_retryable());
        assert!(!SentimentError::invalid_api_key().is_retryable());
        assert!(!SentimentError::quota_exceeded().is_retryable());
        assert!(!SentimentError::EmptyResponse.is_retryable());
    }

    #[test]
    fn test_malformed_keeps_raw_out_of_message() {
        let err = SentimentError::malformed("no JSON object found", "SECRET RAW TEXT");
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert!(!err.to_string().contains("SECRET RAW TEXT"));
        match err {
            SentimentError::MalformedResponse { raw, .. } => assert_eq!(raw, "SECRET RAW TEXT"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_truncates_raw() {
        let long = "x".repeat(RAW_DIAGNOSTIC_CHARS + 50);
        match SentimentError::malformed("bad", &long) {
            SentimentError::MalformedResponse { raw, .. } => {
                assert_eq!(raw.chars().count(), RAW_DIAGNOSTIC_CHARS)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_payload_serialization() {
        let payload = ErrorPayload::from(SentimentError::rate_limit(Some(7)));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "transport_failure");
        assert_eq!(json["transportKind"], "rate_limit");
        assert_eq!(json["retryAfterSecs"], 7);
        assert_eq!(json["validationNotice"], false);

        let payload = ErrorPayload::from(SentimentError::SymbolRejected("bad ticker".into()));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "symbol_rejected");
        assert_eq!(json["message"], "bad ticker");
        assert_eq!(json["validationNotice"], true);
        assert!(json.get("transportKind").is_none());
    }
}
