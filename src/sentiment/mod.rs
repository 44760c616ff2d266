//! Stock community sentiment reports.
//!
//! [`SentimentAnalyzer::analyze`] is the single entry point used by the
//! dashboard: build the instruction, make one call to the generation service,
//! validate the reply into a [`SentimentReport`].

pub mod session;
pub mod validator;

use serde::Serialize;

use crate::ai::gemini::GeminiClient;
use crate::ai::normalizer::sanitize_symbol_for_prompt;
use crate::ai::parsing::calculate_backoff_delay;
use crate::ai::prompts::{build_sentiment_prompt, sentiment_response_schema, THEME_COUNT, TREND_WEEKS};
use crate::ai::types::{GenerationRequest, SentimentError};
use crate::ai::{invoke, GenerationService};
use crate::config::{ConfigError, SentimentConfig};

pub use session::{AnalysisSession, AnalysisTicket, SessionOutcome, SessionState};
pub use validator::validate_response;

// ============================================================================
// Data Model
// ============================================================================

/// One week's comment breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentTrendPoint {
    pub week: String,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

/// A validated sentiment report.
///
/// Only [`validate_response`] constructs one, so every instance satisfies
/// `positive + negative + neutral == total` and carries exactly three themes
/// per side and four trend points ordered oldest to newest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentReport {
    total_comments: u64,
    positive_comments: u64,
    negative_comments: u64,
    neutral_comments: u64,
    positive_themes: [String; THEME_COUNT],
    negative_themes: [String; THEME_COUNT],
    sentiment_trend: [SentimentTrendPoint; TREND_WEEKS],
}

impl SentimentReport {
    pub fn total_comments(&self) -> u64 {
        self.total_comments
    }

    pub fn positive_comments(&self) -> u64 {
        self.positive_comments
    }

    pub fn negative_comments(&self) -> u64 {
        self.negative_comments
    }

    pub fn neutral_comments(&self) -> u64 {
        self.neutral_comments
    }

    pub fn positive_themes(&self) -> &[String; THEME_COUNT] {
        &self.positive_themes
    }

    pub fn negative_themes(&self) -> &[String; THEME_COUNT] {
        &self.negative_themes
    }

    /// Oldest week first
    pub fn sentiment_trend(&self) -> &[SentimentTrendPoint; TREND_WEEKS] {
        &self.sentiment_trend
    }

    /// Share of positive comments in percent, 0 when there are no comments
    pub fn positive_percent(&self) -> f64 {
        percent(self.positive_comments, self.total_comments)
    }

    pub fn negative_percent(&self) -> f64 {
        percent(self.negative_comments, self.total_comments)
    }

    pub fn neutral_percent(&self) -> f64 {
        percent(self.neutral_comments, self.total_comments)
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Builds requests, invokes the generation service and validates replies
pub struct SentimentAnalyzer<G> {
    service: G,
    model: String,
    structured_output: bool,
}

impl SentimentAnalyzer<GeminiClient> {
    /// Analyzer backed by Gemini. Fails at construction when the key is unusable.
    pub fn from_config(config: &SentimentConfig) -> Result<Self, ConfigError> {
        let client = GeminiClient::new(config)?;
        Ok(Self::new(client, &config.model).with_structured_output(config.structured_output))
    }
}

impl<G: GenerationService> SentimentAnalyzer<G> {
    pub fn new(service: G, model: &str) -> Self {
        Self {
            service,
            model: model.to_string(),
            structured_output: true,
        }
    }

    /// Whether to send the response schema along with the instruction
    pub fn with_structured_output(mut self, enabled: bool) -> Self {
        self.structured_output = enabled;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the outbound request for a symbol. Blank symbols never reach the service,
    /// including ones that are nothing but characters stripped from the instruction.
    pub fn build_request(&self, symbol: &str) -> Result<GenerationRequest, SentimentError> {
        let symbol = symbol.trim();
        if sanitize_symbol_for_prompt(symbol).is_empty() {
            return Err(SentimentError::EmptySymbol);
        }

        Ok(GenerationRequest {
            model: self.model.clone(),
            instruction: build_sentiment_prompt(symbol),
            response_schema: self.structured_output.then(sentiment_response_schema),
        })
    }

    /// Produce a validated report for `symbol` with exactly one outbound call.
    ///
    /// Case folding is the caller's job (see [`crate::ai::normalize_symbol`]).
    pub async fn analyze(&self, symbol: &str) -> Result<SentimentReport, SentimentError> {
        let request = self.build_request(symbol)?;
        let symbol = symbol.trim();

        log::info!("Analyzing sentiment for {} with {}", symbol, self.model);
        let raw = invoke(&self.service, &request).await?;
        let report = validate_response(&raw, symbol)?;
        log::info!(
            "Sentiment for {}: {} comments ({} positive, {} negative, {} neutral)",
            symbol,
            report.total_comments,
            report.positive_comments,
            report.negative_comments,
            report.neutral_comments
        );
        Ok(report)
    }

    /// [`Self::analyze`] plus caller-side retries for transient transport failures.
    ///
    /// Waits for the provider's suggested delay when given, otherwise backs
    /// off exponentially.
    pub async fn analyze_with_retry(
        &self,
        symbol: &str,
        max_retries: u32,
    ) -> Result<SentimentReport, SentimentError> {
        let mut attempt = 0;
        loop {
            match self.analyze(symbol).await {
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = e
                        .retry_after_secs()
                        .map(|secs| std::time::Duration::from_secs(u64::from(secs)))
                        .unwrap_or_else(|| calculate_backoff_delay(attempt));
                    log::warn!(
                        "Retrying sentiment analysis for {} in {:?} (attempt {}/{}): {}",
                        symbol.trim(),
                        delay,
                        attempt + 1,
                        max_retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ai::types::{ErrorKind, GenerationReply};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned replies and counts calls
    pub(crate) struct FakeService {
        replies: Mutex<VecDeque<Result<GenerationReply, SentimentError>>>,
        pub calls: AtomicUsize,
        pub last_request: Mutex<Option<GenerationRequest>>,
    }

    impl FakeService {
        pub fn new(replies: Vec<Result<GenerationReply, SentimentError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        pub fn text(text: &str) -> Self {
            Self::new(vec![Ok(GenerationReply {
                text: text.to_string(),
                ..Default::default()
            })])
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationService for FakeService {
        async fn generate(&self, request: &GenerationRequest) -> Result<GenerationReply, SentimentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SentimentError::transport_other("no canned reply left")))
        }
    }

    pub(crate) const VALID_REPLY: &str = r#"{
        "validSymbol": true,
        "error": null,
        "totalComments": 35,
        "positiveComments": 10,
        "negativeComments": 20,
        "neutralComments": 5,
        "positiveThemes": ["Earnings beat", "Buybacks", "New product"],
        "negativeThemes": ["Valuation", "Lawsuit", "Guidance"],
        "sentimentTrend": [
            {"week": "4 Weeks Ago", "positive": 2, "negative": 5, "neutral": 1},
            {"week": "3 Weeks Ago", "positive": 3, "negative": 4, "neutral": 1},
            {"week": "2 Weeks Ago", "positive": 2, "negative": 6, "neutral": 2},
            {"week": "Last Week", "positive": 3, "negative": 5, "neutral": 1}
        ]
    }"#;

    #[tokio::test]
    async fn test_analyze_makes_exactly_one_call() {
        let analyzer = SentimentAnalyzer::new(FakeService::text(VALID_REPLY), "gemini-2.5-flash");
        let report = analyzer.analyze("AAPL").await.unwrap();
        assert_eq!(analyzer.service.calls(), 1);
        assert_eq!(report.total_comments(), 35);
        assert_eq!(report.positive_themes(), &["Earnings beat", "Buybacks", "New product"]);
        assert_eq!(report.sentiment_trend()[1].week, "3 Weeks Ago");
    }

    #[tokio::test]
    async fn test_blank_symbol_makes_no_call() {
        let analyzer = SentimentAnalyzer::new(FakeService::text(VALID_REPLY), "gemini-2.5-flash");
        for symbol in ["", "   ", "\t\n"] {
            assert_eq!(analyzer.analyze(symbol).await.unwrap_err(), SentimentError::EmptySymbol);
        }
        assert_eq!(analyzer.service.calls(), 0);
    }

    #[tokio::test]
    async fn test_symbol_of_only_stripped_characters_makes_no_call() {
        let analyzer = SentimentAnalyzer::new(FakeService::text(VALID_REPLY), "gemini-2.5-flash");
        for symbol in ["{}", "\"\"", " <> ", "`[]`"] {
            assert_eq!(analyzer.analyze(symbol).await.unwrap_err(), SentimentError::EmptySymbol);
        }
        assert_eq!(analyzer.service.calls(), 0);
    }

    #[tokio::test]
    async fn test_request_carries_model_prompt_and_schema() {
        let analyzer = SentimentAnalyzer::new(FakeService::text(VALID_REPLY), "gemini-2.5-pro");
        analyzer.analyze(" NVDA ").await.unwrap();
        let request = analyzer.service.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "gemini-2.5-pro");
        assert!(request.instruction.contains("\"NVDA\""));
        assert!(request.response_schema.is_some());
    }

    #[tokio::test]
    async fn test_schema_can_be_disabled() {
        let analyzer = SentimentAnalyzer::new(FakeService::text(VALID_REPLY), "gemini-2.5-flash")
            .with_structured_output(false);
        analyzer.analyze("NVDA").await.unwrap();
        let request = analyzer.service.last_request.lock().unwrap().clone().unwrap();
        assert!(request.response_schema.is_none());
    }

    #[tokio::test]
    async fn test_rejection_propagates_as_notice() {
        let analyzer = SentimentAnalyzer::new(
            FakeService::text(r#"{"validSymbol": false, "error": "bad ticker"}"#),
            "gemini-2.5-flash",
        );
        let err = analyzer.analyze("XXXX").await.unwrap_err();
        assert_eq!(err, SentimentError::SymbolRejected("bad ticker".to_string()));
        assert!(err.is_validation_notice());
    }

    #[tokio::test]
    async fn test_blocked_and_empty_replies() {
        let analyzer = SentimentAnalyzer::new(
            FakeService::new(vec![
                Ok(GenerationReply {
                    block_reason: Some("SAFETY".to_string()),
                    ..Default::default()
                }),
                Ok(GenerationReply::default()),
            ]),
            "gemini-2.5-flash",
        );
        assert_eq!(
            analyzer.analyze("AAPL").await.unwrap_err(),
            SentimentError::ServiceBlocked { reason: "SAFETY".to_string() }
        );
        assert_eq!(analyzer.analyze("AAPL").await.unwrap_err(), SentimentError::EmptyResponse);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_unchanged() {
        let analyzer = SentimentAnalyzer::new(
            FakeService::new(vec![Err(SentimentError::invalid_api_key())]),
            "gemini-2.5-flash",
        );
        assert_eq!(analyzer.analyze("AAPL").await.unwrap_err(), SentimentError::invalid_api_key());
    }

    #[tokio::test]
    async fn test_analyze_does_not_retry() {
        let analyzer = SentimentAnalyzer::new(
            FakeService::new(vec![Err(SentimentError::rate_limit(Some(0))), Ok(GenerationReply {
                text: VALID_REPLY.to_string(),
                ..Default::default()
            })]),
            "gemini-2.5-flash",
        );
        let err = analyzer.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert_eq!(analyzer.service.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_on_transient_failure() {
        let analyzer = SentimentAnalyzer::new(
            FakeService::new(vec![Err(SentimentError::rate_limit(Some(0))), Ok(GenerationReply {
                text: VALID_REPLY.to_string(),
                ..Default::default()
            })]),
            "gemini-2.5-flash",
        );
        let report = analyzer.analyze_with_retry("AAPL", 2).await.unwrap();
        assert_eq!(report.total_comments(), 35);
        assert_eq!(analyzer.service.calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_skips_permanent_failures() {
        let analyzer = SentimentAnalyzer::new(
            FakeService::new(vec![Err(SentimentError::invalid_api_key())]),
            "gemini-2.5-flash",
        );
        assert!(analyzer.analyze_with_retry("AAPL", 3).await.is_err());
        assert_eq!(analyzer.service.calls(), 1);

        let analyzer = SentimentAnalyzer::new(FakeService::text("not json"), "gemini-2.5-flash");
        let err = analyzer.analyze_with_retry("AAPL", 3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert_eq!(analyzer.service.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_limit() {
        let analyzer = SentimentAnalyzer::new(
            FakeService::new(vec![
                Err(SentimentError::rate_limit(Some(0))),
                Err(SentimentError::rate_limit(Some(0))),
            ]),
            "gemini-2.5-flash",
        );
        let err = analyzer.analyze_with_retry("AAPL", 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert_eq!(analyzer.service.calls(), 2);
    }

    #[test]
    fn test_report_percentages() {
        let report = validate_response(VALID_REPLY, "AAPL").unwrap();
        assert!((report.positive_percent() - 28.571_428).abs() < 0.001);
        assert!((report.positive_percent() + report.negative_percent() + report.neutral_percent() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_report_percentages() {
        let raw = r#"{"validSymbol": true, "totalComments": 0, "positiveComments": 0,
            "negativeComments": 0, "neutralComments": 0,
            "positiveThemes": ["a", "b", "c"], "negativeThemes": ["d", "e", "f"],
            "sentimentTrend": [
                {"week": "4 Weeks Ago", "positive": 0, "negative": 0, "neutral": 0},
                {"week": "3 Weeks Ago", "positive": 0, "negative": 0, "neutral": 0},
                {"week": "2 Weeks Ago", "positive": 0, "negative": 0, "neutral": 0},
                {"week": "Last Week", "positive": 0, "negative": 0, "neutral": 0}
            ]}"#;
        let report = validate_response(raw, "AAPL").unwrap();
        assert_eq!(report.positive_percent(), 0.0);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = validate_response(VALID_REPLY, "AAPL").unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalComments"], 35);
        assert_eq!(json["positiveThemes"].as_array().unwrap().len(), 3);
        assert_eq!(json["sentimentTrend"][3]["week"], "Last Week");
    }
}
