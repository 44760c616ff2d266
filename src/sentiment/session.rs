//! Dashboard analysis state with stale-result discard.
//!
//! At most one analysis is current. Starting a new one or cancelling
//! invalidates the outstanding ticket, and a late result for an invalidated
//! ticket is dropped instead of overwriting newer state.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{SentimentAnalyzer, SentimentReport};
use crate::ai::types::SentimentError;
use crate::ai::GenerationService;

/// What the dashboard currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Loading { symbol: String },
    Ready { symbol: String, report: Arc<SentimentReport> },
    Failed { symbol: String, error: SentimentError },
}

/// Proof of which analysis a result belongs to
#[derive(Debug)]
pub struct AnalysisTicket {
    generation: u64,
    symbol: String,
}

impl AnalysisTicket {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Result of [`AnalysisSession::run`]
#[derive(Debug)]
pub enum SessionOutcome {
    Applied(Result<Arc<SentimentReport>, SentimentError>),
    /// A newer analysis or a cancel happened while this one was in flight
    Superseded,
}

struct Inner {
    generation: u64,
    state: SessionState,
}

pub struct AnalysisSession {
    inner: Mutex<Inner>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                generation: 0,
                state: SessionState::Idle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // State is replaced wholesale, so a poisoned guard still holds a consistent value
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new analysis, superseding any outstanding one
    pub fn begin(&self, symbol: &str) -> AnalysisTicket {
        let mut inner = self.lock();
        if let SessionState::Loading { symbol: previous } = &inner.state {
            log::info!("Analysis for {} superseded by {}", previous, symbol);
        }
        inner.generation += 1;
        inner.state = SessionState::Loading {
            symbol: symbol.to_string(),
        };
        AnalysisTicket {
            generation: inner.generation,
            symbol: symbol.to_string(),
        }
    }

    /// Apply a finished result if its ticket is still current.
    ///
    /// Returns `false` when the result was discarded.
    pub fn complete(
        &self,
        ticket: AnalysisTicket,
        result: Result<SentimentReport, SentimentError>,
    ) -> bool {
        self.apply(ticket, result.map(Arc::new))
    }

    fn apply(&self, ticket: AnalysisTicket, result: Result<Arc<SentimentReport>, SentimentError>) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            log::debug!("Discarding stale result for {}", ticket.symbol);
            return false;
        }
        inner.state = match result {
            Ok(report) => SessionState::Ready {
                symbol: ticket.symbol,
                report,
            },
            Err(error) => SessionState::Failed {
                symbol: ticket.symbol,
                error,
            },
        };
        true
    }

    /// Abandon the outstanding analysis, if any, and return to idle
    pub fn cancel(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.state = SessionState::Idle;
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.lock().state, SessionState::Loading { .. })
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// Run one analysis through `analyzer` and apply it unless superseded
    pub async fn run<G: GenerationService>(
        &self,
        analyzer: &SentimentAnalyzer<G>,
        symbol: &str,
    ) -> SessionOutcome {
        let ticket = self.begin(symbol);
        let result = analyzer.analyze(symbol).await.map(Arc::new);
        if self.apply(ticket, result.clone()) {
            SessionOutcome::Applied(result)
        } else {
            SessionOutcome::Superseded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{GenerationReply, GenerationRequest};
    use crate::sentiment::tests::{FakeService, VALID_REPLY};
    use crate::sentiment::validate_response;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn report() -> SentimentReport {
        validate_response(VALID_REPLY, "AAPL").unwrap()
    }

    #[test]
    fn test_starts_idle() {
        let session = AnalysisSession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_loading());
    }

    #[test]
    fn test_current_ticket_is_applied() {
        let session = AnalysisSession::new();
        let ticket = session.begin("AAPL");
        assert!(session.is_loading());
        assert!(session.complete(ticket, Ok(report())));
        match session.state() {
            SessionState::Ready { symbol, report } => {
                assert_eq!(symbol, "AAPL");
                assert_eq!(report.total_comments(), 35);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let session = AnalysisSession::new();
        let first = session.begin("AAPL");
        let second = session.begin("TSLA");

        assert!(!session.complete(first, Ok(report())));
        assert_eq!(session.state(), SessionState::Loading { symbol: "TSLA".to_string() });

        assert!(session.complete(second, Err(SentimentError::EmptyResponse)));
        assert_eq!(
            session.state(),
            SessionState::Failed {
                symbol: "TSLA".to_string(),
                error: SentimentError::EmptyResponse
            }
        );
    }

    #[test]
    fn test_cancel_discards_in_flight_result() {
        let session = AnalysisSession::new();
        let ticket = session.begin("AAPL");
        session.cancel();
        assert!(!session.is_loading());
        assert!(!session.complete(ticket, Ok(report())));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_run_applies_result() {
        let session = AnalysisSession::new();
        let analyzer = SentimentAnalyzer::new(FakeService::text(VALID_REPLY), "gemini-2.5-flash");
        match session.run(&analyzer, "AAPL").await {
            SessionOutcome::Applied(Ok(report)) => assert_eq!(report.total_comments(), 35),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(session.state(), SessionState::Ready { .. }));
    }

    #[tokio::test]
    async fn test_run_records_failure() {
        let session = AnalysisSession::new();
        let analyzer = SentimentAnalyzer::new(FakeService::text(VALID_REPLY), "gemini-2.5-flash");
        match session.run(&analyzer, "  ").await {
            SessionOutcome::Applied(Err(SentimentError::EmptySymbol)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            session.state(),
            SessionState::Failed { error: SentimentError::EmptySymbol, .. }
        ));
    }

    /// Holds its reply until released
    struct GatedService {
        gate: Notify,
    }

    #[async_trait]
    impl GenerationService for GatedService {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationReply, SentimentError> {
            self.gate.notified().await;
            Ok(GenerationReply {
                text: VALID_REPLY.to_string(),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_newer_run_supersedes_slow_one() {
        let session = AnalysisSession::new();
        let slow = SentimentAnalyzer::new(GatedService { gate: Notify::new() }, "gemini-2.5-flash");
        let fast = SentimentAnalyzer::new(
            FakeService::text(r#"{"validSymbol": false, "error": "bad ticker"}"#),
            "gemini-2.5-flash",
        );

        let (slow_outcome, fast_outcome) = tokio::join!(session.run(&slow, "AAPL"), async {
            let outcome = session.run(&fast, "XXXX").await;
            slow.service.gate.notify_one();
            outcome
        });

        assert!(matches!(slow_outcome, SessionOutcome::Superseded));
        assert!(matches!(
            fast_outcome,
            SessionOutcome::Applied(Err(SentimentError::SymbolRejected(_)))
        ));
        assert_eq!(
            session.state(),
            SessionState::Failed {
                symbol: "XXXX".to_string(),
                error: SentimentError::SymbolRejected("bad ticker".to_string())
            }
        );
    }
}
