//! Sentiment Scout backend.
//!
//! Asks a generative model for a stock community sentiment report, validates
//! the JSON it returns and hands a trusted [`SentimentReport`] to the dashboard.

pub mod ai;
pub mod config;
pub mod sentiment;

pub use ai::{ErrorKind, ErrorPayload, SentimentError, TransportKind};
pub use config::{ConfigError, SentimentConfig};
pub use sentiment::{
    AnalysisSession, SentimentAnalyzer, SentimentReport, SentimentTrendPoint, SessionOutcome,
    SessionState,
};
