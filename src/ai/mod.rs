//! AI provider boundary for sentiment reports.
//!
//! The generation service is an untrusted, non-deterministic collaborator:
//! [`GenerationService`] is the injectable transport, [`invoke`] interprets a
//! reply into raw text or a structured failure.

pub mod gemini;
pub mod models;
pub mod normalizer;
pub mod parsing;
pub mod prompts;
pub mod types;

use async_trait::async_trait;

pub use models::{available_models, get_model_upgrade, resolve_model, ModelInfo, DEFAULT_MODEL};
pub use normalizer::{normalize_ai_response, normalize_symbol};
pub use parsing::{calculate_backoff_delay, extract_json_object, parse_retry_delay};
pub use prompts::{build_sentiment_prompt, sentiment_response_schema};
pub use types::{
    ErrorKind, ErrorPayload, GenerationReply, GenerationRequest, SentimentError, TransportKind,
};

/// Finish reasons that mean the provider withheld the answer
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

/// One non-streaming call to a text-generation provider.
///
/// Implementations report transport problems as
/// [`SentimentError::TransportFailure`] and otherwise return the reply
/// untouched, including empty text and block reasons.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationReply, SentimentError>;
}

/// Send one request and return the raw reply text.
///
/// No retries happen here; retry policy belongs to the caller.
pub async fn invoke<G>(service: &G, request: &GenerationRequest) -> Result<String, SentimentError>
where
    G: GenerationService + ?Sized,
{
    let reply = service.generate(request).await?;
    interpret_reply(reply)
}

fn interpret_reply(reply: GenerationReply) -> Result<String, SentimentError> {
    if let Some(reason) = reply.block_reason.filter(|r| !r.trim().is_empty()) {
        log::warn!("Generation blocked by provider: {}", reason);
        return Err(SentimentError::ServiceBlocked { reason });
    }

    if reply.text.trim().is_empty() {
        if let Some(reason) = reply
            .finish_reason
            .filter(|r| BLOCKING_FINISH_REASONS.contains(&r.as_str()))
        {
            log::warn!("Generation stopped by provider: {}", reason);
            return Err(SentimentError::ServiceBlocked { reason });
        }
        return Err(SentimentError::EmptyResponse);
    }

    Ok(reply.text)
}
