//! Google Gemini API provider for sentiment reports

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::parsing::{excerpt, parse_retry_delay};
use super::types::{GenerationReply, GenerationRequest, SentimentError, LOG_EXCERPT_CHARS};
use super::GenerationService;
use crate::config::{ConfigError, SentimentConfig};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u32>,
}

impl GenerateContentRequest {
    fn from_request(request: &GenerationRequest) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![TextPart {
                    text: request.instruction.clone(),
                }],
            }],
            generation_config: request.response_schema.as_ref().map(|schema| GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema.clone(),
            }),
        }
    }
}

/// Parse Gemini API error response
fn parse_error(status: u16, body: &str, model: &str) -> SentimentError {
    match status {
        // Gemini reports every 429 as RESOURCE_EXHAUSTED; a retry hint means it will clear
        429 => match parse_retry_delay(body) {
            Some(secs) => SentimentError::rate_limit(Some(secs)),
            None => {
                let body_lower = body.to_lowercase();
                if body_lower.contains("quota") || body_lower.contains("exceeded") ||
                   body_lower.contains("resource_exhausted") {
                    SentimentError::quota_exceeded()
                } else {
                    SentimentError::rate_limit(None)
                }
            }
        },
        401 | 403 => SentimentError::invalid_api_key(),
        404 => SentimentError::model_not_found(model),
        500..=599 => SentimentError::server_error(&format!("HTTP {}", status)),
        _ => SentimentError::transport_other(&format!("HTTP {}: {}", status, excerpt(body, LOG_EXCERPT_CHARS))),
    }
}

/// Turn a successful `generateContent` body into a reply.
///
/// Text of all parts of the first candidate is concatenated. Blocking and
/// emptiness are left for the invoker to interpret.
fn parse_reply_body(body: &str) -> Result<GenerationReply, SentimentError> {
    let data: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| SentimentError::transport_other(&format!("JSON parse error: {}", e)))?;

    let block_reason = data.prompt_feedback.and_then(|f| f.block_reason);
    let candidate = data.candidates.and_then(|c| c.into_iter().next());
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

    let text = candidate
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .map(|parts| {
            parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    Ok(GenerationReply {
        text,
        block_reason,
        finish_reason,
        tokens_used: data.usage_metadata.and_then(|u| u.total_token_count),
    })
}

/// Gemini `generateContent` client. One instance per configured credential.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    /// Build a client. Fails if the credential is missing or cannot be sent
    /// as a header, so misconfiguration surfaces at startup.
    pub fn new(config: &SentimentConfig) -> Result<Self, ConfigError> {
        let api_key = config.api_key();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let mut key_value = HeaderValue::from_str(api_key).map_err(|_| ConfigError::InvalidValue {
            name: "GEMINI_API_KEY".to_string(),
            reason: "contains characters not allowed in an HTTP header".to_string(),
        })?;
        key_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(API_KEY_HEADER, key_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url,
            urlencoding::encode(model)
        )
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationReply, SentimentError> {
        let model = request.model.as_str();
        let body = GenerateContentRequest::from_request(request);

        log::debug!(
            "Gemini request: model={}, instruction_len={}, schema={}",
            model,
            request.instruction.len(),
            request.response_schema.is_some()
        );

        let response = self
            .client
            .post(self.api_url(model))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SentimentError::network_error("request timed out")
                } else if e.is_connect() {
                    SentimentError::network_error("connection failed")
                } else {
                    SentimentError::network_error(&e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SentimentError::network_error(&e.to_string()))?;

        if !status.is_success() {
            log::warn!(
                "Gemini returned HTTP {} for model {}: {}",
                status.as_u16(),
                model,
                excerpt(&text, LOG_EXCERPT_CHARS)
            );
            return Err(parse_error(status.as_u16(), &text, model));
        }

        let reply = parse_reply_body(&text)?;
        log::info!(
            "Gemini reply: model={}, text_len={}, tokens={:?}",
            model,
            reply.text.len(),
            reply.tokens_used
        );
        Ok(reply)
    }
}
