//! Runtime configuration read from the process environment.
//!
//! The API key is required: a missing key is a startup failure, never a
//! per-call error.

use thiserror::Error;

use crate::ai::models::{resolve_model, DEFAULT_MODEL};
use crate::ai::types::REQUEST_TIMEOUT_SECS;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const ENV_API_KEY: &str = "GEMINI_API_KEY";
const ENV_API_KEY_FALLBACK: &str = "API_KEY";
const ENV_MODEL: &str = "GEMINI_MODEL";
const ENV_BASE_URL: &str = "GEMINI_BASE_URL";
const ENV_TIMEOUT: &str = "GEMINI_TIMEOUT_SECS";
const ENV_STRUCTURED: &str = "GEMINI_STRUCTURED_OUTPUT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set; the sentiment service cannot contact the AI provider")]
    MissingApiKey,

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Clone)]
pub struct SentimentConfig {
    api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Send the response schema for constrained decoding
    pub structured_output: bool,
}

impl std::fmt::Debug for SentimentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("structured_output", &self.structured_output)
            .finish()
    }
}

impl SentimentConfig {
    /// Defaults for everything except the credential
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: REQUEST_TIMEOUT_SECS,
            structured_output: true,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(ENV_API_KEY)
            .or_else(|| get(ENV_API_KEY_FALLBACK))
            .ok_or(ConfigError::MissingApiKey)?;

        let mut config = Self::new(&api_key);

        if let Some(model) = get(ENV_MODEL) {
            config.model = resolve_model(&model);
        }
        if let Some(base_url) = get(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(timeout) = get(ENV_TIMEOUT) {
            config.timeout_secs = match timeout.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: ENV_TIMEOUT.to_string(),
                        reason: format!("expected a positive number of seconds, got '{}'", timeout),
                    })
                }
            };
        }
        if let Some(flag) = get(ENV_STRUCTURED) {
            config.structured_output = parse_flag(&flag).ok_or_else(|| ConfigError::InvalidValue {
                name: ENV_STRUCTURED.to_string(),
                reason: format!("expected true/false, got '{}'", flag),
            })?;
        }

        Ok(config)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
