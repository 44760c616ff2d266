//! Registry of Gemini text models usable for sentiment reports.
//!
//! Every listed model supports `responseSchema` constrained decoding.

use serde::Serialize;

// ============================================================================
// Types
// ============================================================================

/// A text-generation model
#[derive(Debug, Clone, Serialize)]
pub struct TextModel {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Model info for the dashboard (owned strings for serialization)
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<&TextModel> for ModelInfo {
    fn from(m: &TextModel) -> Self {
        ModelInfo {
            id: m.id.to_string(),
            name: m.name.to_string(),
            description: m.description.to_string(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Replacement for retired model ids
pub const UPGRADE_TARGET: &str = "gemini-2.0-flash";

pub const TEXT_MODELS: &[TextModel] = &[
    TextModel {
        id: "gemini-2.5-flash",
        name: "Gemini 2.5 Flash",
        description: "Fast and cheap, free tier",
    },
    TextModel {
        id: "gemini-2.5-pro",
        name: "Gemini 2.5 Pro",
        description: "Best quality",
    },
    TextModel {
        id: "gemini-2.5-flash-lite",
        name: "Gemini 2.5 Flash-Lite",
        description: "Lowest latency",
    },
    TextModel {
        id: "gemini-2.0-flash",
        name: "Gemini 2.0 Flash",
        description: "Previous generation, stable",
    },
];

/// All registered models for the dashboard's model picker
pub fn available_models() -> Vec<ModelInfo> {
    TEXT_MODELS.iter().map(ModelInfo::from).collect()
}

pub fn is_known_model(model: &str) -> bool {
    TEXT_MODELS.iter().any(|m| m.id == model)
}

/// Map of deprecated models to their replacements
pub fn get_model_upgrade(model: &str) -> Option<&'static str> {
    match model {
        "gemini-pro" | "gemini-pro-vision" => Some(UPGRADE_TARGET),
        m if m.starts_with("gemini-1") => Some(UPGRADE_TARGET),
        _ => None,
    }
}

/// Resolve a configured model id, upgrading deprecated ones
pub fn resolve_model(model: &str) -> String {
    match get_model_upgrade(model) {
        Some(upgraded) => {
            log::info!("Auto-upgrading deprecated model {} to {}", model, upgraded);
            upgraded.to_string()
        }
        None => {
            if !is_known_model(model) {
                log::warn!("Model {} is not in the registry, using it as configured", model);
            }
            model.to_string()
        }
    }
}
