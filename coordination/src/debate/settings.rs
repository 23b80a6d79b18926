//! Per-run debate settings and model selection.

use serde::{Deserialize, Serialize};

use super::state::ContextMode;
use crate::client::{ClientResult, GenerationBackend};
use crate::normalize::OutputMode;

pub const MIN_MAX_TOKENS: u32 = 32;
pub const MAX_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_CONTEXT_WINDOW: u32 = 2048;

/// Model name used when the backend lists nothing.
pub const AUTO_MODEL: &str = "auto";

/// User-tunable settings, captured at the moment a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateSettings {
    pub server_url: String,
    /// Non-empty (after trimming) skips model resolution.
    pub model_override: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub context_window: u32,
    pub context_mode: ContextMode,
    pub output_mode: OutputMode,
    pub preferences: ModelPreferences,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            server_url: std::env::var("DEBATE_SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:11434".into()),
            model_override: std::env::var("DEBATE_MODEL").unwrap_or_default(),
            temperature: std::env::var("DEBATE_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.7),
            max_tokens: std::env::var("DEBATE_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(512),
            context_window: DEFAULT_CONTEXT_WINDOW,
            context_mode: ContextMode::default(),
            output_mode: OutputMode::default(),
            preferences: ModelPreferences::default(),
        }
    }
}

impl DebateSettings {
    /// `max_tokens` clamped to what the backend accepts.
    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens.clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS)
    }
}

/// Preference-ordered model allowlist plus a family fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPreferences {
    pub allowlist: Vec<String>,
    /// Lower-case substring matched against listed names after the allowlist.
    pub family_hint: String,
}

impl Default for ModelPreferences {
    fn default() -> Self {
        Self {
            allowlist: [
                "mk-x-gemma:1b",
                "gemma3:1b",
                "gemma3:4b",
                "gemma3:12b",
                "gemma3:27b",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            family_hint: "gemma".into(),
        }
    }
}

impl ModelPreferences {
    /// Pick a model from `available`.
    ///
    /// Order: first allowlist entry present (case-insensitive), then the
    /// first name containing the family hint, then the first name, then
    /// [`AUTO_MODEL`].
    pub fn choose(&self, available: &[String]) -> String {
        for wanted in &self.allowlist {
            if let Some(found) = available.iter().find(|m| m.eq_ignore_ascii_case(wanted)) {
                return found.clone();
            }
        }

        let hint = self.family_hint.to_lowercase();
        if !hint.is_empty() {
            if let Some(found) = available.iter().find(|m| m.to_lowercase().contains(&hint)) {
                return found.clone();
            }
        }

        available
            .first()
            .cloned()
            .unwrap_or_else(|| AUTO_MODEL.to_string())
    }
}

/// Resolve the model for one run: the explicit override, else the backend's
/// model list filtered through `preferences`.
pub async fn resolve_model(
    backend: &dyn GenerationBackend,
    model_override: &str,
    preferences: &ModelPreferences,
) -> ClientResult<String> {
    let trimmed = model_override.trim();
    if !trimmed.is_empty() {
        return Ok(trimmed.to_string());
    }
    let models = backend.list_models().await?;
    Ok(preferences.choose(&models))
}
