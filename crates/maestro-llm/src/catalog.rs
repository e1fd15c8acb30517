//! Static model catalog
//!
//! Known providers, their models, and which execution modes each model
//! supports. Model+mode validation happens against this table before any
//! provider is constructed, and keyword inference maps a bare model string
//! to its provider.

use serde::{Deserialize, Serialize};

/// Zero-config provider identifier (native sampling inside the host IDE)
pub const CURSOR: &str = "cursor";

/// Name reported by the zero-config provider when running in guided mode
pub const CURSOR_GUIDED: &str = "cursor-guided";

/// Fixed priority order for API-key fallback scanning.
///
/// Total order: the first configured entry always wins, so no two
/// providers can tie.
pub const FALLBACK_PRIORITY: [&str; 5] = ["anthropic", "openai", "google", "xai", "moonshot"];

/// Execution mode a model can run a command in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Single-turn conversational completion
    Chat,
    /// Plan-producing completion
    Plan,
    /// Tool-using agentic completion
    Agent,
}

impl Mode {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Plan => "plan",
            Self::Agent => "agent",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "plan" => Ok(Self::Plan),
            "agent" => Ok(Self::Agent),
            other => Err(format!("unknown mode '{other}' (expected chat, plan or agent)")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A known model and the modes it supports
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    /// Model identifier
    pub name: &'static str,
    /// Supported execution modes
    pub modes: &'static [Mode],
}

/// A concrete model+mode pair offered as remediation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSuggestion {
    /// Model identifier
    pub model: String,
    /// A mode the model supports
    pub mode: Mode,
}

const ALL_MODES: &[Mode] = &[Mode::Chat, Mode::Plan, Mode::Agent];
const CHAT_ONLY: &[Mode] = &[Mode::Chat];
const CHAT_AGENT: &[Mode] = &[Mode::Chat, Mode::Agent];

const ANTHROPIC_MODELS: &[ModelSpec] = &[
    ModelSpec { name: "claude-sonnet-4.5", modes: ALL_MODES },
    ModelSpec { name: "claude-opus-4.1", modes: ALL_MODES },
    ModelSpec { name: "claude-haiku-4.5", modes: CHAT_ONLY },
];

const OPENAI_MODELS: &[ModelSpec] = &[
    ModelSpec { name: "gpt-5", modes: ALL_MODES },
    ModelSpec { name: "gpt-5-mini", modes: CHAT_AGENT },
    ModelSpec { name: "gpt-4o", modes: CHAT_ONLY },
];

const GOOGLE_MODELS: &[ModelSpec] = &[
    ModelSpec { name: "gemini-2.5-pro", modes: ALL_MODES },
    ModelSpec { name: "gemini-2.5-flash", modes: CHAT_ONLY },
];

const XAI_MODELS: &[ModelSpec] = &[
    ModelSpec { name: "grok-4", modes: ALL_MODES },
    ModelSpec { name: "grok-3-mini", modes: CHAT_ONLY },
];

const MOONSHOT_MODELS: &[ModelSpec] = &[
    ModelSpec { name: "kimi-k2", modes: CHAT_AGENT },
];

// The zero-config provider delegates model choice to the host.
const CURSOR_MODELS: &[ModelSpec] = &[ModelSpec { name: "auto", modes: ALL_MODES }];

/// Known models for a provider (empty slice for unknown providers)
#[must_use]
pub fn models_for(provider: &str) -> &'static [ModelSpec] {
    match provider {
        "anthropic" => ANTHROPIC_MODELS,
        "openai" => OPENAI_MODELS,
        "google" => GOOGLE_MODELS,
        "xai" => XAI_MODELS,
        "moonshot" => MOONSHOT_MODELS,
        CURSOR | CURSOR_GUIDED => CURSOR_MODELS,
        _ => &[],
    }
}

/// Whether the model is in the catalog for this provider
#[must_use]
pub fn is_known_model(provider: &str, model: &str) -> bool {
    models_for(provider).iter().any(|m| m.name == model)
}

/// Whether the model+mode combination is valid for this provider.
///
/// Unknown models are not judged here; model existence is validated later
/// against the concrete provider.
#[must_use]
pub fn supports_mode(provider: &str, model: &str, mode: Mode) -> bool {
    models_for(provider)
        .iter()
        .find(|m| m.name == model)
        .is_none_or(|m| m.modes.contains(&mode))
}

/// Valid modes for a known model
#[must_use]
pub fn valid_modes(provider: &str, model: &str) -> Vec<Mode> {
    models_for(provider)
        .iter()
        .find(|m| m.name == model)
        .map(|m| m.modes.to_vec())
        .unwrap_or_default()
}

/// Infer the provider from a model string keyword.
///
/// No match falls back to the zero-config provider.
#[must_use]
pub fn infer_provider(model: &str) -> &'static str {
    let model = model.to_lowercase();
    if model.starts_with("claude") {
        "anthropic"
    } else if model.starts_with("gpt") {
        "openai"
    } else if model.starts_with("gemini") {
        "google"
    } else if model.starts_with("grok") {
        "xai"
    } else if model.starts_with("kimi") {
        "moonshot"
    } else {
        CURSOR
    }
}

/// Up to `limit` model+mode suggestions for a provider, for error remediation
#[must_use]
pub fn suggestions(provider: &str, limit: usize) -> Vec<ModelSuggestion> {
    models_for(provider)
        .iter()
        .filter_map(|m| {
            m.modes.first().map(|mode| ModelSuggestion {
                model: m.name.to_string(),
                mode: *mode,
            })
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_provider_keywords() {
        assert_eq!(infer_provider("claude-sonnet-4.5"), "anthropic");
        assert_eq!(infer_provider("gpt-5"), "openai");
        assert_eq!(infer_provider("gemini-2.5-pro"), "google");
        assert_eq!(infer_provider("grok-4"), "xai");
        assert_eq!(infer_provider("kimi-k2"), "moonshot");
        // No keyword match falls back to the zero-config provider
        assert_eq!(infer_provider("llama-3.3"), CURSOR);
    }

    #[test]
    fn test_supports_mode() {
        assert!(supports_mode("anthropic", "claude-sonnet-4.5", Mode::Agent));
        assert!(!supports_mode("anthropic", "claude-haiku-4.5", Mode::Agent));
        assert!(!supports_mode("openai", "gpt-4o", Mode::Plan));
        // Unknown models are not judged by the catalog
        assert!(supports_mode("anthropic", "claude-next", Mode::Agent));
    }

    #[test]
    fn test_valid_modes() {
        let modes = valid_modes("openai", "gpt-5-mini");
        assert_eq!(modes, vec![Mode::Chat, Mode::Agent]);
        assert!(valid_modes("anthropic", "unknown-model").is_empty());
    }

    #[test]
    fn test_suggestions_limit() {
        let s = suggestions("anthropic", 2);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].model, "claude-sonnet-4.5");

        assert!(suggestions("unknown", 3).is_empty());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("chat".parse::<Mode>().unwrap(), Mode::Chat);
        assert_eq!("AGENT".parse::<Mode>().unwrap(), Mode::Agent);
        assert!("turbo".parse::<Mode>().is_err());
    }
}
