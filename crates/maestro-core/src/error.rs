//! Error types for maestro-core
//!
//! Every fatal error surfaced by this crate carries at least one concrete
//! next step (a model, a provider, or a command to run); an error without
//! a suggestion is treated as a defect.

use maestro_llm::{Mode, ModelSuggestion};
use thiserror::Error;

/// A concrete provider+model+mode pair offered as a next step
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProviderModelSuggestion {
    /// Provider name
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// A mode the model supports
    pub mode: Mode,
}

impl ProviderModelSuggestion {
    /// Build from a catalog suggestion
    #[must_use]
    pub fn from_model(provider: &str, suggestion: ModelSuggestion) -> Self {
        Self {
            provider: provider.to_string(),
            model: suggestion.model,
            mode: suggestion.mode,
        }
    }
}

impl std::fmt::Display for ProviderModelSuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--provider {} --model {} --mode {}", self.provider, self.model, self.mode)
    }
}

/// Structured remediation data attached to provider/model failures
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Remediation {
    /// Providers that currently have usable configuration
    pub configured_providers: Vec<String>,
    /// Concrete model+mode pairs the user can switch to
    pub suggestions: Vec<ProviderModelSuggestion>,
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Bad precondition (e.g. file-path argument does not exist). Fatal,
    /// no retry.
    #[error("validation error: {0}")]
    Validation(String),

    /// Command or resource does not exist. Fatal, no retry.
    #[error("not found: {0}")]
    NotFound(String),

    /// Provider/model misconfiguration or total fallback exhaustion.
    /// Carries structured remediation data.
    #[error("execution error: {message}")]
    Execution {
        /// What went wrong
        message: String,
        /// Actionable alternatives
        remediation: Remediation,
    },

    /// The requested provider has no stored configuration
    #[error("provider not configured: {provider}")]
    ProviderNotConfigured {
        /// Requested provider name
        provider: String,
        /// Actionable alternatives
        remediation: Remediation,
    },

    /// The resolved provider does not support the requested model.
    /// Alternatives are scoped to that same provider, never cross-provider.
    #[error("model '{model}' is not supported by provider '{provider}'")]
    UnsupportedModel {
        /// Resolved provider name
        provider: String,
        /// Rejected model
        model: String,
        /// Alternative models from the same provider
        alternatives: Vec<String>,
    },

    /// Invalid global configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] maestro_llm::Error),

    /// Internal error (serialization, poisoned state)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
///
/// Provides a human-readable message and a concrete suggestion for
/// fixing the problem.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

fn format_suggestions(remediation: &Remediation) -> Option<String> {
    if remediation.suggestions.is_empty() {
        if remediation.configured_providers.is_empty() {
            return Some(
                "No providers are configured. Set an API key such as ANTHROPIC_API_KEY and retry."
                    .to_string(),
            );
        }
        return Some(format!(
            "Configured providers: {}. Pick one with --provider.",
            remediation.configured_providers.join(", ")
        ));
    }
    let lines = remediation
        .suggestions
        .iter()
        .map(|s| format!("  maestro run <command> {s}"))
        .collect::<Vec<_>>()
        .join("\n");
    Some(format!("Try one of:\n{lines}"))
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Validation(msg) => format!("Invalid input: {msg}"),
            Error::NotFound(msg) => format!("Not found: {msg}"),
            Error::Execution { message, .. } => format!("Cannot execute: {message}"),
            Error::ProviderNotConfigured { provider, .. } => {
                format!("Provider '{provider}' is not configured.")
            }
            Error::UnsupportedModel {
                provider, model, ..
            } => format!("Provider '{provider}' does not support model '{model}'."),
            Error::Configuration(msg) => format!("Configuration error: {msg}"),
            Error::Llm(e) => format!("Provider error: {e}"),
            Error::Internal(msg) => format!("Internal error: {msg}"),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Validation(_) => {
                Some("Check the argument; file-path arguments must point to an existing file.".to_string())
            }
            Error::NotFound(_) => {
                Some("Run `maestro commands` to list available commands.".to_string())
            }
            Error::Execution { remediation, .. }
            | Error::ProviderNotConfigured { remediation, .. } => format_suggestions(remediation),
            Error::UnsupportedModel {
                provider,
                alternatives,
                ..
            } => {
                if alternatives.is_empty() {
                    Some(format!(
                        "Provider '{provider}' reports no models; check its configuration."
                    ))
                } else {
                    Some(format!(
                        "Models supported by '{provider}': {}",
                        alternatives.join(", ")
                    ))
                }
            }
            Error::Configuration(_) => {
                Some("Check config.toml in the maestro config directory.".to_string())
            }
            Error::Llm(maestro_llm::Error::NotConfigured(provider)) => Some(format!(
                "Set the {}_API_KEY environment variable.",
                provider.to_uppercase().replace('-', "_")
            )),
            Error::Llm(_) => Some("Retry, or pick another provider with --provider.".to_string()),
            Error::Internal(_) => Some("This is a bug; please report it.".to_string()),
        }
    }
}
