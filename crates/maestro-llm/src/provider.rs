//! Provider abstraction - core trait and completion types
//!
//! Defines the `LlmProvider` trait every completion backend implements,
//! along with the request/response types shared by all providers.

use crate::catalog;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Role in a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions)
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl MessageRole {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Message content
    pub content: String,
}

impl Message {
    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// Completion request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model to use (provider-specific)
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new completion request
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Add a message
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,
    /// Token usage
    pub usage: Option<TokenUsage>,
    /// Finish reason
    pub finish_reason: Option<String>,
    /// Model used
    pub model: String,
}

/// Configuration for a provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    /// Default model
    pub default_model: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

impl ProviderConfig {
    /// Default request timeout when none is configured
    pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

    /// Load a config from the provider's `<NAME>_API_KEY` environment variable
    #[must_use]
    pub fn from_env(provider: &str) -> Self {
        let var = format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"));
        let api_key = std::env::var(&var).ok().filter(|k| !k.trim().is_empty());
        Self {
            api_key,
            ..Default::default()
        }
    }

    /// Whether this config carries a usable API key
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    /// Effective request timeout
    #[must_use]
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms.unwrap_or(Self::DEFAULT_TIMEOUT_MS))
    }

    /// The configured API key, or `NotConfigured` for the given provider
    pub fn require_api_key(&self, provider: &str) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::NotConfigured(provider.to_string()))
    }
}

/// Source of stored provider configuration.
///
/// The fallback service scans configured providers through this seam so it
/// stays decoupled from where configuration actually lives.
pub trait ProviderConfigSource: Send + Sync {
    /// Stored configuration for a provider, if any
    fn config_for(&self, provider: &str) -> Option<ProviderConfig>;
}

/// Trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Whether the provider is ready to produce completions
    fn is_configured(&self) -> bool;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Get available models
    fn available_models(&self) -> Vec<String> {
        catalog::models_for(self.name())
            .iter()
            .map(|m| m.name.to_string())
            .collect()
    }

    /// Whether the provider supports the given model
    fn validate_model(&self, model: &str) -> bool {
        self.available_models().iter().any(|m| m == model)
    }

    /// Alternative models from this provider, excluding the rejected one
    fn alternative_models(&self, model: &str) -> Vec<String> {
        self.available_models()
            .into_iter()
            .filter(|m| m != model)
            .collect()
    }

    /// Complete a conversation
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
