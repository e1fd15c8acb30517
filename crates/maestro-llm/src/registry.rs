//! Provider registry
//!
//! The single construction point for completion providers. Dispatch is an
//! explicit match over known provider names; unknown names are an error
//! rather than a runtime lookup miss.

use std::sync::Arc;
use tracing::debug;

use crate::catalog::{CURSOR, CURSOR_GUIDED};
use crate::error::{Error, Result};
use crate::provider::{LlmProvider, ProviderConfig};
use crate::providers::{
    AnthropicProvider, CursorProvider, GoogleProvider, MoonshotProvider, NativeSampling,
    OpenAiProvider, XaiProvider,
};

/// Constructs concrete providers by name
#[derive(Debug, Default)]
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Create a new registry
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Construct a provider by name.
    ///
    /// `native_sampling` only applies to the zero-config provider; passing
    /// `None` for it forces that provider into guided mode.
    pub fn create_provider(
        &self,
        name: &str,
        config: ProviderConfig,
        native_sampling: Option<Arc<dyn NativeSampling>>,
    ) -> Result<Arc<dyn LlmProvider>> {
        debug!(provider = name, "Constructing provider");
        let provider: Arc<dyn LlmProvider> = match name {
            "anthropic" => Arc::new(AnthropicProvider::new(config)?),
            "openai" => Arc::new(OpenAiProvider::new(config)?),
            "google" => Arc::new(GoogleProvider::new(config)?),
            "xai" => Arc::new(XaiProvider::new(config)?),
            "moonshot" => Arc::new(MoonshotProvider::new(config)?),
            CURSOR | CURSOR_GUIDED => Arc::new(CursorProvider::new(config, native_sampling)),
            other => return Err(Error::UnknownProvider(other.to_string())),
        };
        Ok(provider)
    }

    /// Provider names this registry can construct
    #[must_use]
    pub fn known_providers(&self) -> Vec<&'static str> {
        vec!["anthropic", "openai", "google", "xai", "moonshot", CURSOR]
    }
}
