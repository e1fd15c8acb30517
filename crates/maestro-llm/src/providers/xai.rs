//! xAI - Grok provider (OpenAI-compatible endpoint)

use tracing::instrument;

use crate::error::Result;
use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider, ProviderConfig};
use crate::providers::openai::ChatCompletionsClient;

const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
const DEFAULT_MODEL: &str = "grok-4";

/// xAI Grok provider
pub struct XaiProvider {
    inner: ChatCompletionsClient,
}

impl XaiProvider {
    /// Create a new xAI provider
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self {
            inner: ChatCompletionsClient::new("xai", DEFAULT_BASE_URL, config)?,
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for XaiProvider {
    fn name(&self) -> &str {
        "xai"
    }

    fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model_override().unwrap_or(DEFAULT_MODEL)
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let fallback = self.default_model().to_string();
        self.inner.complete(request, &fallback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_without_key() {
        let provider = XaiProvider::new(ProviderConfig::default()).unwrap();
        assert!(!provider.is_configured());
        assert_eq!(provider.default_model(), DEFAULT_MODEL);
        assert!(provider.validate_model("grok-4"));
    }
}
