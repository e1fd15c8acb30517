//! Moonshot - Kimi provider (OpenAI-compatible endpoint)

use tracing::instrument;

use crate::error::Result;
use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider, ProviderConfig};
use crate::providers::openai::ChatCompletionsClient;

const DEFAULT_BASE_URL: &str = "https://api.moonshot.ai/v1";
const DEFAULT_MODEL: &str = "kimi-k2";

/// Moonshot Kimi provider
pub struct MoonshotProvider {
    inner: ChatCompletionsClient,
}

impl MoonshotProvider {
    /// Create a new Moonshot provider
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self {
            inner: ChatCompletionsClient::new("moonshot", DEFAULT_BASE_URL, config)?,
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for MoonshotProvider {
    fn name(&self) -> &str {
        "moonshot"
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
