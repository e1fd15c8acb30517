//! OpenAI - chat completions provider
//!
//! Also hosts `ChatCompletionsClient`, the shared OpenAI-compatible wire
//! client reused by the xAI and Moonshot providers.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, ProviderConfig, TokenUsage,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-5";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    error: ChatErrorBody,
}

#[derive(Debug, Deserialize)]
struct ChatErrorBody {
    message: String,
}

/// Shared client for OpenAI-compatible chat completion endpoints
pub struct ChatCompletionsClient {
    provider_name: &'static str,
    base_url: String,
    client: Client,
    config: ProviderConfig,
}

impl ChatCompletionsClient {
    /// Create a client for an OpenAI-compatible endpoint
    pub fn new(
        provider_name: &'static str,
        default_base_url: &str,
        config: ProviderConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url.to_string());
        Ok(Self {
            provider_name,
            base_url,
            client,
            config,
        })
    }

    /// Whether a usable API key is configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.has_api_key()
    }

    /// Configured default model override, if any
    #[must_use]
    pub fn default_model_override(&self) -> Option<&str> {
        self.config.default_model.as_deref()
    }

    /// Run a completion against the chat completions endpoint
    pub async fn complete(
        &self,
        request: CompletionRequest,
        fallback_model: &str,
    ) -> Result<CompletionResponse> {
        let model = if request.model.is_empty() {
            fallback_model.to_string()
        } else {
            request.model.clone()
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = self.provider_name, %url, "Sending chat completion request");

        let api_key = self.config.require_api_key(self.provider_name)?;
        let wire_request = ChatRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(Error::RateLimit);
            }
            if let Ok(error) = serde_json::from_str::<ChatError>(&body) {
                return Err(Error::Api(error.error.message));
            }
            return Err(Error::Api(format!("HTTP {status}")));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("response carried no choices".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
            model: parsed.model,
        })
    }
}

/// OpenAI GPT provider
pub struct OpenAiProvider {
    inner: ChatCompletionsClient,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self {
            inner: ChatCompletionsClient::new("openai", DEFAULT_BASE_URL, config)?,
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
        let provider = OpenAiProvider::new(ProviderConfig::default()).unwrap();
        assert!(!provider.is_configured());
        assert_eq!(provider.default_model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_base_url_override() {
        let config = ProviderConfig {
            base_url: Some("https://proxy.internal/v1".to_string()),
            ..Default::default()
        };
        let client = ChatCompletionsClient::new("openai", DEFAULT_BASE_URL, config).unwrap();
        assert_eq!(client.base_url, "https://proxy.internal/v1");
    }

    #[test]
    fn test_model_validation_from_catalog() {
        let provider = OpenAiProvider::new(ProviderConfig::default()).unwrap();
        assert!(provider.validate_model("gpt-5"));
        assert!(!provider.validate_model("claude-sonnet-4.5"));
    }
}
