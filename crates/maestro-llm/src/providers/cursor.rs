//! Cursor - zero-config host provider
//!
//! Inside the host IDE this provider completes through an injected native
//! sampling capability and needs no API key. Without the capability it runs
//! in guided mode: `complete` emits a structured prompt payload for the
//! human/IDE to execute manually and never touches the network.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::catalog::{CURSOR, CURSOR_GUIDED};
use crate::error::Result;
use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider, ProviderConfig};

/// Native sampling capability supplied by the host IDE
#[async_trait::async_trait]
pub trait NativeSampling: Send + Sync {
    /// Produce a completion through the host's sampling channel
    async fn sample(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Structured prompt payload emitted in guided mode
#[derive(Debug, Serialize)]
struct GuidedPrompt<'a> {
    kind: &'static str,
    model: &'a str,
    messages: &'a [crate::provider::Message],
    instructions: &'static str,
}

/// Zero-config provider backed by native sampling or guided mode
pub struct CursorProvider {
    config: ProviderConfig,
    sampling: Option<Arc<dyn NativeSampling>>,
}

impl CursorProvider {
    /// Create the provider. With `sampling` present it uses the host's
    /// native channel; without it the provider is forced into guided mode.
    #[must_use]
    pub fn new(config: ProviderConfig, sampling: Option<Arc<dyn NativeSampling>>) -> Self {
        Self { config, sampling }
    }

    fn guided_payload(&self, request: &CompletionRequest) -> Result<String> {
        let payload = GuidedPrompt {
            kind: "guided_prompt",
            model: if request.model.is_empty() {
                self.default_model()
            } else {
                &request.model
            },
            messages: &request.messages,
            instructions: "Execute this prompt in the host IDE and paste the result back.",
        };
        serde_json::to_string_pretty(&payload)
            .map_err(|e| crate::error::Error::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LlmProvider for CursorProvider {
    fn name(&self) -> &str {
        if self.sampling.is_some() {
            CURSOR
        } else {
            CURSOR_GUIDED
        }
    }

    fn is_configured(&self) -> bool {
        self.sampling.is_some()
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("auto")
    }

    // Model choice is delegated to the host; never reject a model here.
    fn validate_model(&self, _model: &str) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        match &self.sampling {
            Some(sampling) => {
                debug!(model = %request.model, "Completing through native sampling");
                sampling.sample(request).await
            }
            None => {
                debug!("Guided mode: emitting structured prompt payload");
                let model = request.model.clone();
                let content = self.guided_payload(&request)?;
                Ok(CompletionResponse {
                    content,
                    usage: None,
                    finish_reason: Some("guided".to_string()),
                    model,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;

    struct EchoSampling;

    #[async_trait::async_trait]
    impl NativeSampling for EchoSampling {
        async fn sample(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                content: format!("echo: {}", request.messages[0].content),
                usage: None,
                finish_reason: Some("stop".to_string()),
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn test_native_sampling_path() {
        let provider = CursorProvider::new(ProviderConfig::default(), Some(Arc::new(EchoSampling)));
        assert_eq!(provider.name(), CURSOR);
        assert!(provider.is_configured());

        let response = provider
            .complete(CompletionRequest::new("auto").with_message(Message::user("hi")))
            .await
            .unwrap();
        assert_eq!(response.content, "echo: hi");
    }

    #[tokio::test]
    async fn test_guided_mode_never_calls_network() {
        let provider = CursorProvider::new(ProviderConfig::default(), None);
        assert_eq!(provider.name(), CURSOR_GUIDED);
        assert!(!provider.is_configured());

        let response = provider
            .complete(CompletionRequest::new("auto").with_message(Message::user("do the thing")))
            .await
            .unwrap();
        assert_eq!(response.finish_reason.as_deref(), Some("guided"));
        assert!(response.content.contains("guided_prompt"));
        assert!(response.content.contains("do the thing"));
    }

    #[test]
    fn test_guided_accepts_any_model() {
        let provider = CursorProvider::new(ProviderConfig::default(), None);
        assert!(provider.validate_model("anything-at-all"));
    }
}
