//! Integration tests for Maestro
//!
//! These tests verify the integration between the crates:
//! - maestro-llm: provider resolution and the three-tier fallback chain
//! - maestro-core: command resolution, agent selection and execution

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use maestro_core::{
    AppContext, CommandExecutionOptions, Error, GlobalConfig, Prompts,
};
use maestro_llm::{
    providers::NativeSampling, CompletionRequest, CompletionResponse, ProviderConfig,
    ResolutionPath, CURSOR_GUIDED,
};

fn config_with(providers: &[&str], in_mcp: bool) -> GlobalConfig {
    let mut map = HashMap::new();
    for p in providers {
        map.insert(
            (*p).to_string(),
            ProviderConfig {
                api_key: Some(format!("{p}-key")),
                ..Default::default()
            },
        );
    }
    GlobalConfig {
        providers: map,
        in_mcp_context: in_mcp,
        ..Default::default()
    }
}

struct HostSampling;

#[async_trait]
impl NativeSampling for HostSampling {
    async fn sample(&self, request: CompletionRequest) -> maestro_llm::Result<CompletionResponse> {
        Ok(CompletionResponse {
            content: "host says hello".to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
            model: request.model,
        })
    }
}

#[tokio::test]
async fn test_direct_anthropic_resolution_validates_model() {
    // Standalone process with an anthropic key: a claude model resolves
    // directly to anthropic and its model passes catalog validation.
    let app = AppContext::build(config_with(&["anthropic"], false), None, Prompts::default())
        .expect("wiring");

    let options = CommandExecutionOptions {
        model: Some("claude-sonnet-4.5".to_string()),
        ..Default::default()
    };

    // Resolution succeeds; the actual completion would hit the network,
    // so only the resolution layer is exercised here.
    let resolver = maestro_core::ProviderResolver::new(app.config.clone(), None);
    let context = resolver.resolve_request(&options).expect("resolution");
    assert_eq!(context.provider_name, "anthropic");
    assert!(context.provider_config.has_api_key());
}

#[tokio::test]
async fn test_empty_host_runs_guided_end_to_end() {
    // Zero-config host, no API keys, no sampling channel: the command
    // still completes through guided mode with no model validation.
    let app = AppContext::build(config_with(&[], true), None, Prompts::default()).expect("wiring");

    let outcome = app
        .coordinator
        .execute(
            "test",
            &CommandExecutionOptions {
                args: vec!["smoke".to_string()],
                model: Some("some-unknown-model".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("guided execution never fails on configuration");

    assert_eq!(outcome.provider_name, CURSOR_GUIDED);
    // The guided payload is structured JSON for the host to execute
    let payload: serde_json::Value =
        serde_json::from_str(&outcome.result.response).expect("guided payload is JSON");
    assert_eq!(payload["kind"], "guided_prompt");
    app.shutdown().await;
}

#[tokio::test]
async fn test_host_with_sampling_uses_native_path() {
    let app = AppContext::build(
        config_with(&["anthropic"], true),
        Some(Arc::new(HostSampling)),
        Prompts::default(),
    )
    .expect("wiring");

    let outcome = app
        .coordinator
        .execute(
            "test",
            &CommandExecutionOptions {
                args: vec!["smoke".to_string()],
                ..Default::default()
            },
        )
        .await
        .expect("native sampling execution");

    assert_eq!(outcome.provider_name, "cursor");
    assert_eq!(outcome.result.response, "host says hello");
}

#[tokio::test]
async fn test_host_without_sampling_falls_back_to_configured_key() {
    // Sampling unavailable but an API key exists: the chain lands on the
    // configured provider rather than guided mode.
    let config = Arc::new(config_with(&["openai"], true));
    let fallback = maestro_llm::ProviderFallbackService::new(
        Arc::new(maestro_llm::ProviderRegistry::new()),
        config.clone() as Arc<dyn maestro_llm::ProviderConfigSource>,
        None,
    );
    let resolution = fallback
        .resolve_with_fallback(&maestro_llm::ProviderResolutionContext {
            provider_name: "cursor".to_string(),
            model: None,
            mode: None,
            provider_config: ProviderConfig::default(),
            in_mcp_context: true,
        })
        .await
        .expect("fallback resolution");

    assert_eq!(resolution.provider_name, "openai");
    assert_eq!(resolution.resolution_path, ResolutionPath::ApiFallback);
    assert_eq!(
        resolution.fallback_reason.map(|r| r.as_str().to_string()),
        Some("mcp_sampling_unavailable_using_api_keys".to_string())
    );
}

#[tokio::test]
async fn test_unconfigured_provider_error_is_actionable() {
    let app = AppContext::build(config_with(&["anthropic"], false), None, Prompts::default())
        .expect("wiring");

    let err = app
        .coordinator
        .execute(
            "test",
            &CommandExecutionOptions {
                provider: Some("xai".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    match err {
        Error::ProviderNotConfigured {
            provider,
            remediation,
        } => {
            assert_eq!(provider, "xai");
            assert_eq!(remediation.configured_providers, vec!["anthropic"]);
            assert!(remediation
                .suggestions
                .iter()
                .all(|s| s.provider == "anthropic"));
        }
        other => panic!("expected ProviderNotConfigured, got {other:?}"),
    }
}
