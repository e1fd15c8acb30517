//! Provider fallback service
//!
//! Three-tier resolution of a working completion provider:
//!
//! 1. Native sampling (`Mcp`) - zero-config provider through the host's
//!    sampling capability. Never fatal; any failure falls through.
//! 2. API-key fallback (`ApiFallback` with a reason) - inside the
//!    zero-config host, the first configured provider in fixed priority
//!    order.
//! 3. Guided mode (`Guided`) - zero-config provider without sampling; it
//!    emits a prompt payload instead of calling an API. Never fails.
//!
//! Outside the zero-config host, resolution is direct: the requested
//! provider is constructed as-is and reported as `ApiFallback` with no
//! fallback reason.
//!
//! Tiers are strictly sequential and short-circuiting; a tier's side
//! effects (log lines included) happen at most once per resolution.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::catalog::{Mode, CURSOR, CURSOR_GUIDED, FALLBACK_PRIORITY};
use crate::error::Result;
use crate::provider::{LlmProvider, ProviderConfig, ProviderConfigSource};
use crate::providers::NativeSampling;
use crate::registry::ProviderRegistry;

/// Which resolution tier produced the provider.
///
/// `ApiFallback` covers both a true fallback from a failed zero-config
/// path and ordinary direct resolution; the two are distinguished by the
/// presence of a fallback reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    /// Native sampling through the host IDE
    Mcp,
    /// Guided mode - structured prompt payload, no network
    Guided,
    /// API-key backed provider
    ApiFallback,
}

impl ResolutionPath {
    /// Returns the string representation used in logs and analytics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcp => "mcp",
            Self::Guided => "guided",
            Self::ApiFallback => "api_fallback",
        }
    }
}

/// Why resolution degraded away from native sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Sampling unavailable; a configured API provider took over
    McpSamplingUnavailableUsingApiKeys,
    /// Sampling unavailable and no API keys; guided mode took over
    McpSamplingUnavailableUsingGuidedMode,
}

impl FallbackReason {
    /// Returns the wire string attached to analytics records
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::McpSamplingUnavailableUsingApiKeys => "mcp_sampling_unavailable_using_api_keys",
            Self::McpSamplingUnavailableUsingGuidedMode => {
                "mcp_sampling_unavailable_using_guided_mode"
            }
        }
    }
}

/// Inputs to fallback resolution. Constructed fresh per command
/// invocation and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ProviderResolutionContext {
    /// Requested provider name
    pub provider_name: String,
    /// Requested model, if any
    pub model: Option<String>,
    /// Requested execution mode, if any
    pub mode: Option<Mode>,
    /// Resolved configuration for the requested provider
    pub provider_config: ProviderConfig,
    /// Whether the process runs inside the zero-config host
    pub in_mcp_context: bool,
}

/// The outcome of fallback resolution
#[derive(Clone)]
pub struct ProviderResolution {
    /// Ready-to-use provider
    pub provider: Arc<dyn LlmProvider>,
    /// Name of the provider actually resolved
    pub provider_name: String,
    /// Which tier produced the provider
    pub resolution_path: ResolutionPath,
    /// Reason for degradation, absent on ordinary direct resolution
    pub fallback_reason: Option<FallbackReason>,
}

impl std::fmt::Debug for ProviderResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderResolution")
            .field("provider_name", &self.provider_name)
            .field("resolution_path", &self.resolution_path)
            .field("fallback_reason", &self.fallback_reason)
            .finish()
    }
}

/// Resolves a working provider through the three-tier fallback chain
pub struct ProviderFallbackService {
    registry: Arc<ProviderRegistry>,
    config_source: Arc<dyn ProviderConfigSource>,
    native_sampling: Option<Arc<dyn NativeSampling>>,
}

impl ProviderFallbackService {
    /// Create the service. `native_sampling` is the host-supplied
    /// capability; absent means tier 1 is never attempted.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        config_source: Arc<dyn ProviderConfigSource>,
        native_sampling: Option<Arc<dyn NativeSampling>>,
    ) -> Self {
        Self {
            registry,
            config_source,
            native_sampling,
        }
    }

    /// Scan configured providers in fixed priority order and return the
    /// first with a usable API key.
    #[must_use]
    pub fn find_fallback_provider(&self) -> Option<(String, ProviderConfig)> {
        FALLBACK_PRIORITY.iter().find_map(|name| {
            self.config_source
                .config_for(name)
                .filter(ProviderConfig::has_api_key)
                .map(|config| ((*name).to_string(), config))
        })
    }

    /// Resolve a provider, degrading through the tiers described in the
    /// module docs. Only the direct-resolution branch can fail.
    #[instrument(skip(self, context), fields(provider = %context.provider_name, in_mcp = context.in_mcp_context))]
    pub async fn resolve_with_fallback(
        &self,
        context: &ProviderResolutionContext,
    ) -> Result<ProviderResolution> {
        // Tier 1: native sampling. Construction errors and an unconfigured
        // capability both fall through; this tier is never fatal.
        if context.provider_name == CURSOR {
            if let Some(sampling) = &self.native_sampling {
                match self.registry.create_provider(
                    CURSOR,
                    context.provider_config.clone(),
                    Some(sampling.clone()),
                ) {
                    Ok(provider) if provider.is_configured() => {
                        info!("Resolved through native sampling");
                        return Ok(ProviderResolution {
                            provider,
                            provider_name: CURSOR.to_string(),
                            resolution_path: ResolutionPath::Mcp,
                            fallback_reason: None,
                        });
                    }
                    Ok(_) => debug!("Native sampling capability not configured, falling through"),
                    Err(e) => debug!(error = %e, "Native sampling construction failed, falling through"),
                }
            }
        }

        // Tier 2/3: only inside the zero-config host, and only when the
        // request has no API-backed path of its own.
        if context.in_mcp_context
            && (context.provider_name == CURSOR || !context.provider_config.has_api_key())
        {
            if let Some((name, config)) = self.find_fallback_provider() {
                let provider = self.registry.create_provider(&name, config, None)?;
                info!(fallback_provider = %name, "Sampling unavailable, using configured API keys");
                return Ok(ProviderResolution {
                    provider,
                    provider_name: name,
                    resolution_path: ResolutionPath::ApiFallback,
                    fallback_reason: Some(FallbackReason::McpSamplingUnavailableUsingApiKeys),
                });
            }

            // No keys anywhere: guided mode. Constructing the zero-config
            // provider without sampling cannot fail.
            let provider =
                self.registry
                    .create_provider(CURSOR, context.provider_config.clone(), None)?;
            info!("Sampling unavailable and no API keys, using guided mode");
            return Ok(ProviderResolution {
                provider,
                provider_name: CURSOR_GUIDED.to_string(),
                resolution_path: ResolutionPath::Guided,
                fallback_reason: Some(FallbackReason::McpSamplingUnavailableUsingGuidedMode),
            });
        }

        // Direct resolution: the nothing-went-wrong case. Errors propagate.
        let provider = self.registry.create_provider(
            &context.provider_name,
            context.provider_config.clone(),
            None,
        )?;
        debug!("Resolved directly");
        Ok(ProviderResolution {
            provider,
            provider_name: context.provider_name.clone(),
            resolution_path: ResolutionPath::ApiFallback,
            fallback_reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CompletionRequest, CompletionResponse};
    use std::collections::HashMap;

    struct StaticConfigs(HashMap<String, ProviderConfig>);

    impl StaticConfigs {
        fn empty() -> Arc<Self> {
            Arc::new(Self(HashMap::new()))
        }

        fn with_keys(providers: &[&str]) -> Arc<Self> {
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
            Arc::new(Self(map))
        }
    }

    impl ProviderConfigSource for StaticConfigs {
        fn config_for(&self, provider: &str) -> Option<ProviderConfig> {
            self.0.get(provider).cloned()
        }
    }

    struct WorkingSampling;

    #[async_trait::async_trait]
    impl NativeSampling for WorkingSampling {
        async fn sample(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                content: "sampled".to_string(),
                usage: None,
                finish_reason: Some("stop".to_string()),
                model: request.model,
            })
        }
    }

    fn service(
        configs: Arc<StaticConfigs>,
        sampling: Option<Arc<dyn NativeSampling>>,
    ) -> ProviderFallbackService {
        ProviderFallbackService::new(Arc::new(ProviderRegistry::new()), configs, sampling)
    }

    fn context(provider: &str, in_mcp: bool, api_key: Option<&str>) -> ProviderResolutionContext {
        ProviderResolutionContext {
            provider_name: provider.to_string(),
            model: None,
            mode: None,
            provider_config: ProviderConfig {
                api_key: api_key.map(String::from),
                ..Default::default()
            },
            in_mcp_context: in_mcp,
        }
    }

    #[tokio::test]
    async fn test_tier1_native_sampling_wins() {
        let svc = service(
            StaticConfigs::with_keys(&["anthropic"]),
            Some(Arc::new(WorkingSampling)),
        );
        let resolution = svc
            .resolve_with_fallback(&context(CURSOR, true, None))
            .await
            .unwrap();

        assert_eq!(resolution.resolution_path, ResolutionPath::Mcp);
        assert_eq!(resolution.provider_name, CURSOR);
        assert!(resolution.fallback_reason.is_none());
    }

    #[tokio::test]
    async fn test_tier2_api_key_fallback() {
        let svc = service(StaticConfigs::with_keys(&["openai"]), None);
        let resolution = svc
            .resolve_with_fallback(&context(CURSOR, true, None))
            .await
            .unwrap();

        assert_eq!(resolution.resolution_path, ResolutionPath::ApiFallback);
        assert_eq!(resolution.provider_name, "openai");
        assert_eq!(
            resolution.fallback_reason,
            Some(FallbackReason::McpSamplingUnavailableUsingApiKeys)
        );
    }

    #[tokio::test]
    async fn test_fallback_priority_is_fixed() {
        // Both configured: anthropic always wins over openai
        let svc = service(StaticConfigs::with_keys(&["openai", "anthropic"]), None);
        let resolution = svc
            .resolve_with_fallback(&context(CURSOR, true, None))
            .await
            .unwrap();
        assert_eq!(resolution.provider_name, "anthropic");
    }

    #[tokio::test]
    async fn test_tier3_guided_mode_never_throws() {
        let svc = service(StaticConfigs::empty(), None);
        let resolution = svc
            .resolve_with_fallback(&context(CURSOR, true, None))
            .await
            .unwrap();

        assert_eq!(resolution.resolution_path, ResolutionPath::Guided);
        assert_eq!(resolution.provider_name, CURSOR_GUIDED);
        assert_eq!(
            resolution.fallback_reason,
            Some(FallbackReason::McpSamplingUnavailableUsingGuidedMode)
        );
        assert!(!resolution.provider.is_configured());
    }

    #[tokio::test]
    async fn test_direct_resolution_outside_host() {
        // Outside the zero-config host: always direct, no reason, even
        // with fallback keys configured.
        let svc = service(StaticConfigs::with_keys(&["anthropic"]), None);
        let resolution = svc
            .resolve_with_fallback(&context("openai", false, Some("sk-test")))
            .await
            .unwrap();

        assert_eq!(resolution.resolution_path, ResolutionPath::ApiFallback);
        assert_eq!(resolution.provider_name, "openai");
        assert!(resolution.fallback_reason.is_none());
    }

    #[tokio::test]
    async fn test_direct_resolution_with_own_key_in_host() {
        // Inside the host but the requested provider has its own key:
        // tier 2/3 is skipped entirely.
        let svc = service(StaticConfigs::with_keys(&["anthropic"]), None);
        let resolution = svc
            .resolve_with_fallback(&context("openai", true, Some("sk-test")))
            .await
            .unwrap();

        assert_eq!(resolution.provider_name, "openai");
        assert!(resolution.fallback_reason.is_none());
    }

    #[tokio::test]
    async fn test_unknown_provider_propagates_on_direct_path() {
        let svc = service(StaticConfigs::empty(), None);
        let result = svc
            .resolve_with_fallback(&context("frontier", false, Some("key")))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_exactly_one_path_for_all_combinations() {
        for provider in [CURSOR, "anthropic"] {
            for has_sampling in [false, true] {
                for has_key in [false, true] {
                    for in_mcp in [false, true] {
                        let sampling: Option<Arc<dyn NativeSampling>> = if has_sampling {
                            Some(Arc::new(WorkingSampling))
                        } else {
                            None
                        };
                        let configs = if has_key {
                            StaticConfigs::with_keys(&["anthropic"])
                        } else {
                            StaticConfigs::empty()
                        };
                        let svc = service(configs, sampling);
                        let ctx = context(provider, in_mcp, has_key.then_some("key"));

                        let resolution = svc.resolve_with_fallback(&ctx).await.unwrap();
                        // Exactly one path; outside the host it is always
                        // direct ApiFallback with no reason.
                        if !in_mcp && provider != CURSOR {
                            assert_eq!(
                                resolution.resolution_path,
                                ResolutionPath::ApiFallback,
                                "provider={provider} sampling={has_sampling} key={has_key}"
                            );
                            assert!(resolution.fallback_reason.is_none());
                        }
                        if resolution.resolution_path == ResolutionPath::Guided {
                            assert_eq!(resolution.provider_name, CURSOR_GUIDED);
                        }
                    }
                }
            }
        }
    }
}
