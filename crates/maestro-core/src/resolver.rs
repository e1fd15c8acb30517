//! Command and provider resolution
//!
//! The provider resolver derives the requested provider from flags,
//! environment and model keywords, validates model+mode against the static
//! catalog, and loads stored configuration. The command resolver combines
//! a loaded command definition with the fallback service's resolution and
//! validates the requested model against the concrete provider.

use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::command::{CommandDefinition, CommandLoader};
use crate::config::GlobalConfig;
use crate::error::{Error, ProviderModelSuggestion, Remediation, Result};
use maestro_llm::{
    catalog, Mode, ProviderFallbackService, ProviderResolution, ProviderResolutionContext,
    ResolutionPath, CURSOR,
};

/// Caller options for one command invocation, built from CLI flags
#[derive(Debug, Clone, Default)]
pub struct CommandExecutionOptions {
    /// Positional arguments after the command name
    pub args: Vec<String>,
    /// Explicit provider override
    pub provider: Option<String>,
    /// Requested model
    pub model: Option<String>,
    /// Requested execution mode
    pub mode: Option<Mode>,
    /// Manual agent override
    pub agent: Option<String>,
    /// Session to run in; a fresh one is created when absent
    pub session_id: Option<Uuid>,
    /// Whether interactive prompts are allowed
    pub interactive: bool,
}

/// A command bound to a ready-to-use provider
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    /// The loaded definition
    pub command: CommandDefinition,
    /// Provider resolution outcome
    pub resolution: ProviderResolution,
    /// Requested model, if any
    pub model: Option<String>,
    /// Requested mode, if any
    pub mode: Option<Mode>,
}

/// One-shot interactive remap offered when the requested provider has no
/// configuration. Never mutates stored configuration; the answer only
/// affects the current invocation.
pub trait ProviderRemapPrompt: Send + Sync {
    /// Offer the alternatives; `None` means the user declined
    fn remap(
        &self,
        requested: &str,
        alternatives: &[ProviderModelSuggestion],
    ) -> Option<ProviderModelSuggestion>;
}

fn suggestions_for(config: &GlobalConfig, limit_per_provider: usize) -> Vec<ProviderModelSuggestion> {
    config
        .configured_providers()
        .iter()
        .flat_map(|provider| {
            catalog::suggestions(provider, limit_per_provider)
                .into_iter()
                .map(|s| ProviderModelSuggestion::from_model(provider, s))
        })
        .collect()
}

fn remediation_for(config: &GlobalConfig) -> Remediation {
    Remediation {
        configured_providers: config.configured_providers(),
        suggestions: suggestions_for(config, 3),
    }
}

/// Resolves the requested provider and its configuration
pub struct ProviderResolver {
    config: Arc<GlobalConfig>,
    remap_prompt: Option<Arc<dyn ProviderRemapPrompt>>,
}

impl ProviderResolver {
    /// Create a resolver; the remap prompt is optional and only consulted
    /// on missing configuration in interactive runs.
    pub fn new(
        config: Arc<GlobalConfig>,
        remap_prompt: Option<Arc<dyn ProviderRemapPrompt>>,
    ) -> Self {
        Self {
            config,
            remap_prompt,
        }
    }

    /// Derive the requested provider name: explicit flag, zero-config-host
    /// default, then keyword inference from the model string.
    #[must_use]
    pub fn requested_provider(&self, options: &CommandExecutionOptions) -> String {
        if let Some(provider) = &options.provider {
            return provider.clone();
        }
        if self.config.in_mcp_context {
            return CURSOR.to_string();
        }
        if let Some(model) = &options.model {
            return catalog::infer_provider(model).to_string();
        }
        self.config.requested_default().to_string()
    }

    /// Build the resolution context for one invocation.
    ///
    /// Model+mode validation runs here, before any provider construction;
    /// an invalid combination is fatal and never silently coerced.
    #[instrument(skip(self, options))]
    pub fn resolve_request(
        &self,
        options: &CommandExecutionOptions,
    ) -> Result<ProviderResolutionContext> {
        let mut provider_name = self.requested_provider(options);
        let mut model = options.model.clone();

        if let (Some(m), Some(mode)) = (&model, options.mode) {
            if !catalog::supports_mode(&provider_name, m, mode) {
                let valid = catalog::valid_modes(&provider_name, m);
                return Err(Error::Execution {
                    message: format!(
                        "model '{m}' does not support mode '{mode}' (valid: {})",
                        valid
                            .iter()
                            .map(Mode::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    remediation: Remediation {
                        configured_providers: self.config.configured_providers(),
                        suggestions: valid
                            .into_iter()
                            .map(|mode| ProviderModelSuggestion {
                                provider: provider_name.clone(),
                                model: m.clone(),
                                mode,
                            })
                            .collect(),
                    },
                });
            }
        }

        let mut provider_config = self.config.provider_config(&provider_name);

        if provider_name != CURSOR && !provider_config.has_api_key() {
            // Missing configuration. Inside the zero-config host the
            // caller captures this and runs the fallback chain instead.
            if self.config.in_mcp_context {
                return Err(Error::ProviderNotConfigured {
                    provider: provider_name,
                    remediation: remediation_for(&self.config),
                });
            }

            // One-shot interactive remap to a configured provider/model.
            let alternatives = suggestions_for(&self.config, 3);
            if options.interactive && !alternatives.is_empty() {
                if let Some(prompt) = &self.remap_prompt {
                    if let Some(choice) = prompt.remap(&provider_name, &alternatives) {
                        debug!(from = %provider_name, to = %choice.provider, "Interactive provider remap");
                        provider_name = choice.provider;
                        model = Some(choice.model);
                        provider_config = self.config.provider_config(&provider_name);
                    }
                }
            }

            if !provider_config.has_api_key() {
                return Err(Error::ProviderNotConfigured {
                    provider: provider_name,
                    remediation: remediation_for(&self.config),
                });
            }
        }

        Ok(ProviderResolutionContext {
            provider_name,
            model,
            mode: options.mode,
            provider_config,
            in_mcp_context: self.config.in_mcp_context,
        })
    }
}

/// Resolves a command name into a `ResolvedCommand`
pub struct CommandResolver {
    loader: CommandLoader,
    provider_resolver: ProviderResolver,
    fallback: Arc<ProviderFallbackService>,
    config: Arc<GlobalConfig>,
}

impl CommandResolver {
    /// Create a command resolver
    pub fn new(
        loader: CommandLoader,
        provider_resolver: ProviderResolver,
        fallback: Arc<ProviderFallbackService>,
        config: Arc<GlobalConfig>,
    ) -> Self {
        Self {
            loader,
            provider_resolver,
            fallback,
            config,
        }
    }

    /// Resolve a command and a ready-to-use provider for it
    #[instrument(skip(self, options))]
    pub async fn resolve_command(
        &self,
        name: &str,
        options: &CommandExecutionOptions,
    ) -> Result<ResolvedCommand> {
        let command = self.loader.load(name)?;

        let context = match self.provider_resolver.resolve_request(options) {
            Ok(context) => context,
            Err(Error::ProviderNotConfigured { provider, .. }) if self.config.in_mcp_context => {
                // Captured, not propagated: hand a synthetic context to
                // the fallback chain.
                warn!(provider = %provider, "Provider unconfigured in zero-config host, attempting fallback");
                ProviderResolutionContext {
                    provider_name: CURSOR.to_string(),
                    model: options.model.clone(),
                    mode: options.mode,
                    provider_config: Default::default(),
                    in_mcp_context: true,
                }
            }
            Err(e) => return Err(e),
        };

        let resolution = self.fallback.resolve_with_fallback(&context).await?;

        // Guided mode skips model-existence validation: the payload is
        // executed by the host, not by a model we can enumerate.
        let model = context.model.or_else(|| command.default_model.clone());
        if resolution.resolution_path != ResolutionPath::Guided {
            if let Some(model) = &model {
                if !resolution.provider.validate_model(model) {
                    return Err(Error::UnsupportedModel {
                        provider: resolution.provider_name.clone(),
                        model: model.clone(),
                        alternatives: resolution.provider.alternative_models(model),
                    });
                }
            }
        }

        let mode = options.mode.or(command.default_mode);
        Ok(ResolvedCommand {
            command,
            resolution,
            model,
            mode,
        })
    }
}
