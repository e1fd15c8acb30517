//! Application wiring
//!
//! `AppContext` owns every long-lived service and is handed down to the
//! surfaces that need them. Construction is explicit; nothing here reads
//! global state beyond the configuration load itself.

use std::sync::Arc;

use tracing::{debug, info};

use crate::agents::{AgentCatalog, AgentResolver, HeuristicAgentResolver};
use crate::analytics::{AnalyticsSink, NoopAnalytics, TracingAnalytics};
use crate::command::CommandLoader;
use crate::config::GlobalConfig;
use crate::coordinator::{AgentConfirmPrompt, ExecutionCoordinator};
use crate::error::Result;
use crate::pipeline::StagePipeline;
use crate::resolver::{CommandResolver, ProviderRemapPrompt, ProviderResolver};
use crate::session::SessionStore;
use maestro_llm::{
    NativeSampling, ProviderConfigSource, ProviderFallbackService, ProviderRegistry,
};

/// Optional interactive surfaces supplied by the binary
#[derive(Default)]
pub struct Prompts {
    /// Provider remap on missing configuration
    pub remap: Option<Arc<dyn ProviderRemapPrompt>>,
    /// Low-confidence agent confirmation
    pub agent_confirm: Option<Arc<dyn AgentConfirmPrompt>>,
}

/// Owns the wired services for one process
pub struct AppContext {
    /// Loaded configuration
    pub config: Arc<GlobalConfig>,
    /// Session store
    pub sessions: Arc<SessionStore>,
    /// Command loader
    pub loader: CommandLoader,
    /// Agent catalog
    pub catalog: AgentCatalog,
    /// The coordinator driving command execution
    pub coordinator: ExecutionCoordinator,
}

impl AppContext {
    /// Wire the application from loaded configuration.
    ///
    /// `native_sampling` is present only when a zero-config host attached
    /// a sampling channel to this process.
    pub fn build(
        config: GlobalConfig,
        native_sampling: Option<Arc<dyn NativeSampling>>,
        prompts: Prompts,
    ) -> Result<Self> {
        let config = Arc::new(config);
        debug!(
            in_mcp_context = config.in_mcp_context,
            providers = config.configured_providers().len(),
            "Wiring application context"
        );

        let registry = Arc::new(ProviderRegistry::new());
        let fallback = Arc::new(ProviderFallbackService::new(
            registry,
            config.clone() as Arc<dyn ProviderConfigSource>,
            native_sampling,
        ));

        let loader = CommandLoader::new(config.commands_dir.clone());
        let provider_resolver = ProviderResolver::new(config.clone(), prompts.remap);
        let resolver = CommandResolver::new(
            loader.clone(),
            provider_resolver,
            fallback,
            config.clone(),
        );

        let sessions = Arc::new(SessionStore::new());
        let catalog = AgentCatalog::builtin();
        let agent_resolver: Option<Arc<dyn AgentResolver>> =
            Some(Arc::new(HeuristicAgentResolver::new(catalog.clone())));
        let analytics: Arc<dyn AnalyticsSink> = if config.features.analytics_enabled {
            Arc::new(TracingAnalytics)
        } else {
            Arc::new(NoopAnalytics)
        };

        let coordinator = ExecutionCoordinator::new(
            resolver,
            sessions.clone(),
            agent_resolver,
            catalog.clone(),
            analytics,
            Arc::new(StagePipeline::new()),
            config.clone(),
            prompts.agent_confirm,
        );

        Ok(Self {
            config,
            sessions,
            loader,
            catalog,
            coordinator,
        })
    }

    /// Load configuration from disk and environment, then wire
    pub fn from_env(
        native_sampling: Option<Arc<dyn NativeSampling>>,
        prompts: Prompts,
    ) -> Result<Self> {
        Self::build(GlobalConfig::load()?, native_sampling, prompts)
    }

    /// Release held resources. Session state is in-memory only, so this
    /// is a log point today and a flush point once stores persist.
    pub async fn shutdown(self) {
        info!("Application context shut down");
    }
}
