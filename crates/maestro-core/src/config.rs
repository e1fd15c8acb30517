//! Global configuration and feature flags
//!
//! Loaded once per invocation from a TOML file in the platform config
//! directory, overlaid with environment variables. Immutable for the
//! invocation's lifetime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{Error, Result};
use maestro_llm::{ProviderConfig, ProviderConfigSource, CURSOR, FALLBACK_PRIORITY};

/// Feature flags, loaded once per invocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Allow dynamic agent selection for commands that opt in
    pub dynamic_agent_selection_enabled: bool,
    /// Restrict dynamic selection to the `implement` command only
    pub implement_only_enabled: bool,
    /// Record agent-selection analytics events
    pub analytics_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            dynamic_agent_selection_enabled: true,
            implement_only_enabled: false,
            analytics_enabled: true,
        }
    }
}

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Provider to use when nothing else decides one
    pub default_provider: Option<String>,
    /// Whether the process runs inside the zero-config host
    pub in_mcp_context: bool,
    /// Stored per-provider configuration
    pub providers: HashMap<String, ProviderConfig>,
    /// Feature flags
    pub features: FeatureFlags,
    /// Directory with user command TOML files
    pub commands_dir: Option<PathBuf>,
}

impl GlobalConfig {
    /// Environment variable marking the zero-config host
    pub const MCP_HOST_ENV: &'static str = "MAESTRO_MCP_HOST";

    /// Load configuration from the default config file and environment
    pub fn load() -> Result<Self> {
        let path = dirs::config_dir()
            .map(|d| d.join("maestro").join("config.toml"))
            .filter(|p| p.is_file());

        let mut config = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Configuration(format!("reading {}: {e}", path.display())))?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Configuration(format!("parsing {}: {e}", path.display())))?
            }
            None => Self::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// Overlay environment variables onto the loaded file
    pub fn apply_env(&mut self) {
        if std::env::var(Self::MCP_HOST_ENV).is_ok_and(|v| v == "1" || v == "true") {
            self.in_mcp_context = true;
        }
        for name in FALLBACK_PRIORITY {
            let from_env = ProviderConfig::from_env(name);
            if from_env.has_api_key() {
                let entry = self.providers.entry(name.to_string()).or_default();
                if !entry.has_api_key() {
                    entry.api_key = from_env.api_key;
                }
            }
        }
    }

    /// Stored configuration for a provider, falling back to its
    /// environment variable
    #[must_use]
    pub fn provider_config(&self, name: &str) -> ProviderConfig {
        self.providers
            .get(name)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::from_env(name))
    }

    /// Providers that currently have a usable API key, in fixed priority
    /// order
    #[must_use]
    pub fn configured_providers(&self) -> Vec<String> {
        FALLBACK_PRIORITY
            .iter()
            .filter(|name| self.provider_config(name).has_api_key())
            .map(|name| (*name).to_string())
            .collect()
    }

    /// The provider to request when no flag or model keyword decides one
    #[must_use]
    pub fn requested_default(&self) -> &str {
        if self.in_mcp_context {
            CURSOR
        } else {
            self.default_provider.as_deref().unwrap_or(CURSOR)
        }
    }
}

impl ProviderConfigSource for GlobalConfig {
    fn config_for(&self, provider: &str) -> Option<ProviderConfig> {
        let config = self.provider_config(provider);
        config.has_api_key().then_some(config)
    }
}
