//! Maestro core: command resolution, agent selection and execution
//! coordination.
//!
//! The crate wires the provider layer from `maestro-llm` into named
//! multi-stage commands: a loader for built-in and user-defined command
//! definitions, resolvers that bind a command to a concrete provider
//! through the three-tier fallback chain, confidence-gated dynamic agent
//! selection, session context scoped to what each command references, and
//! fire-and-forget selection analytics.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agents;
pub mod analytics;
pub mod app;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod session;

pub use agents::{
    AgentCatalog, AgentProfile, AgentResolver, AgentSelection, Complexity,
    HeuristicAgentResolver, ScoredAgent, TaskContext,
};
pub use analytics::{AgentSelectionEvent, AnalyticsSink, NoopAnalytics, TracingAnalytics};
pub use app::{AppContext, Prompts};
pub use command::{CommandDefinition, CommandLoader, StageDefinition};
pub use config::{FeatureFlags, GlobalConfig};
pub use coordinator::{
    AgentConfirmPrompt, ExecutionCoordinator, ExecutionOutcome, CONFIDENCE_GATE,
};
pub use error::{Error, ProviderModelSuggestion, Remediation, Result, UserFriendlyError};
pub use pipeline::{CommandResult, ExecutionContext, PipelineEngine, StagePipeline};
pub use resolver::{
    CommandExecutionOptions, CommandResolver, ProviderRemapPrompt, ProviderResolver,
    ResolvedCommand,
};
pub use session::{ContextValue, PlanSummary, Session, SessionStore, TaskRecord};
