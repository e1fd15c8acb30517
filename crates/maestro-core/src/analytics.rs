//! Agent-selection analytics
//!
//! Recording is fire-and-forget: the sink is handed an owned event and
//! returns immediately. Failures stay inside the sink, are logged, and
//! never affect command execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::agents::{AgentSelection, TaskContext};
use crate::config::FeatureFlags;

/// One recorded selection event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSelectionEvent {
    /// Session the command ran in
    pub session_id: Uuid,
    /// Command name
    pub command: String,
    /// Task projection that drove the selection, absent for static events
    pub task: Option<TaskContext>,
    /// The selection itself
    pub selection: AgentSelection,
    /// Flag snapshot at selection time
    pub feature_flags: FeatureFlags,
    /// Whether the caller forced the agent with a flag
    pub manual_override: bool,
    /// The forced agent, when overridden
    pub previous_agent: Option<String>,
    /// When the event was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Side-effect-only sink for selection events.
///
/// Implementations must not block and must swallow their own failures;
/// the coordinator never awaits recording for correctness.
#[cfg_attr(test, mockall::automock)]
pub trait AnalyticsSink: Send + Sync {
    /// Record one selection event
    fn record_agent_selection(&self, event: AgentSelectionEvent);
}

/// Sink that emits events as structured log lines
#[derive(Debug, Default)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn record_agent_selection(&self, event: AgentSelectionEvent) {
        info!(
            session_id = %event.session_id,
            command = %event.command,
            agent = %event.selection.selected_agent,
            confidence = event.selection.confidence,
            manual_override = event.manual_override,
            "Agent selection recorded"
        );
    }
}

/// Sink that drops everything
#[derive(Debug, Default)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn record_agent_selection(&self, _event: AgentSelectionEvent) {}
}
