//! Execution coordination
//!
//! The coordinator ties resolution, agent selection, session context and
//! the stage pipeline together for one command invocation. Agent selection
//! is confidence gated: low-confidence dynamic picks are confirmed with
//! the user in interactive runs and selection errors are downgraded to the
//! command's fallback agent rather than aborting the run.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::agents::{AgentCatalog, AgentResolver, AgentSelection, ScoredAgent, TaskContext};
use crate::analytics::{AgentSelectionEvent, AnalyticsSink};
use crate::command::CommandDefinition;
use crate::config::GlobalConfig;
use crate::error::{Error, Result};
use crate::pipeline::{CommandResult, ExecutionContext, PipelineEngine};
use crate::resolver::{CommandExecutionOptions, CommandResolver};
use crate::session::{keys, ContextValue, SessionStore};

/// Confidence below which a dynamic pick needs interactive confirmation
pub const CONFIDENCE_GATE: f64 = 0.5;

/// Reason attached when a selection error was downgraded
pub const FALLBACK_REASON: &str = "fallback_due_to_error";

const FILE_EXTENSIONS: [&str; 9] = [
    ".rs", ".ts", ".tsx", ".js", ".py", ".go", ".md", ".toml", ".json",
];

/// Interactive confirmation of a low-confidence agent pick.
///
/// `None` keeps the suggested agent.
pub trait AgentConfirmPrompt: Send + Sync {
    /// Confirm or replace the suggested agent
    fn confirm(
        &self,
        suggested: &AgentSelection,
        alternatives: &[ScoredAgent],
        catalog: &AgentCatalog,
    ) -> Option<String>;
}

/// What one invocation produced
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Pipeline result
    pub result: CommandResult,
    /// Session the command ran in
    pub session_id: Uuid,
    /// Agent the command ran as
    pub agent: String,
    /// Resolved provider name
    pub provider_name: String,
    /// When the invocation started
    pub started_at: DateTime<Utc>,
    /// Total wall-clock duration
    pub duration_ms: u64,
}

/// Coordinates one command invocation end to end
pub struct ExecutionCoordinator {
    resolver: CommandResolver,
    sessions: Arc<SessionStore>,
    agent_resolver: Option<Arc<dyn AgentResolver>>,
    catalog: AgentCatalog,
    analytics: Arc<dyn AnalyticsSink>,
    pipeline: Arc<dyn PipelineEngine>,
    config: Arc<GlobalConfig>,
    confirm_prompt: Option<Arc<dyn AgentConfirmPrompt>>,
    context_reference: Regex,
}

impl ExecutionCoordinator {
    /// Create a coordinator
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: CommandResolver,
        sessions: Arc<SessionStore>,
        agent_resolver: Option<Arc<dyn AgentResolver>>,
        catalog: AgentCatalog,
        analytics: Arc<dyn AnalyticsSink>,
        pipeline: Arc<dyn PipelineEngine>,
        config: Arc<GlobalConfig>,
        confirm_prompt: Option<Arc<dyn AgentConfirmPrompt>>,
    ) -> Self {
        Self {
            resolver,
            sessions,
            agent_resolver,
            catalog,
            analytics,
            pipeline,
            config,
            confirm_prompt,
            context_reference: Regex::new(r"\$CONTEXT_([A-Za-z0-9_]+)").expect("Invalid regex"),
        }
    }

    /// Run a named command with the given options
    #[instrument(skip(self, options), fields(command = name))]
    pub async fn execute(
        &self,
        name: &str,
        options: &CommandExecutionOptions,
    ) -> Result<ExecutionOutcome> {
        let start = Instant::now();
        let started_at = Utc::now();
        self.check_file_precondition(name, options)?;

        let resolved = self.resolver.resolve_command(name, options).await?;

        let session_id = self.sessions.get_or_create(options.session_id).await;
        let agent = self
            .select_agent(session_id, &resolved.command, options)
            .await?;

        // Flag snapshot is always appended before filtering so stages can
        // reference it like any other context key.
        self.sessions
            .update_context(
                session_id,
                keys::FEATURE_FLAGS,
                serde_json::to_value(self.config.features)
                    .map_err(|e| Error::Internal(e.to_string()))?,
            )
            .await?;

        let session_context = self
            .filtered_context(session_id, &resolved.command)
            .await?;
        let initial_stage_outputs = self.previous_stage_outputs(session_id).await?;

        let context = ExecutionContext {
            agent: agent.clone(),
            allowed_tools: resolved.command.allowed_tools.clone(),
            provider: resolved.resolution.provider.clone(),
            provider_name: resolved.resolution.provider_name.clone(),
            model: resolved.model.clone(),
            mode: resolved.mode,
            resolution_path: resolved.resolution.resolution_path,
            command: resolved.command,
            session_context,
            initial_stage_outputs,
            args: options.args.clone(),
        };

        info!(
            agent = %agent,
            provider = %context.provider_name,
            path = context.resolution_path.as_str(),
            "Executing command"
        );
        let result = self.pipeline.execute(&context).await?;

        // Persist stage outputs for follow-up commands in this session.
        self.sessions
            .update_context(
                session_id,
                keys::COMMAND_STAGE_OUTPUTS,
                serde_json::to_value(&result.stage_outputs)
                    .map_err(|e| Error::Internal(e.to_string()))?,
            )
            .await?;

        Ok(ExecutionOutcome {
            result,
            session_id,
            agent,
            provider_name: context.provider_name,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// File-argument commands fail fast before any agent or provider work
    fn check_file_precondition(
        &self,
        name: &str,
        options: &CommandExecutionOptions,
    ) -> Result<()> {
        if !crate::command::FILE_ARG_COMMANDS.contains(&name) {
            return Ok(());
        }
        match options.args.first() {
            None => Err(Error::Validation(format!(
                "command '{name}' requires a file path argument"
            ))),
            Some(path) if !Path::new(path).exists() => Err(Error::Validation(format!(
                "file '{path}' does not exist"
            ))),
            Some(_) => Ok(()),
        }
    }

    fn dynamic_selection_enabled(&self, command: &CommandDefinition) -> bool {
        if !command.dynamic_agent_selection || self.agent_resolver.is_none() {
            return false;
        }
        let flags = self.config.features;
        flags.dynamic_agent_selection_enabled
            || (flags.implement_only_enabled && command.name == "implement")
    }

    async fn select_agent(
        &self,
        session_id: Uuid,
        command: &CommandDefinition,
        options: &CommandExecutionOptions,
    ) -> Result<String> {
        // A manual override wins over both static and dynamic selection.
        if let Some(agent) = &options.agent {
            if !self.catalog.has_agent(agent) {
                return Err(Error::Validation(format!(
                    "unknown agent '{agent}' (known: {})",
                    self.catalog.agent_ids().join(", ")
                )));
            }
            if self.config.features.analytics_enabled {
                self.analytics.record_agent_selection(AgentSelectionEvent {
                    session_id,
                    command: command.name.clone(),
                    task: None,
                    selection: AgentSelection {
                        selected_agent: agent.clone(),
                        confidence: 1.0,
                        reasons: vec!["manual_override".to_string()],
                        alternatives: Vec::new(),
                    },
                    feature_flags: self.config.features,
                    manual_override: true,
                    previous_agent: Some(agent.clone()),
                    recorded_at: Utc::now(),
                });
            }
            return Ok(agent.clone());
        }

        if !self.dynamic_selection_enabled(command) {
            debug!(agent = %command.agent, "Static agent selection");
            return Ok(command.agent.clone());
        }

        let task = self.build_task_context(session_id, command, options).await?;
        let resolver = self
            .agent_resolver
            .as_ref()
            .ok_or_else(|| Error::Internal("agent resolver missing".to_string()))?;

        let mut selection = match resolver.resolve(&task).await {
            Ok(selection) => selection,
            Err(e) => {
                // Selection failures never abort the command.
                warn!(error = %e, fallback = %command.fallback_agent, "Agent selection failed");
                AgentSelection {
                    selected_agent: command.fallback_agent.clone(),
                    confidence: 0.0,
                    reasons: vec![FALLBACK_REASON.to_string()],
                    alternatives: Vec::new(),
                }
            }
        };

        // Strictly below the gate: a pick at exactly the threshold stands.
        if selection.confidence < CONFIDENCE_GATE && options.interactive {
            if let Some(prompt) = &self.confirm_prompt {
                let alternatives: Vec<ScoredAgent> =
                    selection.alternatives.iter().take(3).cloned().collect();
                if let Some(choice) = prompt.confirm(&selection, &alternatives, &self.catalog) {
                    selection.reasons.push("user_confirmed".to_string());
                    selection.selected_agent = choice;
                }
            }
        }

        // The selection record lands in the session before filtering so a
        // stage can reference it through $CONTEXT_dynamicAgentSelection.
        self.sessions
            .update_context(
                session_id,
                keys::DYNAMIC_AGENT_SELECTION,
                serde_json::to_value(&selection)
                    .map_err(|e| Error::Internal(e.to_string()))?,
            )
            .await?;

        if self.config.features.analytics_enabled {
            self.analytics.record_agent_selection(AgentSelectionEvent {
                session_id,
                command: command.name.clone(),
                task: Some(task),
                selection: selection.clone(),
                feature_flags: self.config.features,
                manual_override: false,
                previous_agent: None,
                recorded_at: Utc::now(),
            });
        }

        Ok(selection.selected_agent)
    }

    /// Project the invocation and the session into a task for selection
    async fn build_task_context(
        &self,
        session_id: Uuid,
        command: &CommandDefinition,
        options: &CommandExecutionOptions,
    ) -> Result<TaskContext> {
        let plan = self.sessions.get_context(session_id, keys::PLAN_SUMMARY).await?;
        let task = self.sessions.get_context(session_id, keys::TASK).await?;

        let description = if command.name == "implement" {
            options.args.first().cloned()
        } else {
            None
        }
        .or_else(|| plan.as_ref().and_then(|v| v.description().map(String::from)))
        .or_else(|| task.as_ref().and_then(|v| v.description().map(String::from)))
        .unwrap_or_else(|| format!("{} {}", command.name, options.args.join(" ")));

        let mut affected_files = self
            .sessions
            .get_context(session_id, keys::TARGET_FILES)
            .await?
            .map(|v| v.string_list())
            .unwrap_or_default();
        if affected_files.is_empty() {
            affected_files = self
                .sessions
                .get_context(session_id, keys::IMPLEMENTATION_SCOPE)
                .await?
                .map(|v| v.nested_string_list("targetFiles"))
                .unwrap_or_default();
        }
        if affected_files.is_empty() {
            affected_files = options
                .args
                .iter()
                .filter(|a| FILE_EXTENSIONS.iter().any(|ext| a.ends_with(ext)))
                .cloned()
                .collect();
        }

        let mut dependencies = self
            .sessions
            .get_context(session_id, keys::DEPENDENCIES)
            .await?
            .map(|v| v.string_list())
            .unwrap_or_default();
        if dependencies.is_empty() {
            if let Some(ContextValue::PlanSummary(plan)) = &plan {
                dependencies = plan.dependencies.clone();
            }
        }

        let complexity = TaskContext::derive_complexity(&affected_files, &dependencies);
        let mut metadata = HashMap::new();
        metadata.insert("command".to_string(), command.name.clone());

        Ok(TaskContext {
            description,
            affected_files,
            dependencies,
            complexity,
            metadata,
        })
    }

    /// Collect the context keys referenced by the command's stages and
    /// fetch only those; a command with no references sees everything.
    async fn filtered_context(
        &self,
        session_id: Uuid,
        command: &CommandDefinition,
    ) -> Result<HashMap<String, Value>> {
        let mut referenced: Vec<String> = Vec::new();
        for stage in &command.stages {
            let sources = stage
                .inputs
                .iter()
                .chain(stage.conditional.iter())
                .chain(std::iter::once(&stage.prompt));
            for source in sources {
                for capture in self.context_reference.captures_iter(source) {
                    let key = capture[1].to_string();
                    if !referenced.contains(&key) {
                        referenced.push(key);
                    }
                }
            }
        }

        let context = if referenced.is_empty() {
            self.sessions.get_all_context(session_id).await?
        } else {
            debug!(keys = ?referenced, "Filtering session context");
            self.sessions
                .get_filtered_context(session_id, &referenced)
                .await?
        };

        context
            .into_iter()
            .map(|(k, v)| {
                serde_json::to_value(&v)
                    .map(|v| (k, v))
                    .map_err(|e| Error::Internal(e.to_string()))
            })
            .collect()
    }

    async fn previous_stage_outputs(
        &self,
        session_id: Uuid,
    ) -> Result<HashMap<String, String>> {
        let Some(value) = self
            .sessions
            .get_context(session_id, keys::COMMAND_STAGE_OUTPUTS)
            .await?
        else {
            return Ok(HashMap::new());
        };
        let raw = serde_json::to_value(&value).map_err(|e| Error::Internal(e.to_string()))?;
        Ok(serde_json::from_value(raw).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::HeuristicAgentResolver;
    use crate::analytics::test_support::RecordingAnalytics;
    use crate::command::CommandLoader;
    use crate::config::FeatureFlags;
    use crate::pipeline::StagePipeline;
    use crate::resolver::ProviderResolver;
    use async_trait::async_trait;
    use maestro_llm::{
        providers::NativeSampling, CompletionRequest, CompletionResponse, ProviderConfig,
        ProviderConfigSource, ProviderFallbackService, ProviderRegistry,
    };

    struct EchoSampling;

    #[async_trait]
    impl NativeSampling for EchoSampling {
        async fn sample(
            &self,
            request: CompletionRequest,
        ) -> maestro_llm::Result<CompletionResponse> {
            Ok(CompletionResponse {
                content: format!(
                    "echo:{}",
                    request
                        .messages
                        .last()
                        .map(|m| m.content.clone())
                        .unwrap_or_default()
                ),
                usage: None,
                finish_reason: Some("stop".to_string()),
                model: request.model,
            })
        }
    }

    struct Harness {
        coordinator: ExecutionCoordinator,
        sessions: Arc<SessionStore>,
        analytics: Arc<RecordingAnalytics>,
    }

    fn harness(flags: FeatureFlags, confirm: Option<Arc<dyn AgentConfirmPrompt>>) -> Harness {
        let config = Arc::new(GlobalConfig {
            in_mcp_context: true,
            features: flags,
            ..Default::default()
        });
        let fallback = Arc::new(ProviderFallbackService::new(
            Arc::new(ProviderRegistry::new()),
            config.clone() as Arc<dyn ProviderConfigSource>,
            Some(Arc::new(EchoSampling)),
        ));
        let resolver = CommandResolver::new(
            CommandLoader::new(None),
            ProviderResolver::new(config.clone(), None),
            fallback,
            config.clone(),
        );
        let sessions = Arc::new(SessionStore::new());
        let analytics = Arc::new(RecordingAnalytics::default());
        let coordinator = ExecutionCoordinator::new(
            resolver,
            sessions.clone(),
            Some(Arc::new(HeuristicAgentResolver::new(AgentCatalog::builtin()))),
            AgentCatalog::builtin(),
            analytics.clone(),
            Arc::new(StagePipeline::new()),
            config,
            confirm,
        );
        Harness {
            coordinator,
            sessions,
            analytics,
        }
    }

    fn options(args: &[&str]) -> CommandExecutionOptions {
        CommandExecutionOptions {
            args: args.iter().map(|s| (*s).to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_file_precondition_checked_first() {
        let h = harness(FeatureFlags::default(), None);

        let err = h
            .coordinator
            .execute("implement", &options(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        // Nothing ran, so nothing was selected or recorded
        assert!(h.analytics.events().is_empty());

        let err = h
            .coordinator
            .execute("implement", &options(&["/no/such/file.rs"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_manual_override_wins_and_is_recorded() {
        let h = harness(FeatureFlags::default(), None);
        let mut opts = options(&[]);
        opts.agent = Some("documenter".to_string());

        let outcome = h.coordinator.execute("test", &opts).await.unwrap();
        assert_eq!(outcome.agent, "documenter");

        let events = h.analytics.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].manual_override);
        assert_eq!(events[0].selection.confidence, 1.0);
        assert_eq!(events[0].selection.reasons, vec!["manual_override"]);
        // previous_agent carries the override flag's value verbatim
        assert_eq!(events[0].previous_agent.as_deref(), Some("documenter"));
    }

    #[tokio::test]
    async fn test_unknown_manual_agent_rejected() {
        let h = harness(FeatureFlags::default(), None);
        let mut opts = options(&[]);
        opts.agent = Some("wizard".to_string());

        let err = h.coordinator.execute("test", &opts).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_static_command_uses_declared_agent() {
        // "plan" declares dynamic_agent_selection = false
        let h = harness(FeatureFlags::default(), None);
        let outcome = h.coordinator.execute("plan", &options(&["x"])).await.unwrap();
        assert_eq!(outcome.agent, "planner");
        // Static selection records no event
        assert!(h.analytics.events().is_empty());
    }

    #[tokio::test]
    async fn test_static_selection_is_deterministic() {
        let h = harness(FeatureFlags::default(), None);
        for _ in 0..3 {
            let outcome = h.coordinator.execute("plan", &options(&["x"])).await.unwrap();
            assert_eq!(outcome.agent, "planner");
        }
    }

    #[tokio::test]
    async fn test_dynamic_selection_disabled_by_flag() {
        let flags = FeatureFlags {
            dynamic_agent_selection_enabled: false,
            ..Default::default()
        };
        let h = harness(flags, None);
        let session_id = h.sessions.create_session().await;
        let mut opts = options(&["docs/guide.md"]);
        opts.session_id = Some(session_id);

        let outcome = h.coordinator.execute("review-plan", &opts).await.unwrap();
        assert_eq!(outcome.agent, "reviewer");
        assert!(h.analytics.events().is_empty());
    }

    #[tokio::test]
    async fn test_implement_only_flag_scopes_dynamic_selection() {
        let flags = FeatureFlags {
            dynamic_agent_selection_enabled: false,
            implement_only_enabled: true,
            ..Default::default()
        };
        let h = harness(flags, None);

        // review-plan stays static under implement-only scoping
        let outcome = h
            .coordinator
            .execute("review-plan", &options(&[]))
            .await
            .unwrap();
        assert_eq!(outcome.agent, "reviewer");
        assert!(h.analytics.events().is_empty());
    }

    #[tokio::test]
    async fn test_dynamic_selection_records_event() {
        let h = harness(FeatureFlags::default(), None);
        let session_id = h.sessions.create_session().await;
        h.sessions
            .update_context(
                session_id,
                keys::PLAN_SUMMARY,
                serde_json::json!({
                    "summary": "review the storage design document",
                    "dependencies": [],
                    "targetFiles": ["docs/storage.md"]
                }),
            )
            .await
            .unwrap();

        let mut opts = options(&[]);
        opts.session_id = Some(session_id);
        let outcome = h.coordinator.execute("review-plan", &opts).await.unwrap();

        let events = h.analytics.events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].manual_override);
        assert_eq!(events[0].selection.selected_agent, outcome.agent);
        assert!(events[0].task.is_some());

        // The selection record is also visible in the session
        let recorded = h
            .sessions
            .get_context(session_id, keys::DYNAMIC_AGENT_SELECTION)
            .await
            .unwrap();
        assert!(recorded.is_some());
    }

    #[tokio::test]
    async fn test_analytics_flag_suppresses_events() {
        let flags = FeatureFlags {
            analytics_enabled: false,
            ..Default::default()
        };
        let h = harness(flags, None);
        h.coordinator.execute("review-plan", &options(&[])).await.unwrap();
        assert!(h.analytics.events().is_empty());
    }

    struct FailingResolver;

    #[async_trait]
    impl AgentResolver for FailingResolver {
        async fn resolve(&self, _task: &TaskContext) -> Result<AgentSelection> {
            Err(Error::Internal("scoring backend offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_resolver_error_downgrades_to_fallback_agent() {
        let base = harness(FeatureFlags::default(), None);
        let coordinator = ExecutionCoordinator::new(
            CommandResolver::new(
                CommandLoader::new(None),
                ProviderResolver::new(
                    Arc::new(GlobalConfig {
                        in_mcp_context: true,
                        ..Default::default()
                    }),
                    None,
                ),
                Arc::new(ProviderFallbackService::new(
                    Arc::new(ProviderRegistry::new()),
                    Arc::new(GlobalConfig {
                        in_mcp_context: true,
                        ..Default::default()
                    }) as Arc<dyn ProviderConfigSource>,
                    Some(Arc::new(EchoSampling)),
                )),
                Arc::new(GlobalConfig {
                    in_mcp_context: true,
                    ..Default::default()
                }),
            ),
            base.sessions.clone(),
            Some(Arc::new(FailingResolver)),
            AgentCatalog::builtin(),
            base.analytics.clone(),
            Arc::new(StagePipeline::new()),
            Arc::new(GlobalConfig {
                in_mcp_context: true,
                ..Default::default()
            }),
            None,
        );

        let outcome = coordinator.execute("review-plan", &options(&[])).await.unwrap();
        // review-plan declares the reviewer as its fallback agent
        assert_eq!(outcome.agent, "reviewer");

        let events = base.analytics.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].selection.confidence, 0.0);
        assert_eq!(events[0].selection.reasons, vec![FALLBACK_REASON]);
    }

    #[derive(Default)]
    struct CountingPrompt {
        calls: std::sync::Mutex<u32>,
        answer: Option<String>,
    }

    impl AgentConfirmPrompt for CountingPrompt {
        fn confirm(
            &self,
            _suggested: &AgentSelection,
            alternatives: &[ScoredAgent],
            _catalog: &AgentCatalog,
        ) -> Option<String> {
            assert!(alternatives.len() <= 3);
            *self.calls.lock().unwrap() += 1;
            self.answer.clone()
        }
    }

    struct FixedResolver(f64);

    #[async_trait]
    impl AgentResolver for FixedResolver {
        async fn resolve(&self, _task: &TaskContext) -> Result<AgentSelection> {
            Ok(AgentSelection {
                selected_agent: "implementer".to_string(),
                confidence: self.0,
                reasons: vec!["fixed".to_string()],
                alternatives: vec![
                    ScoredAgent {
                        agent: "reviewer".to_string(),
                        score: 0.4,
                        reasons: Vec::new(),
                    },
                    ScoredAgent {
                        agent: "tester".to_string(),
                        score: 0.3,
                        reasons: Vec::new(),
                    },
                ],
            })
        }
    }

    async fn gated_run(confidence: f64, prompt: Arc<CountingPrompt>) -> String {
        let base = harness(FeatureFlags::default(), None);
        let config = Arc::new(GlobalConfig {
            in_mcp_context: true,
            ..Default::default()
        });
        let coordinator = ExecutionCoordinator::new(
            CommandResolver::new(
                CommandLoader::new(None),
                ProviderResolver::new(config.clone(), None),
                Arc::new(ProviderFallbackService::new(
                    Arc::new(ProviderRegistry::new()),
                    config.clone() as Arc<dyn ProviderConfigSource>,
                    Some(Arc::new(EchoSampling)),
                )),
                config.clone(),
            ),
            base.sessions.clone(),
            Some(Arc::new(FixedResolver(confidence))),
            AgentCatalog::builtin(),
            base.analytics.clone(),
            Arc::new(StagePipeline::new()),
            config,
            Some(prompt),
        );

        let mut opts = options(&[]);
        opts.interactive = true;
        coordinator
            .execute("review-plan", &opts)
            .await
            .unwrap()
            .agent
    }

    #[tokio::test]
    async fn test_confidence_below_gate_prompts() {
        let prompt = Arc::new(CountingPrompt {
            answer: Some("reviewer".to_string()),
            ..Default::default()
        });
        let agent = gated_run(0.49, prompt.clone()).await;
        assert_eq!(*prompt.calls.lock().unwrap(), 1);
        assert_eq!(agent, "reviewer");
    }

    #[tokio::test]
    async fn test_confidence_at_gate_does_not_prompt() {
        let prompt = Arc::new(CountingPrompt::default());
        let agent = gated_run(0.5, prompt.clone()).await;
        assert_eq!(*prompt.calls.lock().unwrap(), 0);
        assert_eq!(agent, "implementer");
    }

    #[tokio::test]
    async fn test_declined_prompt_keeps_suggestion() {
        let prompt = Arc::new(CountingPrompt::default());
        let agent = gated_run(0.2, prompt.clone()).await;
        assert_eq!(*prompt.calls.lock().unwrap(), 1);
        assert_eq!(agent, "implementer");
    }

    #[tokio::test]
    async fn test_context_filtered_to_referenced_keys() {
        let h = harness(FeatureFlags::default(), None);
        let session_id = h.sessions.create_session().await;
        h.sessions
            .update_context(
                session_id,
                keys::PLAN_SUMMARY,
                serde_json::json!({"summary": "tighten the cache", "dependencies": [], "targetFiles": []}),
            )
            .await
            .unwrap();
        h.sessions
            .update_context(session_id, "scratchpad", serde_json::json!("unrelated"))
            .await
            .unwrap();

        // review-plan references only planSummary
        let definition = CommandLoader::new(None).load("review-plan").unwrap();
        let context = h
            .coordinator
            .filtered_context(session_id, &definition)
            .await
            .unwrap();

        assert!(context.contains_key("planSummary"));
        assert!(!context.contains_key("scratchpad"));
    }

    #[tokio::test]
    async fn test_prompt_only_references_survive_filtering() {
        use crate::command::{CommandDefinition, StageDefinition};

        let h = harness(FeatureFlags::default(), None);
        let session_id = h.sessions.create_session().await;
        h.sessions
            .update_context(session_id, "task", serde_json::json!({"description": "wire it up"}))
            .await
            .unwrap();
        h.sessions
            .update_context(session_id, "scratchpad", serde_json::json!("unrelated"))
            .await
            .unwrap();

        // The key is referenced inline in the prompt, not in declared inputs.
        let definition = CommandDefinition {
            name: "inline".to_string(),
            agent: "generalist".to_string(),
            default_model: None,
            default_mode: None,
            stages: vec![StageDefinition {
                id: "only".to_string(),
                agent: None,
                inputs: Vec::new(),
                conditional: None,
                prompt: "Work on: $CONTEXT_task".to_string(),
            }],
            allowed_tools: Vec::new(),
            dynamic_agent_selection: false,
            fallback_agent: "generalist".to_string(),
        };
        let context = h
            .coordinator
            .filtered_context(session_id, &definition)
            .await
            .unwrap();
        assert!(context.contains_key("task"));
        assert!(!context.contains_key("scratchpad"));
    }

    #[tokio::test]
    async fn test_command_without_references_sees_all_context() {
        let h = harness(FeatureFlags::default(), None);
        let session_id = h.sessions.create_session().await;
        h.sessions
            .update_context(session_id, "scratchpad", serde_json::json!("note"))
            .await
            .unwrap();

        // "test" has no $CONTEXT_ references at all
        let definition = CommandLoader::new(None).load("test").unwrap();
        let context = h
            .coordinator
            .filtered_context(session_id, &definition)
            .await
            .unwrap();
        assert!(context.contains_key("scratchpad"));
    }

    #[tokio::test]
    async fn test_stage_outputs_persist_across_invocations() {
        let h = harness(FeatureFlags::default(), None);
        let session_id = h.sessions.create_session().await;
        let mut opts = options(&["x"]);
        opts.session_id = Some(session_id);

        h.coordinator.execute("test", &opts).await.unwrap();
        let outputs = h.coordinator.previous_stage_outputs(session_id).await.unwrap();
        assert!(outputs.contains_key("run"));
    }

    #[tokio::test]
    async fn test_feature_flags_appended_to_session() {
        let h = harness(FeatureFlags::default(), None);
        let session_id = h.sessions.create_session().await;
        let mut opts = options(&["x"]);
        opts.session_id = Some(session_id);

        h.coordinator.execute("test", &opts).await.unwrap();
        let flags = h
            .sessions
            .get_context(session_id, keys::FEATURE_FLAGS)
            .await
            .unwrap();
        assert!(flags.is_some());
    }
}
