//! Stage pipeline execution
//!
//! A resolved command runs as an ordered list of stages. Each stage prompt
//! may reference session context (`$CONTEXT_key`) and earlier stage outputs
//! (`$STAGE_id`). Stages with a conditional reference are skipped when the
//! referenced context key is absent.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::command::CommandDefinition;
use crate::error::{Error, Result};
use maestro_llm::{
    CompletionRequest, LlmProvider, Message, Mode, ResolutionPath,
};

/// Everything a pipeline needs to run one command
pub struct ExecutionContext {
    /// The resolved command definition
    pub command: CommandDefinition,
    /// Agent the command runs as
    pub agent: String,
    /// Provider handle
    pub provider: Arc<dyn LlmProvider>,
    /// Resolved provider name
    pub provider_name: String,
    /// Model to request, falling back to the provider default
    pub model: Option<String>,
    /// Execution mode
    pub mode: Option<Mode>,
    /// How the provider was resolved
    pub resolution_path: ResolutionPath,
    /// Tools the command is allowed to use
    pub allowed_tools: Vec<String>,
    /// Session context snapshot, already filtered to referenced keys
    pub session_context: HashMap<String, Value>,
    /// Stage outputs carried over from a previous run in this session
    pub initial_stage_outputs: HashMap<String, String>,
    /// Positional arguments after the command name
    pub args: Vec<String>,
}

/// The outcome of one pipeline run
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Command that ran
    pub command: String,
    /// Final stage output, empty when every stage was skipped
    pub response: String,
    /// Output of each executed stage, keyed by stage id
    pub stage_outputs: HashMap<String, String>,
    /// Stage ids skipped by an unsatisfied conditional
    pub skipped_stages: Vec<String>,
    /// Wall-clock duration
    pub duration_ms: u64,
}

/// Executes a resolved command's stages
#[async_trait]
pub trait PipelineEngine: Send + Sync {
    /// Run every stage in order and collect the outputs
    async fn execute(&self, context: &ExecutionContext) -> Result<CommandResult>;
}

/// Sequential pipeline: one completion request per stage
#[derive(Debug, Default)]
pub struct StagePipeline;

impl StagePipeline {
    /// Create a pipeline
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn context_key(reference: &str) -> Option<&str> {
        reference.strip_prefix("$CONTEXT_")
    }

    fn render(
        template: &str,
        context: &ExecutionContext,
        stage_outputs: &HashMap<String, String>,
    ) -> String {
        static CONTEXT_REF: OnceLock<Regex> = OnceLock::new();
        static STAGE_REF: OnceLock<Regex> = OnceLock::new();
        let context_ref =
            CONTEXT_REF.get_or_init(|| Regex::new(r"\$CONTEXT_([A-Za-z0-9_]+)").unwrap());
        let stage_ref =
            STAGE_REF.get_or_init(|| Regex::new(r"\$STAGE_([A-Za-z0-9_]+)").unwrap());

        let rendered = template.replace("{input}", &context.args.join(" "));
        // Single pass per reference kind so a key that is a prefix of another
        // (`plan` vs `planSummary`) never clobbers the longer match. Unknown
        // references stay verbatim.
        let rendered = context_ref.replace_all(&rendered, |caps: &regex::Captures<'_>| {
            match context.session_context.get(&caps[1]) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => caps[0].to_string(),
            }
        });
        stage_ref
            .replace_all(&rendered, |caps: &regex::Captures<'_>| {
                match stage_outputs.get(&caps[1]) {
                    Some(output) => output.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    fn stage_prompt(
        context: &ExecutionContext,
        stage_id: &str,
        prompt: &str,
        inputs: &[String],
        stage_outputs: &HashMap<String, String>,
    ) -> String {
        let mut sections = vec![Self::render(prompt, context, stage_outputs)];
        for input in inputs {
            if let Some(key) = Self::context_key(input) {
                if let Some(value) = context.session_context.get(key) {
                    let text = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    sections.push(format!("{key}:\n{text}"));
                }
            } else if let Some(id) = input.strip_prefix("$STAGE_") {
                if let Some(output) = stage_outputs.get(id) {
                    sections.push(format!("Output of stage '{id}':\n{output}"));
                }
            }
        }
        debug!(stage = stage_id, sections = sections.len(), "Built stage prompt");
        sections.join("\n\n")
    }
}

#[async_trait]
impl PipelineEngine for StagePipeline {
    #[instrument(skip(self, context), fields(command = %context.command.name))]
    async fn execute(&self, context: &ExecutionContext) -> Result<CommandResult> {
        let start = Instant::now();
        let model = context
            .model
            .clone()
            .unwrap_or_else(|| context.provider.default_model().to_string());

        let mut stage_outputs = context.initial_stage_outputs.clone();
        let mut skipped_stages = Vec::new();
        let mut response = String::new();

        for stage in &context.command.stages {
            if let Some(conditional) = &stage.conditional {
                let satisfied = Self::context_key(conditional)
                    .is_some_and(|key| context.session_context.contains_key(key));
                if !satisfied {
                    debug!(stage = %stage.id, conditional = %conditional, "Skipping stage");
                    skipped_stages.push(stage.id.clone());
                    continue;
                }
            }

            let prompt = Self::stage_prompt(
                context,
                &stage.id,
                &stage.prompt,
                &stage.inputs,
                &stage_outputs,
            );
            let agent = stage.agent.as_deref().unwrap_or(&context.agent);
            let mut system = format!(
                "You are the '{agent}' agent running stage '{}' of command '{}'.",
                stage.id, context.command.name
            );
            if !context.allowed_tools.is_empty() {
                system.push_str(&format!(
                    " Available tools: {}.",
                    context.allowed_tools.join(", ")
                ));
            }
            let request = CompletionRequest::new(&model)
                .with_message(Message::system(system))
                .with_message(Message::user(prompt));

            let completion = context
                .provider
                .complete(request)
                .await
                .map_err(Error::Llm)?;

            info!(
                stage = %stage.id,
                provider = %context.provider_name,
                "Stage completed"
            );
            response = completion.content.clone();
            stage_outputs.insert(stage.id.clone(), completion.content);
        }

        Ok(CommandResult {
            command: context.command.name.clone(),
            response,
            stage_outputs,
            skipped_stages,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
