//! Command definitions and loading
//!
//! A command is a named multi-stage workflow. Built-in commands are defined
//! in code; additional commands are loaded from TOML files in the user
//! commands directory. Definitions are immutable once loaded.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::error::{Error, Result};
use maestro_llm::Mode;

/// Commands whose first positional argument must be an existing file path
pub const FILE_ARG_COMMANDS: [&str; 2] = ["implement", "review-plan"];

/// One stage of a command pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Stage identifier, unique within the command
    pub id: String,
    /// Agent role override for this stage
    #[serde(default)]
    pub agent: Option<String>,
    /// Declared inputs; `$CONTEXT_<key>` references session context,
    /// `$STAGE_<id>` references an earlier stage's output
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Conditional expression; the stage is skipped when a referenced
    /// `$CONTEXT_<key>` is absent
    #[serde(default)]
    pub conditional: Option<String>,
    /// Prompt template for the stage
    pub prompt: String,
}

/// Immutable description of a command, loaded once per invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDefinition {
    /// Command name
    pub name: String,
    /// Default agent role
    pub agent: String,
    /// Default model, if the command prefers one
    #[serde(default)]
    pub default_model: Option<String>,
    /// Default execution mode
    #[serde(default)]
    pub default_mode: Option<Mode>,
    /// Pipeline stages, executed in declaration order
    pub stages: Vec<StageDefinition>,
    /// Tool allowlist handed to the pipeline engine
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Whether the execution agent may be inferred from task content
    #[serde(default)]
    pub dynamic_agent_selection: bool,
    /// Agent used when dynamic selection errors out
    #[serde(default = "default_fallback_agent")]
    pub fallback_agent: String,
}

fn default_fallback_agent() -> String {
    "generalist".to_string()
}

impl CommandDefinition {
    /// Whether the command requires an existing file path as its first
    /// positional argument
    #[must_use]
    pub fn requires_file_arg(&self) -> bool {
        FILE_ARG_COMMANDS.contains(&self.name.as_str())
    }
}

fn stage(id: &str, prompt: &str, inputs: &[&str], conditional: Option<&str>) -> StageDefinition {
    StageDefinition {
        id: id.to_string(),
        agent: None,
        inputs: inputs.iter().map(|s| (*s).to_string()).collect(),
        conditional: conditional.map(String::from),
        prompt: prompt.to_string(),
    }
}

fn builtin(name: &str) -> Option<CommandDefinition> {
    let command = match name {
        "implement" => CommandDefinition {
            name: "implement".to_string(),
            agent: "implementer".to_string(),
            default_model: None,
            default_mode: Some(Mode::Agent),
            stages: vec![
                stage(
                    "analyze",
                    "Analyze the change described in {input} against the plan.",
                    &["$CONTEXT_planSummary", "$CONTEXT_targetFiles"],
                    None,
                ),
                stage(
                    "apply",
                    "Apply the change produced by the analysis.",
                    &["$STAGE_analyze"],
                    None,
                ),
                stage(
                    "verify",
                    "Verify the applied change against the declared dependencies.",
                    &["$STAGE_apply"],
                    Some("$CONTEXT_dependencies"),
                ),
            ],
            allowed_tools: vec!["read_file".to_string(), "write_file".to_string(), "shell".to_string()],
            dynamic_agent_selection: true,
            fallback_agent: "implementer".to_string(),
        },
        "review-plan" => CommandDefinition {
            name: "review-plan".to_string(),
            agent: "reviewer".to_string(),
            default_model: None,
            default_mode: Some(Mode::Plan),
            stages: vec![stage(
                "review",
                "Review the plan in {input} for gaps and risks.",
                &["$CONTEXT_planSummary"],
                None,
            )],
            allowed_tools: vec!["read_file".to_string()],
            dynamic_agent_selection: true,
            fallback_agent: "reviewer".to_string(),
        },
        "plan" => CommandDefinition {
            name: "plan".to_string(),
            agent: "planner".to_string(),
            default_model: None,
            default_mode: Some(Mode::Plan),
            stages: vec![
                stage("draft", "Draft a plan for: {input}", &[], None),
                stage("refine", "Refine the drafted plan.", &["$STAGE_draft"], None),
            ],
            allowed_tools: vec!["read_file".to_string()],
            dynamic_agent_selection: false,
            fallback_agent: "planner".to_string(),
        },
        "test" => CommandDefinition {
            name: "test".to_string(),
            agent: "tester".to_string(),
            default_model: None,
            default_mode: Some(Mode::Chat),
            stages: vec![stage("run", "Exercise: {input}", &[], None)],
            allowed_tools: vec!["shell".to_string()],
            dynamic_agent_selection: false,
            fallback_agent: "tester".to_string(),
        },
        _ => return None,
    };
    Some(command)
}

/// Loads command definitions: built-ins first, then TOML files from the
/// user commands directory.
#[derive(Debug, Clone, Default)]
pub struct CommandLoader {
    commands_dir: Option<PathBuf>,
}

impl CommandLoader {
    /// Create a loader with an optional user commands directory
    #[must_use]
    pub fn new(commands_dir: Option<PathBuf>) -> Self {
        Self { commands_dir }
    }

    /// Load a command definition. Fails with `NotFound` if the command
    /// does not exist; fatal, no retry.
    pub fn load(&self, name: &str) -> Result<CommandDefinition> {
        if let Some(command) = builtin(name) {
            debug!(command = name, "Loaded built-in command");
            return Ok(command);
        }

        if let Some(dir) = &self.commands_dir {
            let path = dir.join(format!("{name}.toml"));
            if path.is_file() {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Configuration(format!("reading {}: {e}", path.display())))?;
                let command: CommandDefinition = toml::from_str(&raw)
                    .map_err(|e| Error::Configuration(format!("parsing {}: {e}", path.display())))?;
                debug!(command = name, path = %path.display(), "Loaded user command");
                return Ok(command);
            }
        }

        Err(Error::NotFound(format!("command '{name}'")))
    }

    /// Names of all loadable commands (built-ins plus user TOML files)
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = ["implement", "review-plan", "plan", "test"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();

        if let Some(dir) = &self.commands_dir {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().is_some_and(|e| e == "toml") {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            if !names.iter().any(|n| n == stem) {
                                names.push(stem.to_string());
                            }
                        }
                    }
                }
            }
        }

        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_builtin() {
        let loader = CommandLoader::default();
        let command = loader.load("implement").unwrap();
        assert_eq!(command.agent, "implementer");
        assert!(command.dynamic_agent_selection);
        assert!(command.requires_file_arg());
        assert_eq!(command.stages.len(), 3);
    }

    #[test]
    fn test_unknown_command_is_not_found() {
        let loader = CommandLoader::default();
        let result = loader.load("deploy");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_load_user_command_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("summarize.toml")).unwrap();
        writeln!(
            file,
            r#"
name = "summarize"
agent = "documenter"

[[stages]]
id = "summarize"
prompt = "Summarize: {{input}}"
inputs = ["$CONTEXT_planSummary"]
"#
        )
        .unwrap();

        let loader = CommandLoader::new(Some(dir.path().to_path_buf()));
        let command = loader.load("summarize").unwrap();
        assert_eq!(command.agent, "documenter");
        assert_eq!(command.fallback_agent, "generalist");
        assert!(!command.dynamic_agent_selection);
        assert!(loader.list().contains(&"summarize".to_string()));
    }

    #[test]
    fn test_list_contains_builtins() {
        let loader = CommandLoader::default();
        let names = loader.list();
        for builtin in ["implement", "review-plan", "plan", "test"] {
            assert!(names.contains(&builtin.to_string()));
        }
    }
}
