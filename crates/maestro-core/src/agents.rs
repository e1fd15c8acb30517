//! Agent catalog and dynamic selection
//!
//! Maps task content to an execution role. Confidence is a property of the
//! selection event, not of the agent; it is recomputed on every call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::Result;

/// How involved the task looks, derived from its signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Touches at most one file
    Low,
    /// Touches a handful of files
    Medium,
    /// Touches many files or carries many dependencies
    High,
}

/// Read-only projection of an invocation used to drive dynamic selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    /// What the task is about
    pub description: String,
    /// Files the task is expected to touch
    pub affected_files: Vec<String>,
    /// Declared dependencies
    pub dependencies: Vec<String>,
    /// Derived complexity
    pub complexity: Complexity,
    /// Free-form metadata (command name etc.)
    pub metadata: HashMap<String, String>,
}

impl TaskContext {
    /// Derive complexity from the number of affected files and
    /// dependencies
    #[must_use]
    pub fn derive_complexity(affected_files: &[String], dependencies: &[String]) -> Complexity {
        match affected_files.len() + dependencies.len() {
            0..=1 => Complexity::Low,
            2..=4 => Complexity::Medium,
            _ => Complexity::High,
        }
    }
}

/// A ranked alternative produced during selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredAgent {
    /// Agent role
    pub agent: String,
    /// Score in [0, 1]
    pub score: f64,
    /// Why the agent scored what it did
    pub reasons: Vec<String>,
}

/// The outcome of one dynamic selection event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSelection {
    /// Chosen agent role
    pub selected_agent: String,
    /// Confidence in [0, 1] for this selection event
    pub confidence: f64,
    /// Ordered reasons behind the choice
    pub reasons: Vec<String>,
    /// Ranked alternatives, best first, excluding the selected agent
    pub alternatives: Vec<ScoredAgent>,
}

/// A built-in agent role and its matching signals
#[derive(Debug, Clone)]
pub struct AgentProfile {
    /// Role identifier
    pub id: &'static str,
    /// Human description
    pub description: &'static str,
    keywords: &'static [&'static str],
    extensions: &'static [&'static str],
}

/// The fixed catalog of execution roles
#[derive(Debug, Clone)]
pub struct AgentCatalog {
    agents: Vec<AgentProfile>,
}

impl AgentCatalog {
    /// Role used when nothing else matches
    pub const GENERALIST: &'static str = "generalist";

    /// Create the built-in catalog
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            agents: vec![
                AgentProfile {
                    id: "implementer",
                    description: "Writes and modifies source code",
                    keywords: &["implement", "add", "fix", "refactor", "build", "write"],
                    extensions: &[".rs", ".ts", ".tsx", ".js", ".py", ".go"],
                },
                AgentProfile {
                    id: "reviewer",
                    description: "Reviews plans and changes for gaps and risks",
                    keywords: &["review", "audit", "check", "critique"],
                    extensions: &[".md"],
                },
                AgentProfile {
                    id: "planner",
                    description: "Produces multi-step plans",
                    keywords: &["plan", "design", "outline", "architect"],
                    extensions: &[],
                },
                AgentProfile {
                    id: "tester",
                    description: "Exercises code and validates behavior",
                    keywords: &["test", "verify", "validate", "regression"],
                    extensions: &[],
                },
                AgentProfile {
                    id: "documenter",
                    description: "Writes and updates documentation",
                    keywords: &["document", "docs", "readme", "explain"],
                    extensions: &[".md", ".toml", ".yaml"],
                },
                AgentProfile {
                    id: Self::GENERALIST,
                    description: "Handles anything without a clearer owner",
                    keywords: &[],
                    extensions: &[],
                },
            ],
        }
    }

    /// All role identifiers
    #[must_use]
    pub fn agent_ids(&self) -> Vec<&'static str> {
        self.agents.iter().map(|a| a.id).collect()
    }

    /// Whether the role exists in the catalog
    #[must_use]
    pub fn has_agent(&self, id: &str) -> bool {
        self.agents.iter().any(|a| a.id == id)
    }

    /// Profiles in the catalog
    #[must_use]
    pub fn profiles(&self) -> &[AgentProfile] {
        &self.agents
    }
}

/// Resolves an execution role from task content
#[async_trait::async_trait]
pub trait AgentResolver: Send + Sync {
    /// Resolve a selection for the given task. Errors here are downgraded
    /// by the coordinator to the command's fallback agent.
    async fn resolve(&self, task: &TaskContext) -> Result<AgentSelection>;
}

/// Keyword/extension scoring resolver over the built-in catalog
#[derive(Debug, Clone)]
pub struct HeuristicAgentResolver {
    catalog: AgentCatalog,
}

impl HeuristicAgentResolver {
    /// Create a resolver over the given catalog
    #[must_use]
    pub fn new(catalog: AgentCatalog) -> Self {
        Self { catalog }
    }

    fn score(&self, profile: &AgentProfile, task: &TaskContext) -> ScoredAgent {
        let description = task.description.to_lowercase();
        let mut score: f64 = 0.0;
        let mut reasons = Vec::new();

        for keyword in profile.keywords {
            if description.contains(keyword) {
                score += 0.3;
                reasons.push(format!("keyword '{keyword}'"));
            }
        }
        for file in &task.affected_files {
            if profile.extensions.iter().any(|ext| file.ends_with(ext)) {
                score += 0.15;
                reasons.push(format!("file '{file}'"));
            }
        }

        // Everything is at least a weak generalist match
        if profile.id == AgentCatalog::GENERALIST {
            score = score.max(0.3);
            reasons.push("default role".to_string());
        }

        ScoredAgent {
            agent: profile.id.to_string(),
            score: score.min(1.0),
            reasons,
        }
    }
}

#[async_trait::async_trait]
impl AgentResolver for HeuristicAgentResolver {
    async fn resolve(&self, task: &TaskContext) -> Result<AgentSelection> {
        let mut scored: Vec<ScoredAgent> = self
            .catalog
            .profiles()
            .iter()
            .map(|p| self.score(p, task))
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let best = scored.remove(0);
        debug!(agent = %best.agent, confidence = best.score, "Dynamic agent selection");

        Ok(AgentSelection {
            selected_agent: best.agent,
            confidence: best.score,
            reasons: best.reasons,
            alternatives: scored.into_iter().filter(|s| s.score > 0.0).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(description: &str, files: &[&str]) -> TaskContext {
        let affected_files: Vec<String> = files.iter().map(|s| (*s).to_string()).collect();
        TaskContext {
            description: description.to_string(),
            complexity: TaskContext::derive_complexity(&affected_files, &[]),
            affected_files,
            dependencies: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_implementer_wins_on_code_task() {
        let resolver = HeuristicAgentResolver::new(AgentCatalog::builtin());
        let selection = resolver
            .resolve(&task("implement retry logic", &["src/client.rs"]))
            .await
            .unwrap();

        assert_eq!(selection.selected_agent, "implementer");
        assert!(selection.confidence >= 0.3);
        assert!(!selection.reasons.is_empty());
        assert!(selection
            .alternatives
            .iter()
            .all(|a| a.agent != "implementer"));
    }

    #[tokio::test]
    async fn test_vague_task_falls_to_generalist_with_low_confidence() {
        let resolver = HeuristicAgentResolver::new(AgentCatalog::builtin());
        let selection = resolver.resolve(&task("do the thing", &[])).await.unwrap();

        assert_eq!(selection.selected_agent, AgentCatalog::GENERALIST);
        assert!(selection.confidence < 0.5);
    }

    #[tokio::test]
    async fn test_confidence_recomputed_per_call() {
        let resolver = HeuristicAgentResolver::new(AgentCatalog::builtin());
        let strong = resolver
            .resolve(&task("implement and fix and refactor", &["a.rs"]))
            .await
            .unwrap();
        let weak = resolver.resolve(&task("hmm", &[])).await.unwrap();
        assert!(strong.confidence > weak.confidence);
    }

    #[test]
    fn test_derive_complexity() {
        assert_eq!(TaskContext::derive_complexity(&[], &[]), Complexity::Low);
        let files: Vec<String> = (0..3).map(|i| format!("f{i}.rs")).collect();
        assert_eq!(TaskContext::derive_complexity(&files, &[]), Complexity::Medium);
        let many: Vec<String> = (0..6).map(|i| format!("f{i}.rs")).collect();
        assert_eq!(TaskContext::derive_complexity(&many, &[]), Complexity::High);
    }

    #[test]
    fn test_catalog_contains_expected_roles() {
        let catalog = AgentCatalog::builtin();
        for role in ["implementer", "reviewer", "planner", "tester", "documenter", "generalist"] {
            assert!(catalog.has_agent(role), "missing {role}");
        }
        assert!(!catalog.has_agent("wizard"));
    }
}
