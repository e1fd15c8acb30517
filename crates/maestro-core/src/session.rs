//! Session store
//!
//! One active session per invocation. This core only reads accumulated
//! context and appends its own keys (`dynamicAgentSelection`,
//! `featureFlags`, `commandStageOutputs`); it never replaces or deletes
//! session state. Context values are decoded
//! once at the boundary into a tagged union so downstream code
//! pattern-matches instead of probing for optional fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Reserved session context keys
pub mod keys {
    /// Summary of a previously produced plan
    pub const PLAN_SUMMARY: &str = "planSummary";
    /// Free-form task record
    pub const TASK: &str = "task";
    /// Files a previous command targeted
    pub const TARGET_FILES: &str = "targetFiles";
    /// Scope produced by a previous implement run
    pub const IMPLEMENTATION_SCOPE: &str = "implementationScope";
    /// Declared dependencies
    pub const DEPENDENCIES: &str = "dependencies";
    /// Stage outputs accumulated by prior commands in this session
    pub const COMMAND_STAGE_OUTPUTS: &str = "commandStageOutputs";
    /// The agent selection recorded by this core
    pub const DYNAMIC_AGENT_SELECTION: &str = "dynamicAgentSelection";
    /// The feature flag snapshot recorded by this core
    pub const FEATURE_FLAGS: &str = "featureFlags";
}

/// Summary of a plan stored in session context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    /// One-paragraph plan summary
    pub summary: String,
    /// Dependencies the plan declared
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Files the plan targets
    #[serde(default, rename = "targetFiles")]
    pub target_files: Vec<String>,
}

/// Free-form task record stored in session context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task description
    pub description: String,
}

/// A session context value, decoded once at the session boundary.
///
/// Untagged decoding tries the known shapes in order; anything else is
/// kept as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    /// A plan summary
    PlanSummary(PlanSummary),
    /// A task record
    TaskRecord(TaskRecord),
    /// Anything else
    Raw(serde_json::Value),
}

impl ContextValue {
    /// Decode a raw JSON value into the tagged union
    #[must_use]
    pub fn decode(value: serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(Self::Raw(value))
    }

    /// The human description this value carries, if any
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::PlanSummary(plan) => Some(&plan.summary),
            Self::TaskRecord(task) => Some(&task.description),
            Self::Raw(serde_json::Value::String(s)) => Some(s),
            Self::Raw(_) => None,
        }
    }

    /// A string list carried by this value (raw array of strings, or the
    /// plan's target files)
    #[must_use]
    pub fn string_list(&self) -> Vec<String> {
        match self {
            Self::PlanSummary(plan) => plan.target_files.clone(),
            Self::Raw(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A nested string list under `field`, for object-shaped raw values
    #[must_use]
    pub fn nested_string_list(&self, field: &str) -> Vec<String> {
        match self {
            Self::Raw(serde_json::Value::Object(map)) => map
                .get(field)
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

/// A single session's accumulated state
#[derive(Debug, Clone)]
pub struct Session {
    /// Session ID
    pub id: Uuid,
    context: HashMap<String, ContextValue>,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
}

impl Session {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            context: HashMap::new(),
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// When the session was created
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// In-memory session store. Exactly one writer (the coordinator) appends
/// context keys per invocation.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    /// Create a new store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session and return its ID
    pub async fn create_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Session::new(id));
        id
    }

    /// Fetch an existing session by ID or create a fresh one
    pub async fn get_or_create(&self, id: Option<Uuid>) -> Uuid {
        match id {
            Some(id) => {
                let mut sessions = self.sessions.write().await;
                sessions.entry(id).or_insert_with(|| Session::new(id));
                id
            }
            None => self.create_session().await,
        }
    }

    /// Get one context value
    pub async fn get_context(&self, id: Uuid, key: &str) -> Result<Option<ContextValue>> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("session {id}")))?;
        Ok(session.context.get(key).cloned())
    }

    /// Get the entire accumulated context
    pub async fn get_all_context(&self, id: Uuid) -> Result<HashMap<String, ContextValue>> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("session {id}")))?;
        Ok(session.context.clone())
    }

    /// Get the keys currently present in the context
    pub async fn get_context_keys(&self, id: Uuid) -> Result<Vec<String>> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("session {id}")))?;
        Ok(session.context.keys().cloned().collect())
    }

    /// Get only the named keys from the context
    pub async fn get_filtered_context(
        &self,
        id: Uuid,
        keys: &[String],
    ) -> Result<HashMap<String, ContextValue>> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("session {id}")))?;
        Ok(session
            .context
            .iter()
            .filter(|(k, _)| keys.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Append one context key (decoded at the boundary). Existing keys are
    /// overwritten; nothing is ever deleted.
    pub async fn update_context(
        &self,
        id: Uuid,
        key: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("session {id}")))?;
        session.last_accessed_at = Utc::now();
        session
            .context
            .insert(key.to_string(), ContextValue::decode(value));
        Ok(())
    }
}
