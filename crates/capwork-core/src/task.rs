use crate::{AgentId, Priority, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub required_capability: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub assigned_agent: Option<AgentId>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Opaque payload; never inspected by the dispatcher.
    #[serde(default)]
    pub context: serde_json::Value,
}

fn default_timeout() -> u64 {
    DEFAULT_TASK_TIMEOUT_SECS
}

impl Task {
    pub fn new(id: impl Into<TaskId>, required_capability: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            required_capability: required_capability.into(),
            priority: Priority::Normal,
            created_at: Utc::now(),
            status: TaskStatus::Pending,
            assigned_agent: None,
            timeout_seconds: DEFAULT_TASK_TIMEOUT_SECS,
            context: serde_json::Value::Null,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Whether the task has outlived its timeout, measured from creation.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.num_seconds() >= 0 && age.num_seconds() as u64 >= self.timeout_seconds
    }
}

/// Immutable link between a task and the agent that claimed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub capability: String,
    pub assigned_at: DateTime<Utc>,
}

impl Assignment {
    pub fn new(task_id: TaskId, agent_id: AgentId, capability: impl Into<String>) -> Self {
        Self {
            task_id,
            agent_id,
            capability: capability.into(),
            assigned_at: Utc::now(),
        }
    }
}
