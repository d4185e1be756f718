use thiserror::Error;

use crate::{AgentId, TaskId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No agent holds the capability at the requested proficiency. The task is parked.
    #[error("No agent available for capability '{capability}' (task {task_id} queued)")]
    NoAgentAvailable { task_id: TaskId, capability: String },

    /// Qualified agents exist but all are saturated. The task is parked.
    #[error("All agents for capability '{capability}' are at capacity (task {task_id} queued)")]
    TaskQueued { task_id: TaskId, capability: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Agent {agent_id} is at its WIP limit of {limit}")]
    WipLimitExceeded { agent_id: AgentId, limit: u32 },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl DispatchError {
    /// True for the two outcomes that leave the task safely queued.
    pub fn is_queued(&self) -> bool {
        matches!(
            self,
            DispatchError::NoAgentAvailable { .. } | DispatchError::TaskQueued { .. }
        )
    }

    pub fn agent_not_found(id: &AgentId) -> Self {
        DispatchError::NotFound(format!("agent {}", id))
    }

    pub fn task_not_found(id: &TaskId) -> Self {
        DispatchError::NotFound(format!("task {}", id))
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_outcomes_are_recoverable() {
        let parked = DispatchError::TaskQueued {
            task_id: "t1".into(),
            capability: "Web".into(),
        };
        let missing = DispatchError::NoAgentAvailable {
            task_id: "t1".into(),
            capability: "Web".into(),
        };
        assert!(parked.is_queued());
        assert!(missing.is_queued());
        assert!(!DispatchError::task_not_found(&"t1".into()).is_queued());
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = DispatchError::agent_not_found(&"a-7".into());
        assert_eq!(err.to_string(), "Not found: agent a-7");
    }
}
