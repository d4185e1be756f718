use anyhow::{Context, Result};
use capwork_core::{
    AgentProfile, AgentStatus, Capability, CapworkConfig, Priority, Task, TaskId,
};
use capwork_registry::CapabilityRegistry;
use capwork_router::TaskRouter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Agents and tasks to replay against a fresh router.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub agents: Vec<ScenarioAgent>,
    #[serde(default)]
    pub tasks: Vec<ScenarioTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioAgent {
    pub id: String,
    #[serde(default)]
    pub wip_limit: Option<u32>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub status: Option<AgentStatus>,
    #[serde(default)]
    pub skills: Vec<ScenarioSkill>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSkill {
    pub skill: String,
    pub proficiency: u8,
    #[serde(default)]
    pub certifications: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioTask {
    #[serde(default)]
    pub id: Option<String>,
    pub capability: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Register every agent and capability into a new router.
    pub fn build_router(&self, config: &CapworkConfig) -> Result<TaskRouter> {
        let router = TaskRouter::new(Arc::new(CapabilityRegistry::new()), config);
        for agent in &self.agents {
            let mut profile = AgentProfile::new(agent.id.as_str())
                .with_wip_limit(agent.wip_limit.unwrap_or(config.routing.default_wip_limit));
            if let Some(q) = agent.quality_score {
                profile = profile.with_quality_score(q);
            }
            if let Some(status) = agent.status {
                profile = profile.with_status(status);
            }
            router.register_agent(profile);

            for skill in &agent.skills {
                let mut cap = Capability::new(agent.id.as_str(), skill.skill.as_str(), skill.proficiency);
                for cert in &skill.certifications {
                    cap = cap.with_certification(cert.as_str());
                }
                router
                    .add_capability(cap)
                    .with_context(|| format!("adding {} to {}", skill.skill, agent.id))?;
            }
        }
        Ok(router)
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let id = t
                    .id
                    .clone()
                    .map(TaskId::from)
                    .unwrap_or_else(|| TaskId::from(format!("task-{}", i + 1)));
                let mut task = Task::new(id, t.capability.as_str())
                    .with_priority(t.priority.unwrap_or_default());
                if let Some(timeout) = t.timeout_seconds {
                    task = task.with_timeout(timeout);
                }
                task
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[agents]]
id = "alice"
wip_limit = 1
skills = [{ skill = "Web:React", proficiency = 5 }]

[[agents]]
id = "bob"
status = "OFFLINE"
skills = [{ skill = "Web", proficiency = 3, certifications = ["aws"] }]

[[tasks]]
id = "hooks"
capability = "Web:React:Hooks"
priority = "high"

[[tasks]]
capability = "Web:React"
"#;

    #[test]
    fn parses_and_builds_router() {
        let scenario: Scenario = toml::from_str(SAMPLE).unwrap();
        let router = scenario.build_router(&CapworkConfig::default()).unwrap();

        let bob = router.registry().get_agent(&"bob".into()).unwrap();
        assert_eq!(bob.status, AgentStatus::Offline);
        assert_eq!(bob.wip_limit, 3);
        assert!(router.registry().get_capabilities(&"bob".into())[0]
            .certifications
            .contains("aws"));

        let tasks = scenario.tasks();
        assert_eq!(tasks[0].id.as_str(), "hooks");
        assert_eq!(tasks[0].priority, Priority::High);
        assert_eq!(tasks[1].id.as_str(), "task-2");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Scenario::load(Path::new("/no/such/scenario.toml")).unwrap_err();
        assert!(err.to_string().contains("reading scenario"));
    }
}
