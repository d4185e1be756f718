use crate::SubScores;
use capwork_core::{AgentProfile, AgentStatus, ScoringConfig, MAX_PROFICIENCY};

/// Turns an agent profile plus its matched proficiency into weighted sub-scores.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// `avg_proficiency` is the mean best proficiency over the required
    /// skills the agent actually matched, on the 1-5 scale.
    fn score(&self, agent: &AgentProfile, avg_proficiency: f64) -> SubScores;
}

/// Linear weighted sum of proficiency, availability, quality and load.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedScorer {
    weights: ScoringConfig,
}

impl WeightedScorer {
    pub fn new(weights: ScoringConfig) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringConfig {
        &self.weights
    }

    fn availability_factor(&self, status: AgentStatus) -> f64 {
        match status {
            AgentStatus::Available => 1.0,
            AgentStatus::Busy => self.weights.busy_availability,
            AgentStatus::Offline => 0.0,
        }
    }
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl Scorer for WeightedScorer {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn score(&self, agent: &AgentProfile, avg_proficiency: f64) -> SubScores {
        let w = &self.weights;
        let proficiency = (avg_proficiency / f64::from(MAX_PROFICIENCY)).clamp(0.0, 1.0);
        let load = if agent.wip_limit == 0 {
            0.0
        } else {
            (1.0 - f64::from(agent.current_wip) / f64::from(agent.wip_limit)).max(0.0)
        };

        SubScores {
            proficiency: proficiency * w.proficiency_weight,
            availability: self.availability_factor(agent.status) * w.availability_weight,
            quality: agent.quality_score.clamp(0.0, 1.0) * w.quality_weight,
            load: load * w.load_weight,
        }
    }
}
