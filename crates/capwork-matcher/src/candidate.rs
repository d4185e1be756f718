use capwork_core::AgentId;
use serde::{Deserialize, Serialize};

/// Weighted sub-scores for one agent. Each term lies in `[0, weight]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub proficiency: f64,
    pub availability: f64,
    pub quality: f64,
    pub load: f64,
}

impl SubScores {
    pub fn total(&self) -> f64 {
        round_score(self.proficiency + self.availability + self.quality + self.load)
    }
}

/// Scores are compared at 9 decimal places so that weight arithmetic such as
/// `0.4 + 0.3 + 0.2 + 0.1` lands on exactly `1.0`.
pub fn round_score(v: f64) -> f64 {
    (v * 1e9).round() / 1e9
}

/// One ranked agent, produced fresh by every matching call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub agent_id: AgentId,
    pub proficiency_score: f64,
    pub availability_score: f64,
    pub quality_score: f64,
    pub load_score: f64,
    pub total_score: f64,
    /// Required skills this agent satisfied, directly or through an ancestor.
    pub matched_skills: Vec<String>,
    /// How many of `matched_skills` were satisfied by the exact skill path.
    pub exact_matches: usize,
}

impl MatchCandidate {
    pub fn new(
        agent_id: AgentId,
        scores: SubScores,
        matched_skills: Vec<String>,
        exact_matches: usize,
    ) -> Self {
        Self {
            agent_id,
            proficiency_score: scores.proficiency,
            availability_score: scores.availability,
            quality_score: scores.quality,
            load_score: scores.load,
            total_score: scores.total(),
            matched_skills,
            exact_matches,
        }
    }

    pub fn sub_scores(&self) -> SubScores {
        SubScores {
            proficiency: self.proficiency_score,
            availability: self.availability_score,
            quality: self.quality_score,
            load: self.load_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_marks_total_exactly_one() {
        let s = SubScores {
            proficiency: 0.4,
            availability: 0.3,
            quality: 0.2,
            load: 0.1,
        };
        assert_eq!(s.total(), 1.0);
    }

    #[test]
    fn candidate_carries_sub_scores() {
        let s = SubScores {
            proficiency: 0.32,
            availability: 0.15,
            quality: 0.1,
            load: 0.0,
        };
        let c = MatchCandidate::new("a".into(), s, vec!["Web".into()], 1);
        assert_eq!(c.sub_scores(), s);
        assert_eq!(c.total_score, 0.57);
    }
}
