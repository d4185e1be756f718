use crate::{MatchCandidate, Scorer, WeightedScorer};
use capwork_core::{skill, AgentId};
use capwork_registry::{CapabilityRegistry, RegistryView};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct SkillHit {
    proficiency: u8,
    exact: bool,
}

/// Stateless ranker over a shared registry. Never mutates registry state.
pub struct CapabilityMatcher<S = WeightedScorer> {
    registry: Arc<CapabilityRegistry>,
    scorer: S,
}

impl CapabilityMatcher<WeightedScorer> {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self::with_scorer(registry, WeightedScorer::default())
    }
}

impl<S: Scorer> CapabilityMatcher<S> {
    pub fn with_scorer(registry: Arc<CapabilityRegistry>, scorer: S) -> Self {
        Self { registry, scorer }
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Rank every agent that satisfies at least one required skill, best first.
    pub fn match_skills<T: AsRef<str>>(
        &self,
        required_skills: &[T],
        min_proficiency: u8,
    ) -> Vec<MatchCandidate> {
        self.match_excluding(required_skills, min_proficiency, &[])
    }

    /// Same as [`match_skills`](Self::match_skills) with some agents left out.
    pub fn match_excluding<T: AsRef<str>>(
        &self,
        required_skills: &[T],
        min_proficiency: u8,
        exclude: &[AgentId],
    ) -> Vec<MatchCandidate> {
        if required_skills.is_empty() {
            return Vec::new();
        }

        let view = self.registry.view();
        let mut hits: BTreeMap<AgentId, Vec<(String, SkillHit)>> = BTreeMap::new();
        let mut seen_skills: Vec<&str> = Vec::with_capacity(required_skills.len());

        for required in required_skills {
            let required = required.as_ref();
            if seen_skills.contains(&required) {
                continue;
            }
            seen_skills.push(required);

            for (agent_id, hit) in hierarchical_lookup(&view, required, min_proficiency) {
                if exclude.contains(&agent_id) {
                    continue;
                }
                hits.entry(agent_id)
                    .or_default()
                    .push((required.to_string(), hit));
            }
        }

        let mut candidates: Vec<MatchCandidate> = hits
            .into_iter()
            .filter_map(|(agent_id, matched)| {
                let agent = view.agent(&agent_id)?;
                let sum: u32 = matched.iter().map(|(_, h)| u32::from(h.proficiency)).sum();
                let avg = f64::from(sum) / matched.len() as f64;
                let exact = matched.iter().filter(|(_, h)| h.exact).count();
                let scores = self.scorer.score(agent, avg);
                let skills = matched.into_iter().map(|(s, _)| s).collect();
                Some(MatchCandidate::new(agent_id, scores, skills, exact))
            })
            .collect();
        drop(view);

        candidates.sort_by(rank_order);
        debug!(
            scorer = self.scorer.name(),
            skills = ?seen_skills,
            min_proficiency,
            candidates = candidates.len(),
            "Ranked candidates"
        );
        candidates
    }
}

/// Total score descending, exact skill matches descending, agent id ascending.
pub fn rank_order(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.total_score
        .total_cmp(&a.total_score)
        .then_with(|| b.exact_matches.cmp(&a.exact_matches))
        .then_with(|| a.agent_id.cmp(&b.agent_id))
}

/// Exact path first; only when nobody qualifies there, the union over every
/// ancestor level, keeping each agent's best proficiency.
fn hierarchical_lookup(
    view: &RegistryView<'_>,
    skill_id: &str,
    min_proficiency: u8,
) -> Vec<(AgentId, SkillHit)> {
    let exact = view.agents_with_skill(skill_id, min_proficiency);
    if !exact.is_empty() {
        return exact
            .into_iter()
            .map(|(id, proficiency)| {
                (
                    id,
                    SkillHit {
                        proficiency,
                        exact: true,
                    },
                )
            })
            .collect();
    }

    let mut best: BTreeMap<AgentId, u8> = BTreeMap::new();
    for ancestor in skill::ancestors(skill_id) {
        for (id, proficiency) in view.agents_with_skill(ancestor, min_proficiency) {
            let slot = best.entry(id).or_insert(proficiency);
            *slot = (*slot).max(proficiency);
        }
    }

    best.into_iter()
        .map(|(id, proficiency)| {
            (
                id,
                SkillHit {
                    proficiency,
                    exact: false,
                },
            )
        })
        .collect()
}
