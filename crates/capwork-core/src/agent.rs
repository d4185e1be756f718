use crate::{AgentId, AgentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_WIP_LIMIT: u32 = 3;
pub const MIN_PROFICIENCY: u8 = 1;
pub const MAX_PROFICIENCY: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub current_wip: u32,
    #[serde(default = "default_wip_limit")]
    pub wip_limit: u32,
    #[serde(default = "default_quality_score")]
    pub quality_score: f64,
    #[serde(default = "Utc::now")]
    pub last_active: DateTime<Utc>,
}

fn default_wip_limit() -> u32 {
    DEFAULT_WIP_LIMIT
}

fn default_quality_score() -> f64 {
    1.0
}

impl AgentProfile {
    pub fn new(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            status: AgentStatus::Available,
            current_wip: 0,
            wip_limit: DEFAULT_WIP_LIMIT,
            quality_score: default_quality_score(),
            last_active: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_wip_limit(mut self, wip_limit: u32) -> Self {
        self.wip_limit = wip_limit;
        self
    }

    /// Quality is clamped into `[0, 1]`; NaN becomes 0.
    pub fn with_quality_score(mut self, quality_score: f64) -> Self {
        self.quality_score = clamp_unit(quality_score);
        self
    }

    pub fn with_current_wip(mut self, current_wip: u32) -> Self {
        self.current_wip = current_wip.min(self.wip_limit);
        self
    }

    pub fn has_capacity(&self) -> bool {
        self.current_wip < self.wip_limit
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.wip_limit.saturating_sub(self.current_wip)
    }

    /// Restore the invariants a deserialized or hand-built profile may violate.
    pub fn normalized(mut self) -> Self {
        self.quality_score = clamp_unit(self.quality_score);
        self.current_wip = self.current_wip.min(self.wip_limit);
        self
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub agent_id: AgentId,
    pub skill_id: String,
    pub proficiency: u8,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub certifications: BTreeSet<String>,
}

impl Capability {
    /// Proficiency is clamped into `[1, 5]`.
    pub fn new(agent_id: impl Into<AgentId>, skill_id: impl Into<String>, proficiency: u8) -> Self {
        Self {
            agent_id: agent_id.into(),
            skill_id: skill_id.into(),
            proficiency: proficiency.clamp(MIN_PROFICIENCY, MAX_PROFICIENCY),
            last_used: None,
            certifications: BTreeSet::new(),
        }
    }

    pub fn with_certification(mut self, certification: impl Into<String>) -> Self {
        self.certifications.insert(certification.into());
        self
    }

    pub fn with_last_used(mut self, last_used: DateTime<Utc>) -> Self {
        self.last_used = Some(last_used);
        self
    }

    pub fn normalized(mut self) -> Self {
        self.proficiency = self.proficiency.clamp(MIN_PROFICIENCY, MAX_PROFICIENCY);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_defaults() {
        let p = AgentProfile::new("a1");
        assert_eq!(p.status, AgentStatus::Available);
        assert_eq!(p.current_wip, 0);
        assert_eq!(p.wip_limit, 3);
        assert!(p.has_capacity());
        assert_eq!(p.remaining_capacity(), 3);
    }

    #[test]
    fn builders_clamp_out_of_range_values() {
        let p = AgentProfile::new("a1")
            .with_quality_score(1.7)
            .with_wip_limit(2)
            .with_current_wip(9);
        assert_eq!(p.quality_score, 1.0);
        assert_eq!(p.current_wip, 2);
        assert!(!p.has_capacity());

        assert_eq!(Capability::new("a1", "Web", 0).proficiency, 1);
        assert_eq!(Capability::new("a1", "Web", 9).proficiency, 5);
    }

    #[test]
    fn deserializes_with_defaults() {
        let p: AgentProfile = serde_json::from_str(r#"{"id":"a9"}"#).unwrap();
        assert_eq!(p.wip_limit, DEFAULT_WIP_LIMIT);
        assert_eq!(p.status, AgentStatus::Available);

        let c: Capability =
            serde_json::from_str(r#"{"agent_id":"a9","skill_id":"Web:React","proficiency":4}"#)
                .unwrap();
        assert!(c.certifications.is_empty());
        assert_eq!(c.proficiency, 4);
    }
}
