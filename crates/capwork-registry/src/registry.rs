use capwork_core::{AgentId, AgentProfile, AgentStatus, Capability, DispatchError, Result};
use chrono::Utc;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct RegistryState {
    agents: HashMap<AgentId, AgentProfile>,
    capabilities: HashMap<AgentId, Vec<Capability>>,
    // skill_id -> (agent_id -> proficiency); ordered so lookups are deterministic
    skill_index: HashMap<String, BTreeMap<AgentId, u8>>,
}

/// Authoritative store of agents and what they can do.
///
/// The registry is the only writer of its skill index. Composite
/// check-then-act sequences (claiming capacity) belong to the caller; the
/// one exception is [`CapabilityRegistry::increment_wip`], which refuses to
/// pass `wip_limit` under a single write lock.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    state: RwLock<RegistryState>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an agent profile. Existing capabilities are kept.
    ///
    /// For a known agent the stored `current_wip` wins over the caller's value
    /// (clamped to the new limit); WIP only moves through claims and releases.
    pub fn register_agent(&self, profile: AgentProfile) {
        let mut profile = profile.normalized();
        let mut st = self.state.write();
        if let Some(existing) = st.agents.get(&profile.id) {
            profile.current_wip = existing.current_wip.min(profile.wip_limit);
        }
        info!(
            agent_id = %profile.id,
            wip_limit = profile.wip_limit,
            current_wip = profile.current_wip,
            "Registered agent"
        );
        st.capabilities.entry(profile.id.clone()).or_default();
        st.agents.insert(profile.id.clone(), profile);
    }

    /// Upsert a capability for its agent and index it by skill.
    pub fn add_capability(&self, capability: Capability) -> Result<()> {
        let capability = capability.normalized();
        let mut st = self.state.write();
        if !st.agents.contains_key(&capability.agent_id) {
            return Err(DispatchError::agent_not_found(&capability.agent_id));
        }

        st.skill_index
            .entry(capability.skill_id.clone())
            .or_default()
            .insert(capability.agent_id.clone(), capability.proficiency);

        let caps = st
            .capabilities
            .entry(capability.agent_id.clone())
            .or_default();
        debug!(
            agent_id = %capability.agent_id,
            skill = %capability.skill_id,
            proficiency = capability.proficiency,
            "Indexed capability"
        );
        match caps.iter_mut().find(|c| c.skill_id == capability.skill_id) {
            Some(existing) => *existing = capability,
            None => caps.push(capability),
        }
        Ok(())
    }

    pub fn get_agent(&self, id: &AgentId) -> Option<AgentProfile> {
        self.state.read().agents.get(id).cloned()
    }

    pub fn get_capabilities(&self, id: &AgentId) -> Vec<Capability> {
        self.state
            .read()
            .capabilities
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Agents holding exactly `skill_id` at or above `min_proficiency`, ordered by id.
    pub fn get_agents_with_skill(&self, skill_id: &str, min_proficiency: u8) -> Vec<AgentId> {
        self.view()
            .agents_with_skill(skill_id, min_proficiency)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    pub fn update_status(&self, id: &AgentId, status: AgentStatus) -> Result<()> {
        let mut st = self.state.write();
        let agent = st
            .agents
            .get_mut(id)
            .ok_or_else(|| DispatchError::agent_not_found(id))?;
        if agent.status != status {
            debug!(agent_id = %id, from = %agent.status, to = %status, "Agent status changed");
        }
        agent.status = status;
        Ok(())
    }

    /// Claim one unit of capacity. Fails with `WipLimitExceeded` at the limit.
    pub fn increment_wip(&self, id: &AgentId) -> Result<u32> {
        let mut st = self.state.write();
        let agent = st
            .agents
            .get_mut(id)
            .ok_or_else(|| DispatchError::agent_not_found(id))?;
        if !agent.has_capacity() {
            return Err(DispatchError::WipLimitExceeded {
                agent_id: id.clone(),
                limit: agent.wip_limit,
            });
        }
        agent.current_wip += 1;
        agent.last_active = Utc::now();
        Ok(agent.current_wip)
    }

    /// Release one unit of capacity; floors at zero.
    pub fn decrement_wip(&self, id: &AgentId) -> Result<u32> {
        let mut st = self.state.write();
        let agent = st
            .agents
            .get_mut(id)
            .ok_or_else(|| DispatchError::agent_not_found(id))?;
        agent.current_wip = agent.current_wip.saturating_sub(1);
        agent.last_active = Utc::now();
        Ok(agent.current_wip)
    }

    /// Consistent read snapshot; holds the read lock until dropped.
    pub fn view(&self) -> RegistryView<'_> {
        RegistryView {
            state: self.state.read(),
        }
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<_> = self.state.read().agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn skills(&self) -> Vec<String> {
        let mut skills: Vec<_> = self.state.read().skill_index.keys().cloned().collect();
        skills.sort();
        skills
    }

    pub fn len(&self) -> usize {
        self.state.read().agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read guard over the registry used for a single matching pass.
pub struct RegistryView<'a> {
    state: RwLockReadGuard<'a, RegistryState>,
}

impl RegistryView<'_> {
    pub fn agent(&self, id: &AgentId) -> Option<&AgentProfile> {
        self.state.agents.get(id)
    }

    pub fn capabilities(&self, id: &AgentId) -> &[Capability] {
        self.state
            .capabilities
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Index lookup for one exact skill path. Cost is O(agents holding the skill).
    pub fn agents_with_skill(&self, skill_id: &str, min_proficiency: u8) -> Vec<(AgentId, u8)> {
        self.state
            .skill_index
            .get(skill_id)
            .map(|agents| {
                agents
                    .iter()
                    .filter(|(_, p)| **p >= min_proficiency)
                    .map(|(id, &p)| (id.clone(), p))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn best_proficiency(&self, agent_id: &AgentId, skill_id: &str) -> Option<u8> {
        self.state
            .skill_index
            .get(skill_id)
            .and_then(|agents| agents.get(agent_id).copied())
    }
}
