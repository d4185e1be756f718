use crate::{RouterMetrics, RouterStats};
use capwork_core::{
    AgentId, AgentProfile, AgentStatus, Assignment, Capability, CapworkConfig, DispatchError,
    Result, RoutingConfig, Task, TaskId, TaskStatus,
};
use capwork_matcher::{CapabilityMatcher, MatchCandidate, Scorer, WeightedScorer};
use capwork_queue::TaskQueue;
use capwork_registry::CapabilityRegistry;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Finished tasks kept for [`TaskRouter::get_task`]; older ones are dropped.
pub const FINISHED_HISTORY: usize = 256;

/// Why a placement attempt did not claim an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unplaced {
    NoCandidates,
    Saturated,
}

#[derive(Debug, Default)]
struct Counters {
    assigned: u64,
    queued: u64,
    completed: u64,
    failed: u64,
    timed_out: u64,
    reassigned: u64,
}

/// Everything the claim/release/drain paths mutate, behind one lock.
#[derive(Debug, Default)]
struct RouterState {
    queue: TaskQueue,
    // live tasks only: pending, queued, assigned or in progress
    tasks: HashMap<TaskId, Task>,
    finished: VecDeque<Task>,
    assignments: HashMap<TaskId, Assignment>,
    agent_tasks: HashMap<AgentId, Vec<TaskId>>,
    counters: Counters,
    backpressure: bool,
}

/// Just-in-time dispatcher.
///
/// Matching is a pure read of the registry. Every sequence that reads WIP,
/// compares it to the limit and increments it, and every queue mutation, runs
/// while holding `state`, so concurrent callers can never jointly overshoot
/// an agent's `wip_limit` or drain the same queued task twice.
pub struct TaskRouter<S = WeightedScorer> {
    registry: Arc<CapabilityRegistry>,
    matcher: CapabilityMatcher<S>,
    config: RoutingConfig,
    state: Mutex<RouterState>,
    metrics: RouterMetrics,
}

impl TaskRouter<WeightedScorer> {
    pub fn new(registry: Arc<CapabilityRegistry>, config: &CapworkConfig) -> Self {
        let scorer = WeightedScorer::new(config.scoring.clone());
        Self::with_scorer(registry, config.routing.clone(), scorer)
    }

    pub fn with_defaults(registry: Arc<CapabilityRegistry>) -> Self {
        Self::new(registry, &CapworkConfig::default())
    }
}

impl<S: Scorer> TaskRouter<S> {
    pub fn with_scorer(registry: Arc<CapabilityRegistry>, config: RoutingConfig, scorer: S) -> Self {
        Self {
            matcher: CapabilityMatcher::with_scorer(registry.clone(), scorer),
            registry,
            config,
            state: Mutex::new(RouterState::default()),
            metrics: RouterMetrics::new(),
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn metrics(&self) -> &RouterMetrics {
        &self.metrics
    }

    /// Register or update an agent. A known agent keeps its claimed WIP.
    pub fn register_agent(&self, profile: AgentProfile) {
        let _st = self.state.lock();
        let id = profile.id.clone();
        self.registry.register_agent(profile);
        if let Some(agent) = self.registry.get_agent(&id) {
            self.mark_busy_if_full(&id, agent.current_wip);
        }
    }

    pub fn add_capability(&self, capability: Capability) -> Result<()> {
        self.registry.add_capability(capability)
    }

    pub fn update_agent_status(&self, agent_id: &AgentId, status: AgentStatus) -> Result<()> {
        let _st = self.state.lock();
        self.registry.update_status(agent_id, status)
    }

    /// Place `task` on the best agent with spare capacity, or park it.
    ///
    /// `Err(NoAgentAvailable)` and `Err(TaskQueued)` both mean the task is
    /// safely queued; see [`DispatchError::is_queued`].
    pub fn assign_task(&self, task: Task) -> Result<AgentId> {
        let mut st = self.state.lock();

        if let Some(existing) = st.tasks.get(&task.id) {
            return Err(DispatchError::InvalidOperation(format!(
                "task {} is already {}",
                task.id, existing.status
            )));
        }
        if task.status.is_terminal() {
            return Err(DispatchError::InvalidOperation(format!(
                "task {} is already {}",
                task.id, task.status
            )));
        }

        match self.place(&task, &[]) {
            Ok(agent_id) => {
                self.record_assignment(&mut st, task, agent_id.clone());
                Ok(agent_id)
            }
            Err(reason) => Err(self.park(&mut st, task, reason)),
        }
    }

    /// Release the task's agent and drain its capability queue.
    ///
    /// Unknown or unassigned ids are a no-op and return `None`.
    pub fn complete_task(&self, task_id: &TaskId) -> Option<Assignment> {
        let mut st = self.state.lock();
        self.finish(&mut st, task_id, TaskStatus::Completed)
    }

    /// Like [`complete_task`](Self::complete_task) but records `Failed`.
    pub fn fail_task(&self, task_id: &TaskId) -> Option<Assignment> {
        let mut st = self.state.lock();
        self.finish(&mut st, task_id, TaskStatus::Failed)
    }

    /// Move a live task to a different agent.
    ///
    /// `exclude` defaults to the current agent. With no alternative the task
    /// is queued and `TaskQueued` is returned.
    pub fn reassign_task(&self, task_id: &TaskId, exclude: Option<&AgentId>) -> Result<AgentId> {
        let mut st = self.state.lock();

        let assignment = st
            .assignments
            .get(task_id)
            .cloned()
            .ok_or_else(|| DispatchError::task_not_found(task_id))?;
        let mut task = st
            .tasks
            .remove(task_id)
            .ok_or_else(|| DispatchError::task_not_found(task_id))?;

        self.release(&mut st, &assignment);
        st.counters.reassigned += 1;
        self.metrics.reassignments_total.inc();

        let excluded = exclude.cloned().unwrap_or_else(|| assignment.agent_id.clone());
        info!(
            task_id = %task_id,
            from = %assignment.agent_id,
            excluded = %excluded,
            "Reassigning task"
        );

        task.status = TaskStatus::Pending;
        task.assigned_agent = None;
        let capability = task.required_capability.clone();
        match self.place(&task, std::slice::from_ref(&excluded)) {
            Ok(agent_id) => {
                self.record_assignment(&mut st, task, agent_id.clone());
                self.drain_locked(&mut st, &capability);
                Ok(agent_id)
            }
            Err(_) => {
                // offer the freed slot to waiting work; the moved task keeps its exclusion
                let err = self.park(&mut st, task, Unplaced::Saturated);
                self.drain_with_exclusion(&mut st, &capability, Some((task_id, &excluded)));
                Err(err)
            }
        }
    }

    /// Mark an assigned task as started. Assignment and WIP are unchanged.
    pub fn start_task(&self, task_id: &TaskId) -> Result<()> {
        let mut st = self.state.lock();
        if !st.assignments.contains_key(task_id) {
            return Err(DispatchError::task_not_found(task_id));
        }
        let task = st
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DispatchError::task_not_found(task_id))?;
        task.status = TaskStatus::InProgress;
        debug!(task_id = %task_id, "Task started");
        Ok(())
    }

    /// Watchdog hook: expire an assigned or queued task.
    ///
    /// Returns `false` when the id is unknown or already terminal.
    pub fn timeout_task(&self, task_id: &TaskId) -> bool {
        let mut st = self.state.lock();

        if st.assignments.contains_key(task_id) {
            return self.finish(&mut st, task_id, TaskStatus::Timeout).is_some();
        }

        if st.queue.remove(task_id).is_some() {
            Self::retire(&mut st, task_id, TaskStatus::Timeout);
            st.counters.timed_out += 1;
            self.metrics.failures_total.inc();
            warn!(task_id = %task_id, "Queued task timed out");
            self.refresh_backpressure(&mut st);
            return true;
        }

        false
    }

    /// Withdraw a queued task. Assigned tasks cannot be cancelled here.
    pub fn cancel_task(&self, task_id: &TaskId) -> Result<Task> {
        let mut st = self.state.lock();
        let mut task = st
            .queue
            .remove(task_id)
            .ok_or_else(|| DispatchError::task_not_found(task_id))?;
        st.tasks.remove(task_id);
        task.status = TaskStatus::Pending;
        info!(task_id = %task_id, "Queued task cancelled");
        self.refresh_backpressure(&mut st);
        Ok(task)
    }

    /// Try to place waiting tasks for one capability. Returns how many were placed.
    pub fn drain_queue(&self, capability: &str) -> usize {
        let mut st = self.state.lock();
        self.drain_locked(&mut st, capability)
    }

    /// Drain every non-empty queue, e.g. after agents were added or came back online.
    pub fn drain_all(&self) -> usize {
        let mut st = self.state.lock();
        let capabilities = st.queue.capabilities();
        capabilities
            .iter()
            .map(|cap| self.drain_locked(&mut st, cap))
            .sum()
    }

    /// Active task ids for an agent, oldest assignment first.
    pub fn get_agent_tasks(&self, agent_id: &AgentId) -> Vec<TaskId> {
        self.state
            .lock()
            .agent_tasks
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_queue_depth(&self, capability: Option<&str>) -> usize {
        self.state.lock().queue.size(capability)
    }

    /// Advisory only: work past the threshold is still accepted and queued.
    pub fn is_backpressure_active(&self) -> bool {
        self.state.lock().queue.size(None) >= self.config.backpressure_threshold
    }

    /// Live tasks, plus the last [`FINISHED_HISTORY`] finished ones.
    pub fn get_task(&self, task_id: &TaskId) -> Option<Task> {
        let st = self.state.lock();
        st.tasks
            .get(task_id)
            .or_else(|| st.finished.iter().rev().find(|t| &t.id == task_id))
            .cloned()
    }

    /// Number of tasks currently held in memory, live and finished.
    pub fn tracked_tasks(&self) -> usize {
        let st = self.state.lock();
        st.tasks.len() + st.finished.len()
    }

    pub fn get_assignment(&self, task_id: &TaskId) -> Option<Assignment> {
        self.state.lock().assignments.get(task_id).cloned()
    }

    /// Read-only ranking, identical to what a placement would see right now.
    pub fn match_candidates<T: AsRef<str>>(
        &self,
        required_skills: &[T],
        min_proficiency: u8,
    ) -> Vec<MatchCandidate> {
        self.matcher.match_skills(required_skills, min_proficiency)
    }

    pub fn stats(&self) -> RouterStats {
        let st = self.state.lock();
        let queue_depth = st.queue.size(None);
        RouterStats {
            assigned_total: st.counters.assigned,
            queued_total: st.counters.queued,
            completed_total: st.counters.completed,
            failed_total: st.counters.failed,
            timed_out_total: st.counters.timed_out,
            reassigned_total: st.counters.reassigned,
            live_assignments: st.assignments.len(),
            queue_depth,
            backpressure_active: queue_depth >= self.config.backpressure_threshold,
        }
    }

    // Callers must hold `state`.
    fn place(&self, task: &Task, exclude: &[AgentId]) -> std::result::Result<AgentId, Unplaced> {
        let candidates = self.matcher.match_excluding(
            std::slice::from_ref(&task.required_capability),
            self.config.min_proficiency,
            exclude,
        );
        if candidates.is_empty() {
            return Err(Unplaced::NoCandidates);
        }

        for candidate in candidates.iter().take(self.config.max_candidates) {
            if self.config.skip_offline_agents {
                let offline = self
                    .registry
                    .get_agent(&candidate.agent_id)
                    .map_or(true, |a| a.status == AgentStatus::Offline);
                if offline {
                    debug!(agent_id = %candidate.agent_id, "Skipping offline candidate");
                    continue;
                }
            }

            match self.registry.increment_wip(&candidate.agent_id) {
                Ok(wip) => {
                    self.mark_busy_if_full(&candidate.agent_id, wip);
                    debug!(
                        task_id = %task.id,
                        agent_id = %candidate.agent_id,
                        score = candidate.total_score,
                        wip,
                        "Claimed capacity"
                    );
                    return Ok(candidate.agent_id.clone());
                }
                Err(DispatchError::WipLimitExceeded { agent_id, limit }) => {
                    debug!(agent_id = %agent_id, limit, "Candidate at capacity, trying next");
                }
                Err(e) => {
                    warn!(agent_id = %candidate.agent_id, error = %e, "Candidate claim failed");
                }
            }
        }

        Err(Unplaced::Saturated)
    }

    fn record_assignment(&self, st: &mut RouterState, mut task: Task, agent_id: AgentId) {
        task.status = TaskStatus::Assigned;
        task.assigned_agent = Some(agent_id.clone());

        let assignment = Assignment::new(
            task.id.clone(),
            agent_id.clone(),
            task.required_capability.clone(),
        );
        info!(
            task_id = %task.id,
            agent_id = %agent_id,
            capability = %task.required_capability,
            "Task assigned"
        );

        st.agent_tasks
            .entry(agent_id)
            .or_default()
            .push(task.id.clone());
        st.assignments.insert(task.id.clone(), assignment);
        st.tasks.insert(task.id.clone(), task);
        st.counters.assigned += 1;

        self.metrics.assignments_total.inc();
        self.metrics.live_assignments.set(st.assignments.len() as i64);
    }

    fn park(&self, st: &mut RouterState, task: Task, reason: Unplaced) -> DispatchError {
        let task_id = task.id.clone();
        let capability = task.required_capability.clone();

        let mut tracked = task.clone();
        tracked.status = TaskStatus::Queued;
        tracked.assigned_agent = None;
        st.tasks.insert(task_id.clone(), tracked);
        st.queue.enqueue(task, &capability);
        st.counters.queued += 1;
        self.metrics.queued_total.inc();
        self.refresh_backpressure(st);

        match reason {
            Unplaced::NoCandidates => {
                warn!(task_id = %task_id, capability = %capability, "No agent has this capability");
                DispatchError::NoAgentAvailable {
                    task_id,
                    capability,
                }
            }
            Unplaced::Saturated => {
                debug!(task_id = %task_id, capability = %capability, "All candidates saturated");
                DispatchError::TaskQueued {
                    task_id,
                    capability,
                }
            }
        }
    }

    /// Give back the agent's slot and detach the assignment bookkeeping.
    fn release(&self, st: &mut RouterState, assignment: &Assignment) {
        st.assignments.remove(&assignment.task_id);
        if let Some(ids) = st.agent_tasks.get_mut(&assignment.agent_id) {
            ids.retain(|id| id != &assignment.task_id);
            if ids.is_empty() {
                st.agent_tasks.remove(&assignment.agent_id);
            }
        }

        match self.registry.decrement_wip(&assignment.agent_id) {
            Ok(wip) => self.mark_available_if_free(&assignment.agent_id, wip),
            Err(e) => warn!(agent_id = %assignment.agent_id, error = %e, "Could not release capacity"),
        }
        self.metrics.live_assignments.set(st.assignments.len() as i64);
    }

    fn finish(
        &self,
        st: &mut RouterState,
        task_id: &TaskId,
        outcome: TaskStatus,
    ) -> Option<Assignment> {
        let assignment = st.assignments.get(task_id).cloned()?;
        self.release(st, &assignment);

        Self::retire(st, task_id, outcome);
        match outcome {
            TaskStatus::Completed => {
                st.counters.completed += 1;
                self.metrics.completions_total.inc();
            }
            TaskStatus::Timeout => {
                st.counters.timed_out += 1;
                self.metrics.failures_total.inc();
            }
            _ => {
                st.counters.failed += 1;
                self.metrics.failures_total.inc();
            }
        }
        info!(
            task_id = %task_id,
            agent_id = %assignment.agent_id,
            outcome = %outcome,
            "Task finished"
        );

        self.drain_locked(st, &assignment.capability);
        Some(assignment)
    }

    /// Move a task out of the live set into the bounded finished history.
    fn retire(st: &mut RouterState, task_id: &TaskId, outcome: TaskStatus) {
        let Some(mut task) = st.tasks.remove(task_id) else {
            return;
        };
        task.status = outcome;
        if st.finished.len() == FINISHED_HISTORY {
            st.finished.pop_front();
        }
        st.finished.push_back(task);
    }

    fn drain_locked(&self, st: &mut RouterState, capability: &str) -> usize {
        self.drain_with_exclusion(st, capability, None)
    }

    /// Peek, place, and only then dequeue; stop at the first task that cannot be placed.
    ///
    /// `exclusion` keeps one task away from one agent for this pass.
    fn drain_with_exclusion(
        &self,
        st: &mut RouterState,
        capability: &str,
        exclusion: Option<(&TaskId, &AgentId)>,
    ) -> usize {
        let mut placed = 0;
        while let Some(head) = st.queue.peek(capability).cloned() {
            let exclude: &[AgentId] = match exclusion {
                Some((task_id, agent_id)) if &head.id == task_id => std::slice::from_ref(agent_id),
                _ => &[],
            };
            let agent_id = match self.place(&head, exclude) {
                Ok(agent_id) => agent_id,
                Err(_) => break,
            };
            let task = st.queue.dequeue(capability).unwrap_or(head);
            self.record_assignment(st, task, agent_id);
            placed += 1;
        }

        if placed > 0 {
            info!(capability, placed, "Drained queue");
            self.refresh_backpressure(st);
        }
        placed
    }

    fn refresh_backpressure(&self, st: &mut RouterState) {
        let depth = st.queue.size(None);
        let active = depth >= self.config.backpressure_threshold;
        if active != st.backpressure {
            if active {
                warn!(
                    depth,
                    threshold = self.config.backpressure_threshold,
                    "Backpressure active"
                );
            } else {
                info!(depth, "Backpressure cleared");
            }
            st.backpressure = active;
        }
        self.metrics.queue_depth.set(depth as i64);
        self.metrics.backpressure_active.set(i64::from(active));
    }

    fn mark_busy_if_full(&self, agent_id: &AgentId, wip: u32) {
        if let Some(agent) = self.registry.get_agent(agent_id) {
            if agent.status == AgentStatus::Available && wip >= agent.wip_limit {
                if let Err(e) = self.registry.update_status(agent_id, AgentStatus::Busy) {
                    warn!(agent_id = %agent_id, error = %e, "Could not mark agent busy");
                }
            }
        }
    }

    fn mark_available_if_free(&self, agent_id: &AgentId, wip: u32) {
        if let Some(agent) = self.registry.get_agent(agent_id) {
            if agent.status == AgentStatus::Busy && wip < agent.wip_limit {
                if let Err(e) = self.registry.update_status(agent_id, AgentStatus::Available) {
                    warn!(agent_id = %agent_id, error = %e, "Could not mark agent available");
                }
            }
        }
    }
}
