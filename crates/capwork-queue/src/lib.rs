use capwork_core::{Task, TaskId, TaskStatus};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// `metrics` facade gauge: tasks waiting across all capability queues.
pub const QUEUE_WAITING_GAUGE: &str = "capwork_queue_waiting_tasks";
/// `metrics` facade counter: tasks ever enqueued.
pub const QUEUE_ENQUEUED_COUNTER: &str = "capwork_queue_enqueued_total";

/// Depth of one capability's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    pub capability: String,
    pub depth: usize,
}

/// One FIFO per capability string.
///
/// Insertion order is the only ordering guarantee; task priority is carried
/// but never used to reorder. The queue does no locking of its own: the
/// router owns it inside the same critical section as capacity claims.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queues: HashMap<String, VecDeque<Task>>,
    total: usize,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to `capability`'s queue and mark the task `Queued`.
    pub fn enqueue(&mut self, mut task: Task, capability: &str) {
        task.status = TaskStatus::Queued;
        task.assigned_agent = None;
        info!(task_id = %task.id, capability, "Task queued");

        let queue = self.queues.entry(capability.to_string()).or_default();
        queue.push_back(task);
        self.total += 1;

        counter!(QUEUE_ENQUEUED_COUNTER).increment(1);
        gauge!(QUEUE_WAITING_GAUGE).set(self.total as f64);
    }

    pub fn dequeue(&mut self, capability: &str) -> Option<Task> {
        let queue = self.queues.get_mut(capability)?;
        let task = queue.pop_front()?;
        if queue.is_empty() {
            self.queues.remove(capability);
        }
        self.total -= 1;
        gauge!(QUEUE_WAITING_GAUGE).set(self.total as f64);
        debug!(task_id = %task.id, capability, "Task dequeued");
        Some(task)
    }

    pub fn peek(&self, capability: &str) -> Option<&Task> {
        self.queues.get(capability).and_then(|q| q.front())
    }

    /// Depth for one capability, or the total across all when `None`.
    pub fn size(&self, capability: Option<&str>) -> usize {
        match capability {
            Some(cap) => self.queues.get(cap).map_or(0, VecDeque::len),
            None => self.total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Remove a specific task wherever it sits, keeping the others in order.
    pub fn remove(&mut self, task_id: &TaskId) -> Option<Task> {
        let (capability, idx) = self.queues.iter().find_map(|(cap, q)| {
            q.iter()
                .position(|t| &t.id == task_id)
                .map(|idx| (cap.clone(), idx))
        })?;

        let queue = self.queues.get_mut(&capability)?;
        let task = queue.remove(idx)?;
        if queue.is_empty() {
            self.queues.remove(&capability);
        }
        self.total -= 1;
        gauge!(QUEUE_WAITING_GAUGE).set(self.total as f64);
        debug!(task_id = %task.id, capability = %capability, "Task removed from queue");
        Some(task)
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.queues
            .values()
            .any(|q| q.iter().any(|t| &t.id == task_id))
    }

    /// Capabilities with at least one waiting task, sorted.
    pub fn capabilities(&self) -> Vec<String> {
        let mut caps: Vec<_> = self.queues.keys().cloned().collect();
        caps.sort();
        caps
    }

    pub fn depths(&self) -> Vec<QueueDepth> {
        self.capabilities()
            .into_iter()
            .map(|capability| QueueDepth {
                depth: self.size(Some(&capability)),
                capability,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> Task {
        Task::new(id, "Web:React")
    }

    #[test]
    fn enqueue_marks_task_queued() {
        let mut q = TaskQueue::new();
        q.enqueue(task("t0"), "Web:React");
        assert_eq!(q.peek("Web:React").unwrap().status, TaskStatus::Queued);
        assert_eq!(q.size(Some("Web:React")), 1);
        assert_eq!(q.size(None), 1);
    }

    #[test]
    fn fifo_within_a_capability() {
        let mut q = TaskQueue::new();
        for id in ["t0", "t1", "t2"] {
            q.enqueue(task(id), "Web:React");
        }
        let order: Vec<_> = std::iter::from_fn(|| q.dequeue("Web:React"))
            .map(|t| t.id.0)
            .collect();
        assert_eq!(order, vec!["t0", "t1", "t2"]);
        assert!(q.is_empty());
        assert!(q.dequeue("Web:React").is_none());
    }

    #[test]
    fn peek_does_not_mutate() {
        let mut q = TaskQueue::new();
        q.enqueue(task("t0"), "Go");
        assert_eq!(q.peek("Go").unwrap().id.as_str(), "t0");
        assert_eq!(q.peek("Go").unwrap().id.as_str(), "t0");
        assert_eq!(q.size(None), 1);
        assert!(q.peek("Rust").is_none());
    }

    #[test]
    fn size_sums_across_capabilities() {
        let mut q = TaskQueue::new();
        q.enqueue(task("a"), "Go");
        q.enqueue(task("b"), "Go");
        q.enqueue(task("c"), "Rust");
        assert_eq!(q.size(Some("Go")), 2);
        assert_eq!(q.size(Some("Rust")), 1);
        assert_eq!(q.size(Some("Java")), 0);
        assert_eq!(q.size(None), 3);
        assert_eq!(q.capabilities(), vec!["Go".to_string(), "Rust".to_string()]);
    }

    #[test]
    fn remove_preserves_relative_order() {
        let mut q = TaskQueue::new();
        for id in ["t0", "t1", "t2", "t3"] {
            q.enqueue(task(id), "Go");
        }
        let removed = q.remove(&"t1".into()).unwrap();
        assert_eq!(removed.id.as_str(), "t1");
        assert!(!q.contains(&"t1".into()));
        assert!(q.remove(&"missing".into()).is_none());

        let rest: Vec<_> = std::iter::from_fn(|| q.dequeue("Go"))
            .map(|t| t.id.0)
            .collect();
        assert_eq!(rest, vec!["t0", "t2", "t3"]);
    }

    #[test]
    fn depths_report_each_capability() {
        let mut q = TaskQueue::new();
        q.enqueue(task("a"), "Go");
        q.enqueue(task("b"), "Rust");
        q.enqueue(task("c"), "Rust");
        assert_eq!(
            q.depths(),
            vec![
                QueueDepth {
                    capability: "Go".into(),
                    depth: 1
                },
                QueueDepth {
                    capability: "Rust".into(),
                    depth: 2
                },
            ]
        );
    }
}
