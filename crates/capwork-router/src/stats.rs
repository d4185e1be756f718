use serde::{Deserialize, Serialize};

/// Point-in-time counters for one router instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    pub assigned_total: u64,
    pub queued_total: u64,
    pub completed_total: u64,
    pub failed_total: u64,
    pub timed_out_total: u64,
    pub reassigned_total: u64,
    pub live_assignments: usize,
    pub queue_depth: usize,
    pub backpressure_active: bool,
}
