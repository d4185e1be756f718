use prometheus::{IntCounter, IntGauge, Registry};

/// Per-router Prometheus instruments. Nothing is registered globally; hand
/// a registry to [`RouterMetrics::register`] to expose them.
#[derive(Clone)]
pub struct RouterMetrics {
    pub assignments_total: IntCounter,
    pub queued_total: IntCounter,
    pub completions_total: IntCounter,
    pub failures_total: IntCounter,
    pub reassignments_total: IntCounter,
    pub queue_depth: IntGauge,
    pub live_assignments: IntGauge,
    pub backpressure_active: IntGauge,
}

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::new(name, help).expect("metric names are static and valid")
}

fn gauge(name: &str, help: &str) -> IntGauge {
    IntGauge::new(name, help).expect("metric names are static and valid")
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self {
            assignments_total: counter("capwork_assignments_total", "Tasks assigned to an agent"),
            queued_total: counter("capwork_queued_total", "Tasks parked in a capability queue"),
            completions_total: counter("capwork_completions_total", "Tasks completed"),
            failures_total: counter("capwork_failures_total", "Tasks failed or timed out"),
            reassignments_total: counter("capwork_reassignments_total", "Reassignment requests"),
            queue_depth: gauge("capwork_queue_depth", "Tasks waiting across all queues"),
            live_assignments: gauge("capwork_live_assignments", "Outstanding assignments"),
            backpressure_active: gauge("capwork_backpressure_active", "1 when backpressure is signalled"),
        }
    }

    pub fn register(&self, reg: &Registry) -> prometheus::Result<()> {
        reg.register(Box::new(self.assignments_total.clone()))?;
        reg.register(Box::new(self.queued_total.clone()))?;
        reg.register(Box::new(self.completions_total.clone()))?;
        reg.register(Box::new(self.failures_total.clone()))?;
        reg.register(Box::new(self.reassignments_total.clone()))?;
        reg.register(Box::new(self.queue_depth.clone()))?;
        reg.register(Box::new(self.live_assignments.clone()))?;
        reg.register(Box::new(self.backpressure_active.clone()))?;
        Ok(())
    }
}

impl Default for RouterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RouterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterMetrics")
            .field("assignments_total", &self.assignments_total.get())
            .field("queue_depth", &self.queue_depth.get())
            .field("backpressure_active", &self.backpressure_active.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_routers_can_register_into_separate_registries() {
        let a = RouterMetrics::new();
        let b = RouterMetrics::new();
        a.register(&Registry::new()).unwrap();
        b.register(&Registry::new()).unwrap();
    }

    #[test]
    fn names_do_not_clash_with_queue_facade_metrics() {
        let reg = Registry::new();
        RouterMetrics::new().register(&reg).unwrap();
        let text = prometheus::TextEncoder::new()
            .encode_to_string(&reg.gather())
            .unwrap();

        assert!(text.contains("# TYPE capwork_queue_depth gauge"));
        assert!(!text.contains(capwork_queue::QUEUE_WAITING_GAUGE));
        assert!(!text.contains(capwork_queue::QUEUE_ENQUEUED_COUNTER));
    }

    #[test]
    fn double_registration_is_an_error() {
        let m = RouterMetrics::new();
        let reg = Registry::new();
        m.register(&reg).unwrap();
        assert!(m.register(&reg).is_err());
    }
}
