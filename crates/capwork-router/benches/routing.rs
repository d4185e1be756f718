use capwork_core::{AgentProfile, Capability, Task};
use capwork_registry::CapabilityRegistry;
use capwork_router::TaskRouter;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

const SKILLS: [&str; 6] = [
    "Web:React:Hooks",
    "Web:React",
    "Web:Vue",
    "Data:ETL",
    "Data:SQL:Postgres",
    "Ops:K8s",
];

fn populated(agents: usize) -> Arc<CapabilityRegistry> {
    let registry = Arc::new(CapabilityRegistry::new());
    for i in 0..agents {
        let id = format!("agent-{}", i);
        registry.register_agent(
            AgentProfile::new(id.as_str())
                .with_wip_limit(1_000_000)
                .with_quality_score((i % 10) as f64 / 10.0),
        );
        for (k, skill) in SKILLS.iter().enumerate() {
            if (i + k) % 3 != 0 {
                let proficiency = ((i + k) % 5 + 1) as u8;
                registry
                    .add_capability(Capability::new(id.as_str(), *skill, proficiency))
                    .unwrap();
            }
        }
    }
    registry
}

fn bench_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_candidates");
    for &n in &[100usize, 1_000] {
        let router = TaskRouter::with_defaults(populated(n));
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("three_skills", n), &n, |b, _| {
            b.iter(|| {
                let ranked =
                    router.match_candidates(black_box(&["Web:React:Hooks", "Data:ETL", "Ops"]), 3);
                black_box(ranked)
            })
        });
    }
    group.finish();
}

fn bench_assign_complete(c: &mut Criterion) {
    let router = TaskRouter::with_defaults(populated(100));
    let mut i = 0u64;
    c.bench_function("assign_then_complete_100_agents", |b| {
        b.iter(|| {
            let task = Task::new(format!("bench-{}", i), SKILLS[(i % 6) as usize]);
            i += 1;
            if let Ok(_agent) = router.assign_task(task.clone()) {
                router.complete_task(&task.id);
            }
        })
    });
}

criterion_group!(benches, bench_match, bench_assign_complete);
criterion_main!(benches);
