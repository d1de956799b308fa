#![allow(dead_code)]

use ossim::{Job, MutexScenario, MutexSim, Policy, SchedulerEngine, SimFormat, Time};

/// Initialize tracing from `RUST_LOG`.
///
/// `try_init()` is idempotent: first call in the process succeeds,
/// subsequent calls are silently ignored.
pub fn setup_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .event_format(SimFormat)
        .try_init();
}

/// Engine loaded with `(id, arrival, burst)` jobs, in order.
pub fn engine_with(policy: Policy, jobs: &[(&str, Time, Time)]) -> SchedulerEngine {
    let mut engine = SchedulerEngine::with_policy(policy);
    for &(id, arrival, burst) in jobs {
        engine.add_job(id, arrival, burst).unwrap();
    }
    engine
}

/// The classic three-job demo: P1 0/3, P2 2/6, P3 4/1.
pub fn demo_engine(policy: Policy) -> SchedulerEngine {
    engine_with(policy, &[("P1", 0.0, 3.0), ("P2", 2.0, 6.0), ("P3", 4.0, 1.0)])
}

/// `(id, completion)` of every completed job, in completion order.
pub fn completions(jobs: &[Job]) -> Vec<(String, Time)> {
    jobs.iter()
        .map(|j| (j.name().to_string(), j.metrics().unwrap().completion))
        .collect()
}

/// Mutex driver with the default cyclic tellers and a fixed seed.
pub fn mutex_sim(participants: usize) -> MutexSim {
    let scenario = MutexScenario::builder()
        .participants(participants)
        .seed(42)
        .build()
        .unwrap();
    MutexSim::new(&scenario).unwrap()
}
