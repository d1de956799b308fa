//! ossim - Deterministic step-driven simulator for CPU scheduling and
//! flag/turn mutual exclusion.
//!
//! # Architecture
//!
//! - **Scheduler engine**: FCFS, SJF and SRTF over jobs with arrival and
//!   burst times, producing per-job completion/turnaround/waiting metrics
//! - **Mutex engine**: participants stepped by a single-threaded driver,
//!   sharing intent flags and a turn variable through a drawer whose writes
//!   become visible at the next tick
//! - **Explorer**: exhaustive and seeded-random interleaving search for
//!   mutual-exclusion violations
//!
//! # Usage
//!
//! ```rust,no_run
//! use ossim::*;
//!
//! let mut engine = SchedulerEngine::with_policy(Policy::Srtf);
//! engine.add_job("P1", 0.0, 3.0)?;
//! engine.add_job("P2", 2.0, 6.0)?;
//! engine.add_job("P3", 4.0, 1.0)?;
//! engine.run_to_completion();
//! if let Some(report) = engine.report() {
//!     println!("{report}");
//! }
//!
//! let scenario = MutexScenario::builder().participants(3).build()?;
//! let result = explore::exhaustive(&MutexSim::new(&scenario)?, 8);
//! if let Some(cx) = result.violation {
//!     println!("{cx}");
//! }
//! # Ok::<(), SimError>(())
//! ```

pub mod drawer;
pub mod engine;
pub mod error;
pub mod explore;
pub mod fmt;
pub mod job;
pub mod monitor;
pub mod mutex;
pub mod participant;
pub mod policy;
pub mod protocol;
pub mod scenario;
pub mod stats;
pub mod trace;
pub mod types;
pub mod workload;

// Re-export the main public types for convenience.
pub use drawer::{DrawerSnapshot, DrawerWrite, SharedDrawerState};
pub use engine::{EngineConfig, SchedStep, SchedulerEngine, DEFAULT_SRTF_QUANTUM};
pub use error::{Result, SimError};
pub use explore::{exhaustive, random_walk, sweep, Counterexample, Exploration, SweepResult};
pub use fmt::{set_sim_clock, sim_clock, FmtTime, SimClock, SimFormat};
pub use job::{Job, JobMetrics, JobSpec};
pub use monitor::{ExclusionMonitor, Monitor, ProbeContext, Violation};
pub use mutex::{MutexSim, ParticipantReport, StarvationReport, TickReport};
pub use participant::{Behavior, Participant, ParticipantStats, Phase, StepOutcome};
pub use policy::{select_next, Policy};
pub use protocol::Protocol;
pub use scenario::{parse_seed, seed_from_env, MutexScenario, MutexScenarioBuilder, DEFAULT_SEED};
pub use stats::{compute_averages, Averages, DistributionStats, Report, ReportLine, SchedStats};
pub use trace::{MutexEvent, MutexEventKind, MutexTrace, Trace, TraceEvent, TraceKind};
pub use types::{JobId, ParticipantId, Tick, Time, TIME_EPSILON};
pub use workload::{parse_job_arg, MutexScenarioFile, SchedWorkload, WorkloadError};
