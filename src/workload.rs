//! JSON workload files and command-line job arguments.
//!
//! Scheduler workload:
//!
//! ```json
//! {
//!   "policy": "srtf",
//!   "jobs": [
//!     { "id": "P1", "arrival": 0, "burst": 3 },
//!     { "id": "P2", "arrival": 2, "burst": 6 }
//!   ],
//!   "with_results_display": true,
//!   "with_reset": true
//! }
//! ```
//!
//! Mutex scenario:
//!
//! ```json
//! { "participants": 3, "critical_steps": 2, "rest_steps": 2, "cycles": 5 }
//! ```
//!
//! Omitted fields take the engine defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineConfig, SchedulerEngine, DEFAULT_SRTF_QUANTUM};
use crate::error::SimError;
use crate::job::JobSpec;
use crate::participant::Behavior;
use crate::policy::Policy;
use crate::scenario::MutexScenario;
use crate::types::ParticipantId;

/// Errors from parsing a workload file or job argument.
#[derive(Debug)]
pub enum WorkloadError {
    /// JSON parse error.
    Json(serde_json::Error),
    /// A value could not be parsed.
    InvalidValue(String),
    /// The workload parsed but the engine rejected it.
    Invalid(SimError),
}

impl fmt::Display for WorkloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadError::Json(e) => write!(f, "JSON parse error: {e}"),
            WorkloadError::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
            WorkloadError::Invalid(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WorkloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkloadError::Json(e) => Some(e),
            WorkloadError::Invalid(e) => Some(e),
            WorkloadError::InvalidValue(_) => None,
        }
    }
}

impl From<serde_json::Error> for WorkloadError {
    fn from(e: serde_json::Error) -> Self {
        WorkloadError::Json(e)
    }
}

impl From<SimError> for WorkloadError {
    fn from(e: SimError) -> Self {
        WorkloadError::Invalid(e)
    }
}

fn default_true() -> bool {
    true
}

/// A scheduler workload file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedWorkload {
    #[serde(default)]
    pub policy: Policy,
    pub jobs: Vec<JobSpec>,
    #[serde(default = "default_true")]
    pub with_results_display: bool,
    #[serde(default = "default_true")]
    pub with_reset: bool,
    #[serde(default)]
    pub srtf_quantum: Option<f64>,
}

impl SchedWorkload {
    pub fn from_json(json: &str) -> Result<Self, WorkloadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            policy: self.policy,
            with_results_display: self.with_results_display,
            with_reset: self.with_reset,
            srtf_quantum: self.srtf_quantum.unwrap_or(DEFAULT_SRTF_QUANTUM),
        }
    }

    /// Build an engine holding every job, or fail without partial state.
    pub fn into_engine(self) -> Result<SchedulerEngine, WorkloadError> {
        let mut engine = SchedulerEngine::new(self.config())?;
        engine.add_all(self.jobs)?;
        Ok(engine)
    }
}

/// A mutex scenario file. Every participant shares one cyclic behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MutexScenarioFile {
    #[serde(default = "MutexScenarioFile::default_participants")]
    pub participants: usize,
    #[serde(default = "MutexScenarioFile::default_steps")]
    pub critical_steps: u32,
    #[serde(default = "MutexScenarioFile::default_steps")]
    pub rest_steps: u32,
    #[serde(default)]
    pub cycles: Option<u32>,
    /// Participants driven by explicit request/release calls.
    #[serde(default)]
    pub manual: Vec<usize>,
    #[serde(default)]
    pub seed: Option<u32>,
}

impl MutexScenarioFile {
    fn default_participants() -> usize {
        2
    }

    fn default_steps() -> u32 {
        2
    }

    pub fn from_json(json: &str) -> Result<Self, WorkloadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_scenario(self) -> Result<MutexScenario, WorkloadError> {
        let mut builder = MutexScenario::builder()
            .participants(self.participants)
            .default_behavior(Behavior::Cyclic {
                critical_steps: self.critical_steps,
                rest_steps: self.rest_steps,
                cycles: self.cycles,
            });
        for id in self.manual {
            builder = builder.behavior(ParticipantId(id), Behavior::Manual);
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        Ok(builder.build()?)
    }
}

/// Parse a `ID:ARRIVAL:BURST` job argument, e.g. `P1:0:3`.
pub fn parse_job_arg(s: &str) -> Result<JobSpec, WorkloadError> {
    let mut parts = s.rsplitn(3, ':');
    let (Some(burst), Some(arrival), Some(id)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(WorkloadError::InvalidValue(format!(
            "job {s:?}: expected ID:ARRIVAL:BURST"
        )));
    };
    let num = |what: &str, v: &str| {
        v.trim().parse::<f64>().map_err(|_| {
            WorkloadError::InvalidValue(format!("job {s:?}: {what} {v:?} is not a number"))
        })
    };
    let spec = JobSpec::new(id.trim(), num("arrival", arrival)?, num("burst", burst)?);
    spec.validate()?;
    Ok(spec)
}
