//! Job model for the scheduler engine.
//!
//! A job is created by `add_job`, mutated only by the engine's tick, and
//! becomes terminal once its metrics are stamped.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::{JobId, Time, TIME_EPSILON};

/// Definition of a job for workload creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: String,
    pub arrival: Time,
    pub burst: Time,
}

impl JobSpec {
    pub fn new(id: impl Into<String>, arrival: Time, burst: Time) -> Self {
        JobSpec {
            id: id.into(),
            arrival,
            burst,
        }
    }

    /// Reject specs the engine cannot schedule. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(SimError::InvalidInput("job id must not be empty".into()));
        }
        if !self.burst.is_finite() || self.burst <= 0.0 {
            return Err(SimError::InvalidInput(format!(
                "job {}: burst time must be positive, got {}",
                self.id, self.burst
            )));
        }
        if !self.arrival.is_finite() || self.arrival < 0.0 {
            return Err(SimError::InvalidInput(format!(
                "job {}: arrival time must be non-negative, got {}",
                self.id, self.arrival
            )));
        }
        Ok(())
    }
}

/// Metrics stamped exactly once, when a job finishes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JobMetrics {
    pub completion: Time,
    /// `completion - arrival`.
    pub turnaround: Time,
    /// `turnaround - burst`.
    pub waiting: Time,
    /// First dispatch minus arrival.
    pub response: Time,
}

/// A job tracked by the engine.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    handle: JobId,
    name: String,
    arrival: Time,
    burst: Time,
    remaining: Time,
    first_run: Option<Time>,
    metrics: Option<JobMetrics>,
}

impl Job {
    pub(crate) fn new(handle: JobId, spec: JobSpec) -> Self {
        Job {
            handle,
            name: spec.id,
            arrival: spec.arrival,
            burst: spec.burst,
            remaining: spec.burst,
            first_run: None,
            metrics: None,
        }
    }

    pub fn handle(&self) -> JobId {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arrival(&self) -> Time {
        self.arrival
    }

    /// Original service demand. Never changes.
    pub fn burst(&self) -> Time {
        self.burst
    }

    /// Service still owed. Equal to `burst` until the job first runs.
    pub fn remaining(&self) -> Time {
        self.remaining
    }

    /// Service received so far.
    pub fn executed(&self) -> Time {
        self.burst - self.remaining
    }

    pub fn first_run(&self) -> Option<Time> {
        self.first_run
    }

    pub fn metrics(&self) -> Option<&JobMetrics> {
        self.metrics.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.metrics.is_some()
    }

    pub(crate) fn has_arrived(&self, now: Time) -> bool {
        self.arrival <= now
    }

    /// Consume up to `amount` of service. Returns the amount actually run.
    ///
    /// A remainder within [`TIME_EPSILON`] of `amount` (scaled by the burst)
    /// is consumed too, so `remaining` lands on exactly zero instead of a
    /// residue left by repeated fractional slices.
    pub(crate) fn run_for(&mut self, now: Time, amount: Time) -> Time {
        debug_assert!(!self.is_complete(), "job {} already complete", self.name);
        self.first_run.get_or_insert(now);
        if self.remaining - amount <= TIME_EPSILON * self.burst.max(1.0) {
            let ran = self.remaining;
            self.remaining = 0.0;
            ran
        } else {
            self.remaining -= amount;
            amount
        }
    }

    pub(crate) fn finish(&mut self, completion: Time) {
        debug_assert!(self.metrics.is_none(), "job {} finished twice", self.name);
        debug_assert_eq!(self.remaining, 0.0, "job {} finished early", self.name);
        let turnaround = completion - self.arrival;
        let waiting = turnaround - self.burst;
        let response = self.first_run.unwrap_or(completion) - self.arrival;
        debug_assert!(
            turnaround >= 0.0 && waiting >= -1e-9,
            "job {} has negative turnaround/waiting ({turnaround}/{waiting})",
            self.name
        );
        self.metrics = Some(JobMetrics {
            completion,
            turnaround,
            waiting,
            response,
        });
    }

    /// Restore the job to its never-run state.
    pub(crate) fn rewind(&mut self) {
        self.remaining = self.burst;
        self.first_run = None;
        self.metrics = None;
    }
}
