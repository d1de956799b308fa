//! Step-driven scheduling engine.
//!
//! The engine owns the simulated clock, the active set (in add order) and
//! the completed list (in completion order). Each [`SchedulerEngine::tick`]
//! is one decision point: pick a job with [`select_next`], run it for one
//! quantum, and retire it if its remaining time reached zero.

use tracing::{debug, info};

use crate::error::{Result, SimError};
use crate::fmt::{set_sim_clock, SimClock};
use crate::job::{Job, JobSpec};
use crate::policy::{select_next, Policy};
use crate::stats::{compute_averages, Averages, Report, SchedStats};
use crate::trace::{Trace, TraceKind};
use crate::types::{JobId, Time, TIME_EPSILON};

/// Default SRTF quantum: one time unit between preemption checks.
pub const DEFAULT_SRTF_QUANTUM: Time = 1.0;

/// Optional capabilities and policy of a [`SchedulerEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub policy: Policy,
    /// Produce a results [`Report`] after a run.
    pub with_results_display: bool,
    /// Allow [`SchedulerEngine::reset`] to drop every job.
    pub with_reset: bool,
    /// Longest SRTF run between preemption checks. Ignored by FCFS/SJF.
    pub srtf_quantum: Time,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            policy: Policy::Fcfs,
            with_results_display: true,
            with_reset: true,
            srtf_quantum: DEFAULT_SRTF_QUANTUM,
        }
    }
}

impl EngineConfig {
    pub fn with_policy(policy: Policy) -> Self {
        EngineConfig {
            policy,
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.srtf_quantum.is_finite() || self.srtf_quantum <= 0.0 {
            return Err(SimError::InvalidInput(format!(
                "srtf quantum must be positive, got {}",
                self.srtf_quantum
            )));
        }
        Ok(())
    }
}

/// What one call to [`SchedulerEngine::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedStep {
    /// No eligible job; the clock jumped to the next arrival.
    Idle { from: Time, to: Time },
    /// A job ran from `from` to `to`.
    Ran {
        job: JobId,
        from: Time,
        to: Time,
        completed: bool,
    },
    /// The active set is empty.
    Done,
}

/// The scheduler engine.
#[derive(Debug, Clone)]
pub struct SchedulerEngine {
    config: EngineConfig,
    now: Time,
    active: Vec<Job>,
    completed: Vec<Job>,
    /// Job that held the CPU at the end of the previous tick (SRTF only).
    running: Option<JobId>,
    next_handle: usize,
    trace: Trace,
}

impl SchedulerEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    /// Engine with default capabilities running `policy`.
    pub fn with_policy(policy: Policy) -> Self {
        // DEFAULT_SRTF_QUANTUM always validates.
        Self::from_valid(EngineConfig::with_policy(policy))
    }

    fn from_valid(config: EngineConfig) -> Self {
        SchedulerEngine {
            config,
            now: 0.0,
            active: Vec::new(),
            completed: Vec::new(),
            running: None,
            next_handle: 0,
            trace: Trace::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn policy(&self) -> Policy {
        self.config.policy
    }

    pub fn now(&self) -> Time {
        self.now
    }

    /// Add a job to the active set.
    ///
    /// Fails with [`SimError::InvalidInput`] for a non-positive burst, a
    /// negative arrival, or an id already used in this run.
    pub fn add_job(&mut self, id: impl Into<String>, arrival: Time, burst: Time) -> Result<JobId> {
        self.add_spec(JobSpec::new(id, arrival, burst))
    }

    /// Add a job that arrives at the engine's current time.
    pub fn add_job_now(&mut self, id: impl Into<String>, burst: Time) -> Result<JobId> {
        let now = self.now;
        self.add_job(id, now, burst)
    }

    pub fn add_spec(&mut self, spec: JobSpec) -> Result<JobId> {
        spec.validate()?;
        if self.jobs().any(|j| j.name() == spec.id) {
            return Err(SimError::InvalidInput(format!(
                "duplicate job id {:?}",
                spec.id
            )));
        }

        let handle = JobId(self.next_handle);
        self.next_handle += 1;
        self.trace.register(handle, &spec.id);
        self.trace.record(self.now, TraceKind::Added { job: handle });
        set_sim_clock(SimClock::Time(self.now));
        debug!(
            job = spec.id.as_str(),
            arrival = spec.arrival,
            burst = spec.burst,
            "add job"
        );
        self.active.push(Job::new(handle, spec));
        Ok(handle)
    }

    /// Add every spec, or none of them if any is invalid.
    pub fn add_all(&mut self, specs: impl IntoIterator<Item = JobSpec>) -> Result<Vec<JobId>> {
        let specs: Vec<JobSpec> = specs.into_iter().collect();
        for (i, spec) in specs.iter().enumerate() {
            spec.validate()?;
            let dup_in_batch = specs[..i].iter().any(|s| s.id == spec.id);
            if dup_in_batch || self.jobs().any(|j| j.name() == spec.id) {
                return Err(SimError::InvalidInput(format!(
                    "duplicate job id {:?}",
                    spec.id
                )));
            }
        }
        specs.into_iter().map(|s| self.add_spec(s)).collect()
    }

    fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.active.iter().chain(self.completed.iter())
    }

    /// Look up a job by handle in either set.
    pub fn job(&self, handle: JobId) -> Option<&Job> {
        self.jobs().find(|j| j.handle() == handle)
    }

    /// Unfinished jobs, in add order.
    pub fn active_jobs(&self) -> &[Job] {
        &self.active
    }

    /// Finished jobs, in completion order.
    pub fn completed_jobs(&self) -> &[Job] {
        &self.completed
    }

    pub fn is_done(&self) -> bool {
        self.active.is_empty()
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    fn next_arrival_after(&self, now: Time) -> Option<Time> {
        self.active
            .iter()
            .map(Job::arrival)
            .filter(|&a| a > now)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Land `to` exactly on the next arrival after `from` when it falls
    /// within [`TIME_EPSILON`] of it, keeping the clock on the arrival grid.
    fn snap_to_arrival(&self, from: Time, to: Time) -> Time {
        match self.next_arrival_after(from) {
            Some(next) if (to - next).abs() <= TIME_EPSILON => next,
            _ => to,
        }
    }

    fn idle_until(&mut self, until: Time) -> SchedStep {
        let from = self.now;
        self.trace.record(from, TraceKind::Idle { until });
        self.now = until;
        self.running = None;
        set_sim_clock(SimClock::Time(from));
        debug!(until, "cpu idle");
        SchedStep::Idle { from, to: until }
    }

    /// Advance the simulation by one decision point.
    pub fn tick(&mut self) -> SchedStep {
        if self.active.is_empty() {
            return SchedStep::Done;
        }
        set_sim_clock(SimClock::Time(self.now));

        let chosen = select_next(self.config.policy, &self.active, self.now, self.running)
            .and_then(|h| self.active.iter().position(|j| j.handle() == h));
        let Some(idx) = chosen else {
            // Nothing has arrived yet; wait for the earliest arrival.
            return match self.next_arrival_after(self.now) {
                Some(until) => self.idle_until(until),
                None => SchedStep::Done,
            };
        };
        let handle = self.active[idx].handle();

        let arrival = self.active[idx].arrival();
        if arrival > self.now {
            return self.idle_until(arrival);
        }

        if self.running != Some(handle) {
            if let Some(prev) = self.running {
                if let Some(p) = self.active.iter().find(|j| j.handle() == prev) {
                    let remaining = p.remaining();
                    self.trace
                        .record(self.now, TraceKind::Preempted { job: prev, remaining });
                    debug!(job = p.name(), remaining, "preempt");
                }
            }
            self.trace
                .record(self.now, TraceKind::Dispatched { job: handle });
            debug!(job = self.active[idx].name(), "dispatch");
        }

        let quantum = match self.config.policy {
            Policy::Fcfs | Policy::Sjf => self.active[idx].remaining(),
            Policy::Srtf => {
                let mut q = self.config.srtf_quantum;
                // Stop at the next arrival so a shorter job preempts on time.
                if let Some(next) = self.next_arrival_after(self.now) {
                    q = q.min(next - self.now);
                }
                q
            }
        };

        let from = self.now;
        let ran = self.active[idx].run_for(from, quantum);
        self.now = self.snap_to_arrival(from, from + ran);
        self.trace
            .record(from, TraceKind::Ran { job: handle, until: self.now });

        if self.active[idx].remaining() > 0.0 {
            self.running = Some(handle);
            return SchedStep::Ran {
                job: handle,
                from,
                to: self.now,
                completed: false,
            };
        }

        let mut job = self.active.remove(idx);
        job.finish(self.now);
        self.running = None;
        self.trace
            .record(self.now, TraceKind::Completed { job: handle });
        set_sim_clock(SimClock::Time(self.now));
        if let Some(m) = job.metrics() {
            debug!(
                job = job.name(),
                turnaround = m.turnaround,
                waiting = m.waiting,
                "complete"
            );
        }
        self.completed.push(job);

        SchedStep::Ran {
            job: handle,
            from,
            to: self.now,
            completed: true,
        }
    }

    /// Tick until the active set is empty. Returns the completed jobs.
    pub fn run_to_completion(&mut self) -> &[Job] {
        while self.tick() != SchedStep::Done {}
        info!(
            policy = self.config.policy.name(),
            jobs = self.completed.len() as u64,
            makespan = self.now,
            "run complete"
        );
        &self.completed
    }

    /// Mean waiting/turnaround/response over the completed jobs.
    pub fn averages(&self) -> Result<Averages> {
        compute_averages(&self.completed)
    }

    pub fn stats(&self) -> SchedStats {
        SchedStats::from_jobs(&self.completed)
    }

    /// Results listing, or `None` without the results-display capability.
    pub fn report(&self) -> Option<Report> {
        self.config
            .with_results_display
            .then(|| Report::from_jobs(&self.completed))
    }

    /// Cancel the run: every job returns to the active set un-run and the
    /// clock goes back to zero. Job definitions are kept.
    pub fn abort(&mut self) {
        let mut jobs: Vec<Job> = self.active.drain(..).chain(self.completed.drain(..)).collect();
        jobs.sort_by_key(Job::handle);
        for job in &mut jobs {
            job.rewind();
        }
        self.active = jobs;
        self.now = 0.0;
        self.running = None;
        self.trace.clear_run();
        set_sim_clock(SimClock::Time(0.0));
        debug!("run aborted");
    }

    /// Drop every job and restart the clock.
    ///
    /// Fails with [`SimError::CapabilityDisabled`] unless the engine was
    /// configured `with_reset`.
    pub fn reset(&mut self) -> Result<()> {
        if !self.config.with_reset {
            return Err(SimError::CapabilityDisabled("reset"));
        }
        self.active.clear();
        self.completed.clear();
        self.now = 0.0;
        self.running = None;
        self.next_handle = 0;
        self.trace.forget_jobs();
        set_sim_clock(SimClock::Time(0.0));
        debug!("engine reset");
        Ok(())
    }
}
