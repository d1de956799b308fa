//! Trace event recording for both engines.
//!
//! Every scheduling action (dispatch, run slice, preemption, completion,
//! idle gap) and every protocol transition (request, entry, release,
//! exclusion violation) is recorded with its simulated timestamp.

use std::collections::VecDeque;

use serde::Serialize;

use crate::fmt::FmtTime;
use crate::types::{JobId, ParticipantId, Tick, Time};

/// A single scheduler trace event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    /// Simulated time at which the event occurred.
    pub time: Time,
    pub kind: TraceKind,
}

/// The type of scheduling event recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TraceKind {
    /// A job was added to the active set.
    Added { job: JobId },
    /// The CPU sat idle until `until` waiting for the next arrival.
    Idle { until: Time },
    /// A job was given the CPU.
    Dispatched { job: JobId },
    /// A job consumed CPU time from `time` until `until`.
    Ran { job: JobId, until: Time },
    /// A running job was displaced by a strictly shorter one.
    Preempted { job: JobId, remaining: Time },
    /// A job finished and moved to the completed list.
    Completed { job: JobId },
}

/// A complete scheduler trace in chronological order.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    events: Vec<TraceEvent>,
    names: Vec<(JobId, String)>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, job: JobId, name: &str) {
        self.names.push((job, name.to_string()));
    }

    pub(crate) fn record(&mut self, time: Time, kind: TraceKind) {
        self.events.push(TraceEvent { time, kind });
    }

    /// Drop everything but the `Added` records of the jobs still defined.
    pub(crate) fn clear_run(&mut self) {
        self.events.retain(|e| matches!(e.kind, TraceKind::Added { .. }));
    }

    pub(crate) fn forget_jobs(&mut self) {
        self.events.clear();
        self.names.clear();
    }

    /// Resolve a handle to the job name, or `"???"` if unknown.
    pub fn job_name(&self, job: JobId) -> &str {
        self.names
            .iter()
            .find(|(j, _)| *j == job)
            .map(|(_, n)| n.as_str())
            .unwrap_or("???")
    }

    /// Get all events in chronological order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Total CPU time a job received, summed over its `Ran` slices.
    pub fn total_runtime(&self, job: JobId) -> Time {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::Ran { job: j, until } if j == job => Some(until - e.time),
                _ => None,
            })
            .sum()
    }

    /// The `(start, end)` of every slice a job ran, in order.
    pub fn run_slices(&self, job: JobId) -> Vec<(Time, Time)> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::Ran { job: j, until } if j == job => Some((e.time, until)),
                _ => None,
            })
            .collect()
    }

    /// Count the number of times a job was dispatched.
    pub fn dispatch_count(&self, job: JobId) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Dispatched { job: j } if j == job))
            .count()
    }

    /// Count the number of times a job was preempted.
    pub fn preempt_count(&self, job: JobId) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Preempted { job: j, .. } if j == job))
            .count()
    }

    /// Job handles in the order they completed.
    pub fn completion_order(&self) -> Vec<JobId> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::Completed { job } => Some(job),
                _ => None,
            })
            .collect()
    }

    /// Total time the CPU spent idle waiting for arrivals.
    pub fn idle_time(&self) -> Time {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::Idle { until } => Some(until - e.time),
                _ => None,
            })
            .sum()
    }

    /// Pretty-print the trace for debugging.
    pub fn dump(&self) {
        for event in &self.events {
            let desc = match &event.kind {
                TraceKind::Added { job } => format!("ADD      {}", self.job_name(*job)),
                TraceKind::Idle { until } => format!("IDLE     until={}", FmtTime(*until)),
                TraceKind::Dispatched { job } => format!("DISPATCH {}", self.job_name(*job)),
                TraceKind::Ran { job, until } => {
                    format!("RUN      {} until={}", self.job_name(*job), FmtTime(*until))
                }
                TraceKind::Preempted { job, remaining } => format!(
                    "PREEMPT  {} remaining={}",
                    self.job_name(*job),
                    FmtTime(*remaining)
                ),
                TraceKind::Completed { job } => format!("COMPLETE {}", self.job_name(*job)),
            };
            eprintln!("[t={:>8}] {}", FmtTime(event.time), desc);
        }
    }
}

/// A single mutual-exclusion trace event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutexEvent {
    pub tick: Tick,
    pub kind: MutexEventKind,
}

/// The type of protocol event recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MutexEventKind {
    /// The participant raised its flag and wrote `turn`.
    Requested { who: ParticipantId, turn: usize },
    /// The guard cleared and the participant entered the critical section.
    Entered { who: ParticipantId },
    /// The participant lowered its flag on leaving the critical section.
    Released { who: ParticipantId },
    /// The participant's cycle budget ran out.
    Finished { who: ParticipantId },
    /// More than one participant occupied the critical section.
    Violation { inside: Vec<ParticipantId> },
}

/// Mutual-exclusion trace in tick order.
///
/// Cyclic tellers without a cycle budget never stop, so the trace can be
/// capped: once `limit` events are held, the oldest is dropped for each new
/// one. The counting helpers only see retained events.
#[derive(Debug, Clone, Default)]
pub struct MutexTrace {
    events: VecDeque<MutexEvent>,
    limit: Option<usize>,
    dropped: u64,
}

impl MutexTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trace keeping at most `limit` events. `Some(0)` records nothing.
    pub fn with_limit(limit: Option<usize>) -> Self {
        MutexTrace {
            limit,
            ..Self::default()
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub(crate) fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        if let Some(max) = limit {
            while self.events.len() > max {
                self.events.pop_front();
                self.dropped += 1;
            }
        }
    }

    pub(crate) fn record(&mut self, tick: Tick, kind: MutexEventKind) {
        if let Some(max) = self.limit {
            if max == 0 {
                self.dropped += 1;
                return;
            }
            if self.events.len() >= max {
                self.events.pop_front();
                self.dropped += 1;
            }
        }
        self.events.push_back(MutexEvent { tick, kind });
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.dropped = 0;
    }

    pub fn events(&self) -> impl Iterator<Item = &MutexEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events discarded because of the limit.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Count the number of times a participant entered the critical section.
    pub fn entry_count(&self, who: ParticipantId) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, MutexEventKind::Entered { who: w } if w == who))
            .count()
    }

    /// Participants in the order they entered the critical section.
    pub fn entry_order(&self) -> Vec<ParticipantId> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                MutexEventKind::Entered { who } => Some(who),
                _ => None,
            })
            .collect()
    }

    pub fn violation_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, MutexEventKind::Violation { .. }))
            .count()
    }

    /// Pretty-print the trace for debugging.
    pub fn dump(&self) {
        if self.dropped > 0 {
            eprintln!("({} earlier events dropped)", self.dropped);
        }
        for event in &self.events {
            let desc = match &event.kind {
                MutexEventKind::Requested { who, turn } => format!("REQUEST  {who} turn={turn}"),
                MutexEventKind::Entered { who } => format!("ENTER    {who}"),
                MutexEventKind::Released { who } => format!("RELEASE  {who}"),
                MutexEventKind::Finished { who } => format!("FINISH   {who}"),
                MutexEventKind::Violation { inside } => {
                    let ids: Vec<String> = inside.iter().map(|p| p.to_string()).collect();
                    format!("VIOLATION inside=[{}]", ids.join(","))
                }
            };
            eprintln!("[tick={:>6}] {}", event.tick, desc);
        }
    }
}
