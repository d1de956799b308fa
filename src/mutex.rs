//! Single-threaded driver for a mutual-exclusion scenario.
//!
//! One tick steps a set of participants in ascending id order. Every
//! stepped participant reads the state committed at the end of the previous
//! tick; their writes are committed together when the tick ends, in the
//! order they were made. After the commit, the exclusion monitor checks how
//! many participants are inside the critical section.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::drawer::{DrawerSnapshot, SharedDrawerState};
use crate::error::{Result, SimError};
use crate::fmt::{set_sim_clock, SimClock};
use crate::monitor::{ExclusionMonitor, Monitor, ProbeContext, Violation};
use crate::participant::{
    Participant, ParticipantKey, ParticipantStats, Phase, StepOutcome, Transition,
};
use crate::protocol::Protocol;
use crate::scenario::MutexScenario;
use crate::trace::{MutexEventKind, MutexTrace};
use crate::types::{ParticipantId, Tick};

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// The tick that just ran (1-based).
    pub tick: Tick,
    /// Outcome of each participant stepped, in step order.
    pub outcomes: Vec<(ParticipantId, StepOutcome)>,
    /// Participants inside the critical section after the commit.
    pub in_critical: Vec<ParticipantId>,
    pub violation: Option<Violation>,
}

/// Complete future-relevant state of a run, for memoized exploration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct StateKey {
    drawer: DrawerSnapshot,
    participants: Vec<ParticipantKey>,
}

/// Wait accounting for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantReport {
    pub id: ParticipantId,
    pub phase: Phase,
    pub stats: ParticipantStats,
}

/// Per-participant starvation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StarvationReport {
    pub tick: Tick,
    pub participants: Vec<ParticipantReport>,
}

impl StarvationReport {
    /// Participants currently requesting that have waited at least
    /// `min_wait` suspended steps.
    pub fn starving(&self, min_wait: u64) -> Vec<ParticipantId> {
        self.participants
            .iter()
            .filter(|p| p.phase == Phase::Requesting && p.stats.current_wait >= min_wait)
            .map(|p| p.id)
            .collect()
    }
}

impl fmt::Display for StarvationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "after {} ticks:", self.tick)?;
        for p in &self.participants {
            write!(
                f,
                "\n  {}: entries={} suspended={} longest_wait={} phase={:?}",
                p.id, p.stats.entries, p.stats.suspended_steps, p.stats.longest_wait, p.phase
            )?;
            if p.phase == Phase::Requesting {
                write!(f, " (waiting {})", p.stats.current_wait)?;
            }
        }
        Ok(())
    }
}

/// The mutual-exclusion engine.
#[derive(Debug, Clone)]
pub struct MutexSim {
    protocol: Protocol,
    drawer: SharedDrawerState,
    participants: Vec<Participant>,
    monitor: ExclusionMonitor,
    trace: MutexTrace,
    tick: Tick,
    seed: u32,
}

impl MutexSim {
    pub fn new(scenario: &MutexScenario) -> Result<Self> {
        let n = scenario.participants();
        if n != scenario.protocol.participants() {
            return Err(SimError::InvalidInput(format!(
                "{} protocol needs {} participants, got {n}",
                scenario.protocol,
                scenario.protocol.participants()
            )));
        }
        let participants = scenario
            .behaviors
            .iter()
            .enumerate()
            .map(|(i, b)| Participant::new(ParticipantId(i), *b))
            .collect::<Result<Vec<_>>>()?;
        Ok(MutexSim {
            protocol: scenario.protocol,
            drawer: SharedDrawerState::new(n),
            participants,
            monitor: ExclusionMonitor::new(),
            trace: MutexTrace::new(),
            tick: 0,
            seed: scenario.seed,
        })
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn participant_ids(&self) -> impl Iterator<Item = ParticipantId> {
        (0..self.participants.len()).map(ParticipantId)
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Keep at most `limit` trace events (`None` for all, `Some(0)` for none).
    pub fn set_trace_limit(&mut self, limit: Option<usize>) {
        self.trace.set_limit(limit);
    }

    /// Number of ticks run so far.
    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    fn check_id(&self, id: ParticipantId) -> Result<()> {
        if id.index() >= self.participants.len() {
            return Err(SimError::InvalidInput(format!(
                "no participant {id} (have {})",
                self.participants.len()
            )));
        }
        Ok(())
    }

    /// Step every participant once.
    pub fn tick(&mut self) -> TickReport {
        let ids: Vec<ParticipantId> = self.participant_ids().collect();
        self.step_ids(&ids, None)
    }

    /// Step only `ids` this tick; the others stay frozen. Duplicates are
    /// ignored and the step order is always ascending id.
    pub fn tick_subset(&mut self, ids: &[ParticipantId]) -> Result<TickReport> {
        for &id in ids {
            self.check_id(id)?;
        }
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(self.step_ids(&ids, None))
    }

    /// Like [`tick_subset`](Self::tick_subset), also sampling `monitor`
    /// after the commit.
    pub fn tick_subset_monitored(
        &mut self,
        ids: &[ParticipantId],
        monitor: &mut dyn Monitor,
    ) -> Result<TickReport> {
        for &id in ids {
            self.check_id(id)?;
        }
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(self.step_ids(&ids, Some(monitor)))
    }

    /// `ids` must be valid, sorted and distinct.
    pub(crate) fn step_ids(
        &mut self,
        ids: &[ParticipantId],
        extra: Option<&mut dyn Monitor>,
    ) -> TickReport {
        self.tick += 1;
        set_sim_clock(SimClock::Tick(self.tick));

        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            let p = &mut self.participants[id.index()];
            let (outcome, transition) = p.step(self.protocol, &mut self.drawer);
            outcomes.push((id, outcome));
            let kind = match transition {
                Some(Transition::Requested { turn }) => {
                    debug!(who = %id, turn = turn as u64, "request");
                    MutexEventKind::Requested { who: id, turn }
                }
                Some(Transition::Entered) => {
                    debug!(who = %id, "enter");
                    MutexEventKind::Entered { who: id }
                }
                Some(Transition::Released) => {
                    debug!(who = %id, "release");
                    MutexEventKind::Released { who: id }
                }
                Some(Transition::Finished) => {
                    debug!(who = %id, "finished");
                    MutexEventKind::Finished { who: id }
                }
                None => continue,
            };
            self.trace.record(self.tick, kind);
        }

        self.drawer.commit();

        let phases = self.phases();
        let ctx = ProbeContext {
            tick: self.tick,
            state: self.drawer.view(),
            phases: &phases,
        };
        let violation = self.monitor.check(&ctx);
        if let Some(m) = extra {
            m.sample(&ctx);
        }
        let in_critical = ctx.in_critical();
        if let Some(v) = &violation {
            self.trace.record(
                self.tick,
                MutexEventKind::Violation {
                    inside: v.inside.clone(),
                },
            );
        }

        TickReport {
            tick: self.tick,
            outcomes,
            in_critical,
            violation,
        }
    }

    /// Run `n` full ticks. Returns the number of ticks that ended in a
    /// violation.
    pub fn run_ticks(&mut self, n: u64) -> usize {
        let before = self.monitor.count();
        for _ in 0..n {
            self.tick();
        }
        let violations = self.monitor.count() - before;
        info!(
            ticks = n,
            violations = violations as u64,
            protocol = %self.protocol,
            "mutex run complete"
        );
        violations
    }

    /// Ask a manual participant to enter. The request is written on its next
    /// step; entry happens once the guard clears.
    pub fn request_entry(&mut self, id: ParticipantId) -> Result<()> {
        self.check_id(id)?;
        self.participants[id.index()].request()
    }

    /// Ask a manual participant inside the critical section to leave.
    pub fn release_entry(&mut self, id: ParticipantId) -> Result<()> {
        self.check_id(id)?;
        self.participants[id.index()].release()
    }

    /// Tick until `id` enters the critical section, at most `max_ticks`
    /// times. Returns the entry tick, or `None` if it never got in.
    pub fn run_until_entered(&mut self, id: ParticipantId, max_ticks: u64) -> Result<Option<Tick>> {
        self.check_id(id)?;
        if self.participants[id.index()].phase() == Phase::InCriticalSection {
            return Ok(Some(self.tick));
        }
        for _ in 0..max_ticks {
            self.tick();
            if self.participants[id.index()].phase() == Phase::InCriticalSection {
                return Ok(Some(self.tick));
            }
        }
        Ok(None)
    }

    /// The committed flags and turn.
    pub fn get_state(&self) -> DrawerSnapshot {
        self.drawer.view().clone()
    }

    pub fn phase(&self, id: ParticipantId) -> Result<Phase> {
        self.check_id(id)?;
        Ok(self.participants[id.index()].phase())
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.participants.iter().map(Participant::phase).collect()
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(id.index())
    }

    pub fn in_critical(&self) -> Vec<ParticipantId> {
        self.participants
            .iter()
            .filter(|p| p.phase() == Phase::InCriticalSection)
            .map(Participant::id)
            .collect()
    }

    /// True once every participant has spent its cycle budget.
    pub fn all_finished(&self) -> bool {
        self.participants.iter().all(Participant::is_finished)
    }

    /// Discard the run: shared state, participants, trace and monitor all
    /// go back to their initial values. The scenario is kept.
    pub fn abort(&mut self) {
        self.drawer.reset();
        for p in &mut self.participants {
            p.reset();
        }
        self.monitor.reset();
        self.trace.clear();
        self.tick = 0;
        set_sim_clock(SimClock::Tick(0));
        debug!("mutex run aborted");
    }

    pub fn trace(&self) -> &MutexTrace {
        &self.trace
    }

    pub fn monitor(&self) -> &ExclusionMonitor {
        &self.monitor
    }

    /// Number of ticks so far that ended with more than one participant in
    /// the critical section.
    pub fn violations(&self) -> usize {
        self.monitor.count()
    }

    pub fn starvation_report(&self) -> StarvationReport {
        StarvationReport {
            tick: self.tick,
            participants: self
                .participants
                .iter()
                .map(|p| ParticipantReport {
                    id: p.id(),
                    phase: p.phase(),
                    stats: *p.stats(),
                })
                .collect(),
        }
    }

    pub(crate) fn state_key(&self) -> StateKey {
        StateKey {
            drawer: self.drawer.view().clone(),
            participants: self.participants.iter().map(Participant::key).collect(),
        }
    }
}
