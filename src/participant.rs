//! Protocol participants as cooperative step functions.
//!
//! A participant never blocks. The driver calls [`Participant::step`] once
//! per tick in which it is scheduled; a participant whose guard still holds
//! reports [`StepOutcome::Suspended`] and tries again on its next step.

use serde::{Deserialize, Serialize};

use crate::drawer::SharedDrawerState;
use crate::error::{Result, SimError};
use crate::protocol::Protocol;
use crate::types::ParticipantId;

/// Externally visible protocol phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Idle,
    Requesting,
    InCriticalSection,
}

/// What a participant does when it is not waiting on the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    /// Loop forever (or `cycles` times): request, hold the critical section
    /// for `critical_steps` steps, release, rest for `rest_steps` steps.
    Cyclic {
        critical_steps: u32,
        rest_steps: u32,
        cycles: Option<u32>,
    },
    /// Act only on explicit `request_entry` / `release_entry` calls.
    Manual,
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior::Cyclic {
            critical_steps: 2,
            rest_steps: 2,
            cycles: None,
        }
    }
}

impl Behavior {
    pub(crate) fn validate(&self) -> Result<()> {
        match *self {
            Behavior::Cyclic { critical_steps: 0, .. } => Err(SimError::InvalidInput(
                "critical_steps must be at least 1".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Result of one participant step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StepOutcome {
    /// Waiting: the guard held, or a manual participant has nothing to do.
    Suspended,
    Progressed,
    /// The cycle budget is spent; the participant will not act again.
    Done,
}

/// Protocol transition taken during a step, for the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Requested { turn: usize },
    Entered,
    Released,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ActorState {
    Idle { rest_left: u32 },
    Requesting,
    Critical { use_left: u32 },
    Finished,
}

/// Per-participant wait accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParticipantStats {
    /// Number of critical-section entries.
    pub entries: u64,
    /// Steps spent suspended on the guard, over the whole run.
    pub suspended_steps: u64,
    /// Suspended steps since the current request, if requesting.
    pub current_wait: u64,
    /// Longest single wait that ended in an entry.
    pub longest_wait: u64,
}

/// State of a participant that determines its future behavior. Two
/// participants with equal keys act identically from here on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ParticipantKey {
    state: ActorState,
    cycles_left: Option<u32>,
    pending_request: bool,
    pending_release: bool,
}

#[derive(Debug, Clone)]
pub struct Participant {
    id: ParticipantId,
    behavior: Behavior,
    state: ActorState,
    cycles_left: Option<u32>,
    pending_request: bool,
    pending_release: bool,
    stats: ParticipantStats,
}

impl Participant {
    pub fn new(id: ParticipantId, behavior: Behavior) -> Result<Self> {
        behavior.validate()?;
        Ok(Self::with_behavior(id, behavior))
    }

    fn with_behavior(id: ParticipantId, behavior: Behavior) -> Self {
        let cycles_left = match behavior {
            Behavior::Cyclic { cycles, .. } => cycles,
            Behavior::Manual => None,
        };
        Participant {
            id,
            behavior,
            state: ActorState::Idle { rest_left: 0 },
            cycles_left,
            pending_request: false,
            pending_release: false,
            stats: ParticipantStats::default(),
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn stats(&self) -> &ParticipantStats {
        &self.stats
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            ActorState::Idle { .. } | ActorState::Finished => Phase::Idle,
            ActorState::Requesting => Phase::Requesting,
            ActorState::Critical { .. } => Phase::InCriticalSection,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == ActorState::Finished
    }

    pub(crate) fn key(&self) -> ParticipantKey {
        ParticipantKey {
            state: self.state,
            cycles_left: self.cycles_left,
            pending_request: self.pending_request,
            pending_release: self.pending_release,
        }
    }

    /// Queue a manual request; it is issued on the next step.
    pub(crate) fn request(&mut self) -> Result<()> {
        if self.behavior != Behavior::Manual {
            return Err(SimError::InvalidState(format!(
                "{} is driven by a cyclic behavior",
                self.id
            )));
        }
        if self.phase() != Phase::Idle || self.pending_request {
            return Err(SimError::InvalidState(format!(
                "{} cannot request entry while {:?}",
                self.id,
                self.phase()
            )));
        }
        self.pending_request = true;
        Ok(())
    }

    /// Queue a manual release; it is issued on the next step.
    pub(crate) fn release(&mut self) -> Result<()> {
        if self.behavior != Behavior::Manual {
            return Err(SimError::InvalidState(format!(
                "{} is driven by a cyclic behavior",
                self.id
            )));
        }
        if self.phase() != Phase::InCriticalSection || self.pending_release {
            return Err(SimError::InvalidState(format!(
                "{} cannot release while {:?}",
                self.id,
                self.phase()
            )));
        }
        self.pending_release = true;
        Ok(())
    }

    fn request_now(&mut self, protocol: Protocol, drawer: &mut SharedDrawerState) -> Transition {
        let turn = protocol.turn_on_request(self.id);
        drawer.set_flag(self.id, true);
        drawer.set_turn(turn);
        self.state = ActorState::Requesting;
        self.stats.current_wait = 0;
        Transition::Requested { turn }
    }

    fn release_now(&mut self, drawer: &mut SharedDrawerState, rest_steps: u32) -> Transition {
        drawer.set_flag(self.id, false);
        self.state = ActorState::Idle {
            rest_left: rest_steps,
        };
        if let Some(left) = self.cycles_left.as_mut() {
            *left = left.saturating_sub(1);
        }
        Transition::Released
    }

    /// Advance one step. Reads only the committed view of `drawer`; writes
    /// are buffered until the driver commits.
    pub(crate) fn step(
        &mut self,
        protocol: Protocol,
        drawer: &mut SharedDrawerState,
    ) -> (StepOutcome, Option<Transition>) {
        match (self.state, self.behavior) {
            (ActorState::Finished, _) => (StepOutcome::Done, None),

            (ActorState::Requesting, behavior) => {
                if protocol.must_wait(self.id, drawer.view()) {
                    self.stats.suspended_steps += 1;
                    self.stats.current_wait += 1;
                    return (StepOutcome::Suspended, None);
                }
                let use_left = match behavior {
                    Behavior::Cyclic { critical_steps, .. } => critical_steps,
                    Behavior::Manual => 0,
                };
                self.state = ActorState::Critical { use_left };
                self.stats.entries += 1;
                self.stats.longest_wait = self.stats.longest_wait.max(self.stats.current_wait);
                self.stats.current_wait = 0;
                (StepOutcome::Progressed, Some(Transition::Entered))
            }

            (ActorState::Idle { .. }, Behavior::Manual) => {
                if !self.pending_request {
                    return (StepOutcome::Suspended, None);
                }
                self.pending_request = false;
                let t = self.request_now(protocol, drawer);
                (StepOutcome::Progressed, Some(t))
            }

            (ActorState::Critical { .. }, Behavior::Manual) => {
                if !self.pending_release {
                    return (StepOutcome::Suspended, None);
                }
                self.pending_release = false;
                let t = self.release_now(drawer, 0);
                (StepOutcome::Progressed, Some(t))
            }

            (ActorState::Idle { rest_left }, Behavior::Cyclic { .. }) => {
                if rest_left > 0 {
                    self.state = ActorState::Idle {
                        rest_left: rest_left - 1,
                    };
                    return (StepOutcome::Progressed, None);
                }
                if self.cycles_left == Some(0) {
                    self.state = ActorState::Finished;
                    return (StepOutcome::Done, Some(Transition::Finished));
                }
                let t = self.request_now(protocol, drawer);
                (StepOutcome::Progressed, Some(t))
            }

            (ActorState::Critical { use_left }, Behavior::Cyclic { rest_steps, .. }) => {
                if use_left > 1 {
                    self.state = ActorState::Critical {
                        use_left: use_left - 1,
                    };
                    return (StepOutcome::Progressed, None);
                }
                let t = self.release_now(drawer, rest_steps);
                (StepOutcome::Progressed, Some(t))
            }
        }
    }

    /// Back to the initial state, with a fresh cycle budget.
    pub(crate) fn reset(&mut self) {
        // The stored behavior was validated by `new`.
        *self = Self::with_behavior(self.id, self.behavior);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cyclic(critical_steps: u32, rest_steps: u32, cycles: Option<u32>) -> Behavior {
        Behavior::Cyclic {
            critical_steps,
            rest_steps,
            cycles,
        }
    }

    #[test]
    fn test_zero_critical_steps_rejected() {
        assert!(Participant::new(ParticipantId(0), cyclic(0, 1, None)).is_err());
    }

    #[test]
    fn test_uncontended_cycle() {
        let mut drawer = SharedDrawerState::new(2);
        let mut p = Participant::new(ParticipantId(0), cyclic(2, 1, Some(1))).unwrap();
        let proto = Protocol::Peterson;

        let (o, t) = p.step(proto, &mut drawer);
        assert_eq!(o, StepOutcome::Progressed);
        assert_eq!(t, Some(Transition::Requested { turn: 1 }));
        drawer.commit();

        assert_eq!(p.step(proto, &mut drawer).1, Some(Transition::Entered));
        assert_eq!(p.phase(), Phase::InCriticalSection);
        assert_eq!(p.step(proto, &mut drawer).1, None);
        assert_eq!(p.step(proto, &mut drawer).1, Some(Transition::Released));
        drawer.commit();
        assert!(!drawer.view().flags[0]);

        // One rest step, then the budget is spent.
        assert_eq!(p.step(proto, &mut drawer).0, StepOutcome::Progressed);
        assert_eq!(
            p.step(proto, &mut drawer),
            (StepOutcome::Done, Some(Transition::Finished))
        );
        assert_eq!(p.step(proto, &mut drawer), (StepOutcome::Done, None));
        assert_eq!(p.stats().entries, 1);
    }

    #[test]
    fn test_guard_suspends_and_counts_wait() {
        let mut drawer = SharedDrawerState::new(2);
        drawer.set_flag(ParticipantId(1), true);
        drawer.commit();
        let mut p = Participant::new(ParticipantId(0), Behavior::default()).unwrap();
        p.step(Protocol::Peterson, &mut drawer);
        drawer.commit();
        assert_eq!(drawer.view().turn, 1);

        for _ in 0..3 {
            assert_eq!(p.step(Protocol::Peterson, &mut drawer).0, StepOutcome::Suspended);
        }
        assert_eq!(p.stats().current_wait, 3);

        drawer.set_turn(0);
        drawer.commit();
        assert_eq!(p.step(Protocol::Peterson, &mut drawer).1, Some(Transition::Entered));
        assert_eq!(p.stats().longest_wait, 3);
        assert_eq!(p.stats().current_wait, 0);
    }

    #[test]
    fn test_manual_phase_checks() {
        let mut drawer = SharedDrawerState::new(2);
        let mut p = Participant::new(ParticipantId(1), Behavior::Manual).unwrap();
        assert!(matches!(p.release(), Err(SimError::InvalidState(_))));
        assert_eq!(p.step(Protocol::Peterson, &mut drawer).0, StepOutcome::Suspended);

        p.request().unwrap();
        assert!(p.request().is_err());
        p.step(Protocol::Peterson, &mut drawer);
        drawer.commit();
        p.step(Protocol::Peterson, &mut drawer);
        assert_eq!(p.phase(), Phase::InCriticalSection);
        assert_eq!(p.step(Protocol::Peterson, &mut drawer).0, StepOutcome::Suspended);

        p.release().unwrap();
        assert_eq!(p.step(Protocol::Peterson, &mut drawer).1, Some(Transition::Released));
        assert_eq!(p.phase(), Phase::Idle);
    }

    #[test]
    fn test_reset_restores_fresh_participant() {
        let mut drawer = SharedDrawerState::new(2);
        let mut p = Participant::new(ParticipantId(1), cyclic(1, 0, Some(1))).unwrap();
        let fresh = p.key();
        while !p.is_finished() {
            p.step(Protocol::Peterson, &mut drawer);
            drawer.commit();
        }
        assert_eq!(p.stats().entries, 1);

        p.reset();
        assert_eq!(p.key(), fresh);
        assert_eq!(p.stats(), &ParticipantStats::default());
        assert_eq!(p.behavior(), cyclic(1, 0, Some(1)));
    }

    #[test]
    fn test_cyclic_rejects_manual_calls() {
        let mut p = Participant::new(ParticipantId(0), Behavior::default()).unwrap();
        assert!(matches!(p.request(), Err(SimError::InvalidState(_))));
    }
}
