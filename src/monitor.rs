//! Monitor trait for per-tick state sampling of a mutex run.
//!
//! Monitors are called by the driver after every committed tick, so they
//! see exactly the state the next tick will read. [`ExclusionMonitor`] is
//! the built-in one: it checks that at most one participant is inside the
//! critical section.

use tracing::warn;

use crate::drawer::DrawerSnapshot;
use crate::participant::Phase;
use crate::types::{ParticipantId, Tick};

/// Context passed to monitors after each tick.
pub struct ProbeContext<'a> {
    /// Tick that just committed.
    pub tick: Tick,
    /// Shared state after the commit.
    pub state: &'a DrawerSnapshot,
    /// Phase of every participant, indexed by id.
    pub phases: &'a [Phase],
}

impl ProbeContext<'_> {
    pub fn in_critical(&self) -> Vec<ParticipantId> {
        self.phases
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == Phase::InCriticalSection)
            .map(|(i, _)| ParticipantId(i))
            .collect()
    }
}

/// Trait for mid-simulation state sampling.
pub trait Monitor {
    fn sample(&mut self, ctx: &ProbeContext);
}

/// A tick at which more than one participant was in the critical section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub tick: Tick,
    pub inside: Vec<ParticipantId>,
    pub state: DrawerSnapshot,
}

/// Checks mutual exclusion after every tick.
#[derive(Debug, Clone, Default)]
pub struct ExclusionMonitor {
    count: usize,
    first: Option<Violation>,
}

impl ExclusionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticks that ended with more than one participant inside.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn first(&self) -> Option<&Violation> {
        self.first.as_ref()
    }

    /// Check one context. Returns the violation if this tick broke exclusion.
    pub fn check(&mut self, ctx: &ProbeContext) -> Option<Violation> {
        let inside = ctx.in_critical();
        if inside.len() <= 1 {
            return None;
        }
        let violation = Violation {
            tick: ctx.tick,
            inside,
            state: ctx.state.clone(),
        };
        self.count += 1;
        if self.first.is_none() {
            warn!(
                tick = ctx.tick,
                inside = ?violation.inside,
                turn = ctx.state.turn as u64,
                "mutual exclusion violated"
            );
            self.first = Some(violation.clone());
        }
        Some(violation)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Monitor for ExclusionMonitor {
    fn sample(&mut self, ctx: &ProbeContext) {
        self.check(ctx);
    }
}
