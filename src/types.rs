//! Newtype wrappers and type aliases for domain concepts.
//!
//! Newtypes for identifiers (job handles, participant IDs) prevent mixing a
//! queue position up with a participant index. Type aliases for plain
//! quantities (simulated time, logical steps) keep signatures readable
//! without implementing arithmetic traits.

use std::fmt;

use serde::Serialize;

/// Handle to a job inside a [`SchedulerEngine`](crate::SchedulerEngine).
///
/// Handles are assigned in insertion order and never reused within a run,
/// so comparing handles compares add order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(pub usize);

/// Participant identifier in a mutual-exclusion scenario (`0..N`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct ParticipantId(pub usize);

impl ParticipantId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Simulated scheduler time, in abstract time units.
pub type Time = f64;

/// Tolerance for comparing accumulated [`Time`] values. Fractional quanta
/// drift by a few ulps per slice; anything closer than this is the same instant.
pub const TIME_EPSILON: Time = 1e-9;

/// Logical step counter of the mutual-exclusion driver.
pub type Tick = u64;
