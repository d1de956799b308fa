//! Flag-and-turn entry protocols.
//!
//! Two variants are provided:
//!
//! - [`Protocol::Peterson`]: the classical 2-participant algorithm. Raise
//!   your flag, give the turn away, wait while the other is interested and
//!   holds the turn.
//! - [`Protocol::RingTurn`]: the direct 3-participant generalization. Raise
//!   your flag, pass the turn to `(me + 1) % 3`, wait while anyone else is
//!   interested and the turn is not yours.
//!
//! `RingTurn` does not guarantee mutual exclusion. It is modelled as-is so
//! the failure can be observed and explored; see [`crate::explore`].

use std::fmt;

use serde::Serialize;

use crate::drawer::DrawerSnapshot;
use crate::error::{Result, SimError};
use crate::types::ParticipantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    Peterson,
    RingTurn,
}

impl Protocol {
    /// The protocol used for `n` participants. Only 2 and 3 are supported.
    pub fn for_participants(n: usize) -> Result<Self> {
        match n {
            2 => Ok(Protocol::Peterson),
            3 => Ok(Protocol::RingTurn),
            _ => Err(SimError::InvalidInput(format!(
                "participant count must be 2 or 3, got {n}"
            ))),
        }
    }

    pub fn participants(self) -> usize {
        match self {
            Protocol::Peterson => 2,
            Protocol::RingTurn => 3,
        }
    }

    /// Value written to `turn` when `me` requests entry.
    pub fn turn_on_request(self, me: ParticipantId) -> usize {
        match self {
            Protocol::Peterson => 1 - me.index(),
            Protocol::RingTurn => (me.index() + 1) % 3,
        }
    }

    /// The guard: true while `me` must keep waiting.
    pub fn must_wait(self, me: ParticipantId, view: &DrawerSnapshot) -> bool {
        match self {
            Protocol::Peterson => {
                let other = 1 - me.index();
                view.flags[other] && view.turn == other
            }
            Protocol::RingTurn => view.any_other_flag(me) && view.turn != me.index(),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Peterson => write!(f, "peterson"),
            Protocol::RingTurn => write!(f, "ring-turn"),
        }
    }
}
