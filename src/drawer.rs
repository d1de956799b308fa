//! Shared protocol state: one intent flag per participant plus the turn
//! variable.
//!
//! Writes made during a tick are buffered and become visible only when the
//! driver commits at the tick boundary. Every participant stepped in the
//! same tick therefore reads the same snapshot, which is what lets two
//! participants race on `turn`.

use std::fmt;

use serde::Serialize;

use crate::types::ParticipantId;

/// A point-in-time copy of the shared state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DrawerSnapshot {
    pub flags: Vec<bool>,
    pub turn: usize,
}

impl DrawerSnapshot {
    fn new(participants: usize) -> Self {
        DrawerSnapshot {
            flags: vec![false; participants],
            turn: 0,
        }
    }

    /// Flag of `who`, or `None` if there is no such participant.
    pub fn flag(&self, who: ParticipantId) -> Option<bool> {
        self.flags.get(who.index()).copied()
    }

    /// True if any participant other than `me` has its flag raised.
    pub fn any_other_flag(&self, me: ParticipantId) -> bool {
        self.flags
            .iter()
            .enumerate()
            .any(|(i, &f)| f && i != me.index())
    }
}

impl fmt::Display for DrawerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.flags.iter().enumerate() {
            writeln!(f, "Flag[{i}]: {flag}")?;
        }
        write!(f, "Turn: {}", self.turn)
    }
}

/// A buffered write to the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawerWrite {
    Flag { who: ParticipantId, value: bool },
    Turn(usize),
}

/// Committed shared state plus the writes buffered during the current tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SharedDrawerState {
    committed: DrawerSnapshot,
    pending: Vec<DrawerWrite>,
}

impl SharedDrawerState {
    /// All flags lowered, `turn = 0`.
    pub fn new(participants: usize) -> Self {
        SharedDrawerState {
            committed: DrawerSnapshot::new(participants),
            pending: Vec::new(),
        }
    }

    pub fn participants(&self) -> usize {
        self.committed.flags.len()
    }

    /// The committed view every participant reads during a tick.
    pub fn view(&self) -> &DrawerSnapshot {
        &self.committed
    }

    pub fn set_flag(&mut self, who: ParticipantId, value: bool) {
        self.pending.push(DrawerWrite::Flag { who, value });
    }

    pub fn set_turn(&mut self, turn: usize) {
        self.pending.push(DrawerWrite::Turn(turn));
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Apply buffered writes in the order they were made. When two
    /// participants write `turn` in one tick, the later one wins.
    pub fn commit(&mut self) {
        for write in self.pending.drain(..) {
            match write {
                DrawerWrite::Flag { who, value } => self.committed.flags[who.index()] = value,
                DrawerWrite::Turn(t) => self.committed.turn = t,
            }
        }
    }

    pub fn reset(&mut self) {
        let n = self.participants();
        self.committed = DrawerSnapshot::new(n);
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_invisible_until_commit() {
        let mut drawer = SharedDrawerState::new(2);
        drawer.set_flag(ParticipantId(1), true);
        drawer.set_turn(0);
        assert_eq!(drawer.view().flag(ParticipantId(1)), Some(false));
        assert!(drawer.has_pending());
        drawer.commit();
        assert_eq!(drawer.view().flag(ParticipantId(1)), Some(true));
        assert!(!drawer.has_pending());
    }

    #[test]
    fn test_last_turn_write_wins() {
        let mut drawer = SharedDrawerState::new(3);
        drawer.set_turn(1);
        drawer.set_turn(2);
        drawer.commit();
        assert_eq!(drawer.view().turn, 2);
    }

    #[test]
    fn test_snapshot_display() {
        let mut drawer = SharedDrawerState::new(2);
        drawer.set_flag(ParticipantId(0), true);
        drawer.set_turn(1);
        drawer.commit();
        assert_eq!(
            drawer.view().to_string(),
            "Flag[0]: true\nFlag[1]: false\nTurn: 1"
        );
    }

    #[test]
    fn test_reset_lowers_everything() {
        let mut drawer = SharedDrawerState::new(3);
        drawer.set_flag(ParticipantId(2), true);
        drawer.set_turn(2);
        drawer.commit();
        drawer.set_flag(ParticipantId(0), true);
        drawer.reset();
        assert_eq!(drawer.view(), &DrawerSnapshot::new(3));
        assert!(!drawer.has_pending());
    }

    #[test]
    fn test_any_other_flag() {
        let mut drawer = SharedDrawerState::new(3);
        drawer.set_flag(ParticipantId(1), true);
        drawer.commit();
        assert!(drawer.view().any_other_flag(ParticipantId(0)));
        assert!(!drawer.view().any_other_flag(ParticipantId(1)));
    }
}
