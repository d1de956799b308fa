//! Interleaving exploration for mutex scenarios.
//!
//! A schedule is a sequence of ticks, each stepping a nonempty subset of
//! participants. [`exhaustive`] searches every schedule breadth-first up to
//! a depth bound, memoizing states so each distinct state is expanded once;
//! the first violation it finds is therefore a shortest one.
//! [`random_walk`] and [`sweep`] sample schedules from a seeded PRNG, which
//! reaches much deeper than the exhaustive bound.
//!
//! ## Determinism
//!
//! Same scenario + same seed → same schedule → same result. A violating seed
//! reported by a sweep reproduces with [`random_walk`].

use std::collections::{HashSet, VecDeque};
use std::fmt;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info};

use crate::drawer::DrawerSnapshot;
use crate::mutex::MutexSim;
use crate::types::{ParticipantId, Tick};

/// A schedule that ends with more than one participant in the critical
/// section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterexample {
    /// Participants stepped in each tick, starting from the initial state.
    pub schedule: Vec<Vec<ParticipantId>>,
    pub inside: Vec<ParticipantId>,
    /// Shared state right after the violating tick.
    pub state: DrawerSnapshot,
}

impl Counterexample {
    pub fn ticks(&self) -> usize {
        self.schedule.len()
    }

    /// Replay the schedule on a fresh copy of `start`.
    pub fn replay(&self, start: &MutexSim) -> MutexSim {
        let mut sim = start.clone();
        for step in &self.schedule {
            sim.step_ids(step, None);
        }
        sim
    }
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.schedule.iter().enumerate() {
            let ids: Vec<String> = step.iter().map(|p| p.to_string()).collect();
            writeln!(f, "tick {}: step {{{}}}", i + 1, ids.join(", "))?;
        }
        let inside: Vec<String> = self.inside.iter().map(|p| p.to_string()).collect();
        writeln!(f, "inside critical section: {}", inside.join(", "))?;
        write!(f, "{}", self.state)
    }
}

/// Result of an exhaustive search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exploration {
    /// Distinct states reached, including the initial one.
    pub states_visited: usize,
    /// True if every reachable state was expanded before the depth bound.
    pub complete: bool,
    /// Shortest violating schedule, if any.
    pub violation: Option<Counterexample>,
}

/// Every nonempty subset of `0..n`, each in ascending order.
fn step_sets(n: usize) -> Vec<Vec<ParticipantId>> {
    (1u32..(1u32 << n))
        .map(|mask| {
            (0..n)
                .filter(|&i| mask & (1u32 << i) != 0)
                .map(ParticipantId)
                .collect()
        })
        .collect()
}

/// Working copy of `start` that records no trace; search clones it per node.
fn untraced(start: &MutexSim) -> MutexSim {
    let mut sim = start.clone();
    sim.set_trace_limit(Some(0));
    sim
}

/// Breadth-first search over all schedules of at most `max_depth` ticks.
pub fn exhaustive(start: &MutexSim, max_depth: usize) -> Exploration {
    let sets = step_sets(start.participant_count());
    let mut visited = HashSet::new();
    visited.insert(start.state_key());
    let mut queue: VecDeque<(MutexSim, Vec<Vec<ParticipantId>>)> = VecDeque::new();
    queue.push_back((untraced(start), Vec::new()));
    let mut truncated = false;

    while let Some((sim, schedule)) = queue.pop_front() {
        if schedule.len() >= max_depth {
            // The bound only cuts the search if this node leads somewhere new.
            truncated = truncated
                || sets.iter().any(|set| {
                    let mut next = sim.clone();
                    next.step_ids(set, None).violation.is_some()
                        || !visited.contains(&next.state_key())
                });
            continue;
        }
        for set in &sets {
            let mut next = sim.clone();
            let report = next.step_ids(set, None);
            let mut path = schedule.clone();
            path.push(set.clone());

            if let Some(v) = report.violation {
                info!(
                    ticks = path.len() as u64,
                    states = visited.len() as u64,
                    "exhaustive search found a violation"
                );
                return Exploration {
                    states_visited: visited.len(),
                    complete: false,
                    violation: Some(Counterexample {
                        schedule: path,
                        inside: v.inside,
                        state: v.state,
                    }),
                };
            }
            if visited.insert(next.state_key()) {
                queue.push_back((next, path));
            }
        }
    }

    info!(
        states = visited.len() as u64,
        complete = !truncated,
        "exhaustive search finished"
    );
    Exploration {
        states_visited: visited.len(),
        complete: !truncated,
        violation: None,
    }
}

/// Run one random schedule of `ticks` ticks from `start`. Each tick steps a
/// uniformly chosen nonempty subset of participants.
pub fn random_walk(start: &MutexSim, seed: u32, ticks: Tick) -> Option<Counterexample> {
    let sets = step_sets(start.participant_count());
    let mut rng = SmallRng::seed_from_u64(seed as u64);
    let mut sim = untraced(start);
    let mut schedule = Vec::new();

    for _ in 0..ticks {
        let set = &sets[(rng.next_u32() as usize) % sets.len()];
        schedule.push(set.clone());
        let report = sim.step_ids(set, None);
        if let Some(v) = report.violation {
            debug!(seed, ticks = schedule.len() as u64, "random walk violated exclusion");
            return Some(Counterexample {
                schedule,
                inside: v.inside,
                state: v.state,
            });
        }
    }
    None
}

/// Result of a seeded sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepResult {
    pub runs: u32,
    pub violating_seeds: Vec<u32>,
    /// Counterexample from the first violating seed.
    pub first: Option<(u32, Counterexample)>,
}

/// Run `runs` random walks with seeds `base_seed, base_seed + 1, ...`.
pub fn sweep(start: &MutexSim, base_seed: u32, runs: u32, ticks: Tick) -> SweepResult {
    let mut result = SweepResult {
        runs,
        violating_seeds: Vec::new(),
        first: None,
    };
    for i in 0..runs {
        let seed = base_seed.wrapping_add(i);
        if let Some(cx) = random_walk(start, seed, ticks) {
            result.violating_seeds.push(seed);
            if result.first.is_none() {
                result.first = Some((seed, cx));
            }
        }
    }
    info!(
        runs,
        violating = result.violating_seeds.len() as u64,
        "random sweep finished"
    );
    result
}
