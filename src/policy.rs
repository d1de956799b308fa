//! Scheduling policies and the pure next-job selection function.
//!
//! All three disciplines go through [`select_next`] so the selection rules
//! can be audited (and tested) in one place.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::types::{JobId, Time, TIME_EPSILON};

/// The scheduling discipline driving a [`SchedulerEngine`](crate::SchedulerEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// First-come-first-served: earliest arrival runs to completion.
    #[default]
    Fcfs,
    /// Shortest-job-first, non-preemptive: decided only when the CPU is idle.
    Sjf,
    /// Shortest-remaining-time-first: re-decided every quantum, preemptive.
    Srtf,
}

impl Policy {
    pub const ALL: [Policy; 3] = [Policy::Fcfs, Policy::Sjf, Policy::Srtf];

    pub fn is_preemptive(self) -> bool {
        matches!(self, Policy::Srtf)
    }

    pub fn name(self) -> &'static str {
        match self {
            Policy::Fcfs => "fcfs",
            Policy::Sjf => "sjf",
            Policy::Srtf => "srtf",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fcfs" => Ok(Policy::Fcfs),
            "sjf" => Ok(Policy::Sjf),
            "srtf" => Ok(Policy::Srtf),
            other => Err(format!(
                "unknown policy {other:?}: expected fcfs, sjf or srtf"
            )),
        }
    }
}

/// Order two candidates by a primary key, then arrival, then add order.
fn by_key_then_fifo(a: &Job, b: &Job, key: impl Fn(&Job) -> Time) -> Ordering {
    key(a)
        .total_cmp(&key(b))
        .then_with(|| a.arrival().total_cmp(&b.arrival()))
        .then_with(|| a.handle().cmp(&b.handle()))
}

/// Pick the job that should hold the CPU next.
///
/// - `Fcfs`: earliest arrival among all active jobs, even one that has not
///   arrived yet (the engine idles until it does). Ties go to add order.
/// - `Sjf`: smallest original burst among jobs arrived by `now`. Ties go to
///   arrival, then add order. `None` if nothing has arrived.
/// - `Srtf`: smallest remaining time among arrived jobs. `running` keeps the
///   CPU unless a candidate is strictly shorter.
///
/// `active` must hold only unfinished jobs.
pub fn select_next(
    policy: Policy,
    active: &[Job],
    now: Time,
    running: Option<JobId>,
) -> Option<JobId> {
    match policy {
        Policy::Fcfs => active
            .iter()
            .min_by(|a, b| by_key_then_fifo(a, b, Job::arrival))
            .map(Job::handle),
        Policy::Sjf => active
            .iter()
            .filter(|j| j.has_arrived(now))
            .min_by(|a, b| by_key_then_fifo(a, b, Job::burst))
            .map(Job::handle),
        Policy::Srtf => {
            let best = active
                .iter()
                .filter(|j| j.has_arrived(now))
                .min_by(|a, b| by_key_then_fifo(a, b, Job::remaining))?;
            let incumbent = running.and_then(|id| active.iter().find(|j| j.handle() == id));
            match incumbent {
                // Preemption requires a strictly shorter remaining time, beyond
                // float noise.
                Some(cur) if best.remaining() > cur.remaining() - TIME_EPSILON => {
                    Some(cur.handle())
                }
                _ => Some(best.handle()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobSpec;

    fn jobs(specs: &[(&str, Time, Time)]) -> Vec<Job> {
        specs
            .iter()
            .enumerate()
            .map(|(i, (id, a, b))| Job::new(JobId(i), JobSpec::new(*id, *a, *b)))
            .collect()
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("FCFS".parse::<Policy>(), Ok(Policy::Fcfs));
        assert_eq!(" sjf ".parse::<Policy>(), Ok(Policy::Sjf));
        assert_eq!("srtf".parse::<Policy>(), Ok(Policy::Srtf));
        assert!("rr".parse::<Policy>().is_err());
    }

    #[test]
    fn test_fcfs_ties_keep_add_order() {
        let active = jobs(&[("b", 1.0, 5.0), ("a", 1.0, 1.0), ("c", 0.5, 9.0)]);
        assert_eq!(select_next(Policy::Fcfs, &active, 0.0, None), Some(JobId(2)));
        let active = jobs(&[("b", 1.0, 5.0), ("a", 1.0, 1.0)]);
        assert_eq!(select_next(Policy::Fcfs, &active, 0.0, None), Some(JobId(0)));
    }

    #[test]
    fn test_fcfs_selects_future_arrival() {
        let active = jobs(&[("x", 7.0, 1.0)]);
        assert_eq!(select_next(Policy::Fcfs, &active, 0.0, None), Some(JobId(0)));
    }

    #[test]
    fn test_sjf_only_considers_arrived() {
        let active = jobs(&[("long", 0.0, 6.0), ("short", 4.0, 1.0)]);
        assert_eq!(select_next(Policy::Sjf, &active, 3.0, None), Some(JobId(0)));
        assert_eq!(select_next(Policy::Sjf, &active, 4.0, None), Some(JobId(1)));
        let later = jobs(&[("x", 5.0, 1.0)]);
        assert_eq!(select_next(Policy::Sjf, &later, 3.0, None), None);
    }

    #[test]
    fn test_sjf_ties_break_on_arrival_then_add_order() {
        let active = jobs(&[("p", 2.0, 3.0), ("q", 1.0, 3.0), ("r", 1.0, 3.0)]);
        assert_eq!(select_next(Policy::Sjf, &active, 5.0, None), Some(JobId(1)));
    }

    #[test]
    fn test_srtf_incumbent_wins_ties() {
        let active = jobs(&[("cur", 0.0, 2.0), ("new", 1.0, 2.0)]);
        assert_eq!(
            select_next(Policy::Srtf, &active, 1.0, Some(JobId(0))),
            Some(JobId(0))
        );
        // Without an incumbent the earlier arrival wins.
        assert_eq!(select_next(Policy::Srtf, &active, 1.0, None), Some(JobId(0)));
        // Incumbent loses to a strictly shorter job.
        let active = jobs(&[("cur", 0.0, 2.0), ("new", 1.0, 1.5)]);
        assert_eq!(
            select_next(Policy::Srtf, &active, 1.0, Some(JobId(0))),
            Some(JobId(1))
        );
    }

    #[test]
    fn test_empty_active_set() {
        for policy in Policy::ALL {
            assert_eq!(select_next(policy, &[], 0.0, None), None);
        }
    }
}
