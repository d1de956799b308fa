//! Scheduling metrics over completed jobs.
//!
//! # Metrics Computed
//!
//! - **Averages**: mean waiting, turnaround and response time
//! - **Distributions**: min/max/mean/stddev of each metric
//! - **Report**: the per-job results listing shown after a run

use std::fmt;

use serde::Serialize;

use crate::error::{Result, SimError};
use crate::job::{Job, JobMetrics};
use crate::types::Time;

/// Arithmetic means over a set of completed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Averages {
    pub avg_waiting: Time,
    pub avg_turnaround: Time,
    pub avg_response: Time,
}

/// Average waiting, turnaround and response time over `completed`.
///
/// Returns [`SimError::EmptySet`] when there is nothing to average; callers
/// should suppress the averages rather than treat this as fatal. Jobs
/// without metrics are ignored.
pub fn compute_averages(completed: &[Job]) -> Result<Averages> {
    let metrics: Vec<&JobMetrics> = completed.iter().filter_map(Job::metrics).collect();
    if metrics.is_empty() {
        return Err(SimError::EmptySet);
    }
    let n = metrics.len() as f64;
    let (mut waiting, mut turnaround, mut response) = (0.0, 0.0, 0.0);
    for m in &metrics {
        waiting += m.waiting;
        turnaround += m.turnaround;
        response += m.response;
    }
    Ok(Averages {
        avg_waiting: waiting / n,
        avg_turnaround: turnaround / n,
        avg_response: response / n,
    })
}

/// Summary statistics for a distribution of values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DistributionStats {
    /// Number of samples.
    pub count: usize,
    /// Minimum value (or 0 if empty).
    pub min: Time,
    /// Maximum value (or 0 if empty).
    pub max: Time,
    /// Sum of all values.
    pub sum: Time,
    /// Sum of squares (for variance calculation).
    sum_sq: Time,
}

impl DistributionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: Time) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    /// Mean value (or 0 if empty).
    pub fn mean(&self) -> Time {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Population standard deviation (or 0 if empty or single sample).
    pub fn stddev(&self) -> Time {
        if self.count < 2 {
            0.0
        } else {
            let mean = self.mean();
            let variance = (self.sum_sq / self.count as f64) - (mean * mean);
            variance.max(0.0).sqrt()
        }
    }
}

/// Distributions of the per-job metrics of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedStats {
    pub waiting: DistributionStats,
    pub turnaround: DistributionStats,
    pub response: DistributionStats,
    /// Time of the last completion.
    pub makespan: Time,
}

impl SchedStats {
    pub fn from_jobs(completed: &[Job]) -> Self {
        let mut stats = SchedStats::default();
        for m in completed.iter().filter_map(Job::metrics) {
            stats.waiting.add(m.waiting);
            stats.turnaround.add(m.turnaround);
            stats.response.add(m.response);
            stats.makespan = stats.makespan.max(m.completion);
        }
        stats
    }
}

/// One line of the results listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportLine {
    pub id: String,
    pub completion: Time,
    pub waiting: Time,
    pub turnaround: Time,
}

/// The results listing produced after a run, in completion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub lines: Vec<ReportLine>,
    /// `None` when no job completed.
    pub averages: Option<Averages>,
}

impl Report {
    pub fn from_jobs(completed: &[Job]) -> Self {
        let lines = completed
            .iter()
            .filter_map(|j| {
                j.metrics().map(|m| ReportLine {
                    id: j.name().to_string(),
                    completion: m.completion,
                    waiting: m.waiting,
                    turnaround: m.turnaround,
                })
            })
            .collect();
        Report {
            lines,
            averages: compute_averages(completed).ok(),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Process Results:")?;
        for line in &self.lines {
            writeln!(
                f,
                "{}: WT = {:.2}, TAT = {:.2}",
                line.id, line.waiting, line.turnaround
            )?;
        }
        if let Some(avg) = &self.averages {
            writeln!(f)?;
            writeln!(f, "Average Waiting Time: {:.2}", avg.avg_waiting)?;
            write!(f, "Average Turnaround Time: {:.2}", avg.avg_turnaround)?;
        }
        Ok(())
    }
}
