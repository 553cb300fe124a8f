//! Run results
//!
//! An `Estimate` is what the root worker knows after both reductions: the
//! reduced pi value and the slowest worker's runtime. Everything else
//! (absolute error, formatting) derives from those.

use crate::integrate::summation::Summation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reference value the estimate is compared against
pub const REFERENCE_PI: f64 = std::f64::consts::PI;

/// Result of one estimation run, as seen by the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Number of workers that took part
    pub workers: usize,
    /// Number of midpoint intervals
    pub intervals: u64,
    /// Summation used for the local sums
    pub summation: Summation,
    /// Reduced estimate of pi
    pub pi: f64,
    /// |pi - REFERENCE_PI|
    pub abs_error: f64,
    /// Slowest worker's elapsed time in seconds
    pub max_runtime_secs: f64,
}

impl Estimate {
    pub fn new(
        workers: usize,
        intervals: u64,
        summation: Summation,
        pi: f64,
        max_runtime_secs: f64,
    ) -> Self {
        Self {
            workers,
            intervals,
            summation,
            pi,
            abs_error: abs_error(pi),
            max_runtime_secs,
        }
    }
}

/// Absolute error of an estimate against the reference value
pub fn abs_error(pi: f64) -> f64 {
    (pi - REFERENCE_PI).abs()
}

/// Per-worker timing, kept by the driver for debug output and tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerTiming {
    pub rank: usize,
    /// Local integral contribution (already multiplied by dx)
    pub local: f64,
    pub elapsed: Duration,
}

/// Collects per-worker timings from a local run
#[derive(Debug, Default)]
pub struct TimingAggregator {
    timings: Vec<WorkerTiming>,
}

impl TimingAggregator {
    pub fn new() -> Self {
        Self { timings: Vec::new() }
    }

    pub fn add(&mut self, timing: WorkerTiming) {
        self.timings.push(timing);
    }

    pub fn num_workers(&self) -> usize {
        self.timings.len()
    }

    /// Longest elapsed time among the collected workers
    pub fn slowest(&self) -> Option<Duration> {
        self.timings.iter().map(|t| t.elapsed).max()
    }

    /// Timings sorted by rank
    pub fn by_rank(&self) -> Vec<WorkerTiming> {
        let mut sorted = self.timings.clone();
        sorted.sort_unstable_by_key(|t| t.rank);
        sorted
    }
}
