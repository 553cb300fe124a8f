//! Midpoint-rule estimation of pi
//!
//! pi = ∫₀¹ 4/(1+x²) dx. With N intervals of width dx = 1/N the midpoint
//! rule samples the integrand at (i + 0.5)·dx for i in [0, N).
//!
//! Work is split by striding: worker r of W owns indices r, r+W, r+2W, …
//! Each worker sums its own samples, scales by dx, and the partial results
//! are combined with a sum reduction at rank 0. Runtimes are combined with
//! a max reduction the same way.
//!
//! # Example
//!
//! ```
//! use piquad::collective::local::LocalGroup;
//! use piquad::integrate::{estimate, EstimateParams};
//! use piquad::integrate::summation::Summation;
//!
//! let params = EstimateParams::new(10_000, Summation::Exact)?;
//! let comms = LocalGroup::new(1)?;
//! let result = estimate(&comms[0], &params)?.expect("rank 0 is the root");
//! assert!(result.abs_error < 1e-8);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod summation;

use crate::collective::{Collective, CollectiveError, ReduceOp};
use crate::stats::Estimate;
use crate::util::time::Timestamp;
use std::time::Duration;
use summation::Summation;
use thiserror::Error;

/// Interval count used when none is configured
pub const DEFAULT_INTERVALS: u64 = 100_000_000;

/// Rank that receives both reductions and reports the result
pub const ROOT: usize = 0;

/// Errors raised by the estimator
#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("interval count must be positive")]
    ZeroIntervals,

    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("rank {rank} is out of range for {size} worker(s)")]
    RankOutOfRange { rank: usize, size: usize },

    #[error(transparent)]
    Collective(#[from] CollectiveError),
}

/// Integrand of the pi integral: 4/(1+x²)
#[inline]
pub fn integrand(x: f64) -> f64 {
    4.0 / (1.0 + x * x)
}

/// Midpoint of interval `i` with width `dx`
#[inline]
pub fn midpoint(i: u64, dx: f64) -> f64 {
    (i as f64 + 0.5) * dx
}

/// Parameters shared by every worker of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateParams {
    intervals: u64,
    summation: Summation,
}

impl EstimateParams {
    pub fn new(intervals: u64, summation: Summation) -> Result<Self, EstimateError> {
        if intervals == 0 {
            return Err(EstimateError::ZeroIntervals);
        }
        Ok(Self { intervals, summation })
    }

    pub fn intervals(&self) -> u64 {
        self.intervals
    }

    pub fn summation(&self) -> Summation {
        self.summation
    }

    /// Step size 1/N
    pub fn dx(&self) -> f64 {
        1.0 / self.intervals as f64
    }
}

/// Indices owned by one worker: rank, rank+size, rank+2·size, … < n
#[derive(Debug, Clone)]
pub struct StridedRange {
    next: u64,
    end: u64,
    stride: u64,
}

impl StridedRange {
    pub fn new(n: u64, rank: usize, size: usize) -> Result<Self, EstimateError> {
        if size == 0 {
            return Err(EstimateError::ZeroWorkers);
        }
        if rank >= size {
            return Err(EstimateError::RankOutOfRange { rank, size });
        }
        Ok(Self {
            next: rank as u64,
            end: n,
            stride: size as u64,
        })
    }
}

impl Iterator for StridedRange {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        if self.next >= self.end {
            return None;
        }
        let i = self.next;
        // Saturate so a huge stride cannot wrap past `end`
        self.next = self.next.saturating_add(self.stride);
        Some(i)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.next >= self.end {
            0
        } else {
            ((self.end - self.next - 1) / self.stride + 1) as usize
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for StridedRange {}

/// One worker's share of the integral: dx · Σ f(midpoint(i)) over its indices
pub fn local_contribution(
    params: &EstimateParams,
    rank: usize,
    size: usize,
) -> Result<f64, EstimateError> {
    let dx = params.dx();
    let terms =
        StridedRange::new(params.intervals, rank, size)?.map(|i| integrand(midpoint(i, dx)));
    Ok(params.summation.sum(terms) * dx)
}

/// Full-range midpoint sum on a single worker
pub fn sequential_estimate(params: &EstimateParams) -> f64 {
    let dx = params.dx();
    params
        .summation
        .sum((0..params.intervals).map(|i| integrand(midpoint(i, dx))))
        * dx
}

/// What one worker ends up with after a run
#[derive(Debug, Clone, PartialEq)]
pub struct RankOutcome {
    pub rank: usize,
    /// This worker's contribution to the integral
    pub local: f64,
    /// Time spent on local work after the start barrier
    pub elapsed: Duration,
    /// Reduced result; present only on the root
    pub estimate: Option<Estimate>,
}

/// Run one worker's part of the computation
///
/// Sequence: barrier, timed local work, sum reduction of the contributions,
/// max reduction of the elapsed times. Every worker of the group must call
/// this with the same parameters.
pub fn run_rank<C>(comm: &C, params: &EstimateParams) -> Result<RankOutcome, EstimateError>
where
    C: Collective + ?Sized,
{
    let rank = comm.rank();
    let size = comm.size();

    comm.barrier()?;
    let start = Timestamp::now();

    let local = local_contribution(params, rank, size)?;
    let elapsed = start.elapsed();

    let pi = comm.reduce(local, ReduceOp::Sum, ROOT)?;
    let max_runtime = comm.reduce(elapsed.as_secs_f64(), ReduceOp::Max, ROOT)?;

    let estimate = match (pi, max_runtime) {
        (Some(pi), Some(t)) => Some(Estimate::new(size, params.intervals, params.summation, pi, t)),
        _ => None,
    };

    Ok(RankOutcome {
        rank,
        local,
        elapsed,
        estimate,
    })
}

/// Estimate pi collectively; returns the result on the root only
pub fn estimate<C>(comm: &C, params: &EstimateParams) -> Result<Option<Estimate>, EstimateError>
where
    C: Collective + ?Sized,
{
    Ok(run_rank(comm, params)?.estimate)
}
