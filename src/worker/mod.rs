//! Worker execution
//!
//! A `Worker` is one rank of an estimation run: it owns a communicator and
//! the shared parameters, and runs the barrier / local sum / reductions
//! sequence from [`crate::integrate::run_rank`].
//!
//! The thread launcher spawns one `Worker` per rank over a
//! [`LocalGroup`](crate::collective::local::LocalGroup); worker processes
//! build a single `Worker` over a [`RemoteComm`](crate::collective::remote::RemoteComm).
//!
//! # Example
//!
//! ```
//! use piquad::integrate::EstimateParams;
//! use piquad::integrate::summation::Summation;
//! use piquad::worker::spawn_workers;
//!
//! let params = EstimateParams::new(100_000, Summation::Exact)?;
//! let run = spawn_workers(params, 4, false)?;
//!
//! assert_eq!(run.estimate.workers, 4);
//! assert_eq!(run.timings.num_workers(), 4);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::collective::local::LocalGroup;
use crate::collective::Collective;
use crate::integrate::{run_rank, EstimateParams, RankOutcome, StridedRange};
use crate::stats::{Estimate, TimingAggregator, WorkerTiming};
use crate::util::time::{format_duration, format_rate, sample_rate};
use crate::Result;
use anyhow::Context;

/// One rank of an estimation run
pub struct Worker<C> {
    comm: C,
    params: EstimateParams,
    debug: bool,
}

impl<C: Collective> Worker<C> {
    pub fn new(comm: C, params: EstimateParams, debug: bool) -> Self {
        Self { comm, params, debug }
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Run this rank to completion
    ///
    /// Every worker of the group must call `run` exactly once; the root's
    /// outcome carries the estimate.
    pub fn run(&self) -> Result<RankOutcome> {
        let rank = self.comm.rank();
        let size = self.comm.size();

        if self.debug {
            let owned = StridedRange::new(self.params.intervals(), rank, size)?.len();
            eprintln!(
                "DEBUG: Worker {}/{} starting ({} of {} intervals, {} summation)",
                rank,
                size,
                owned,
                self.params.intervals(),
                self.params.summation()
            );
        }

        let outcome = run_rank(&self.comm, &self.params)
            .with_context(|| format!("Worker {} failed", rank))?;

        if self.debug {
            let owned = StridedRange::new(self.params.intervals(), rank, size)?.len() as u64;
            eprintln!(
                "DEBUG: Worker {} done: local={:.17e}, elapsed={} ({} samples/s)",
                rank,
                outcome.local,
                format_duration(outcome.elapsed),
                format_rate(sample_rate(owned, outcome.elapsed))
            );
        }

        Ok(outcome)
    }

    /// Give back the communicator, e.g. to close a hub session
    pub fn into_comm(self) -> C {
        self.comm
    }
}

/// Result of a threaded run
#[derive(Debug)]
pub struct LocalRun {
    /// Root's estimate
    pub estimate: Estimate,
    /// Every worker's local contribution and elapsed time
    pub timings: TimingAggregator,
}

/// Run `count` workers as threads of this process
pub fn spawn_workers(params: EstimateParams, count: usize, debug: bool) -> Result<LocalRun> {
    let comms = LocalGroup::new(count).context("Failed to create worker group")?;

    if debug {
        eprintln!("DEBUG: Spawning {} worker threads", count);
    }

    let mut handles = Vec::with_capacity(count);
    for comm in comms {
        let rank = comm.rank();
        let handle = std::thread::Builder::new()
            .name(format!("piquad-worker-{}", rank))
            .spawn(move || Worker::new(comm, params, debug).run())
            .with_context(|| format!("Failed to spawn worker thread {}", rank))?;
        handles.push(handle);
    }

    // Join every thread before reporting, so no worker outlives a failure
    let mut outcomes = Vec::with_capacity(count);
    let mut first_error = None;
    for (rank, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(outcome)) => outcomes.push(outcome),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(_) => {
                first_error
                    .get_or_insert_with(|| anyhow::anyhow!("Worker thread {} panicked", rank));
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    let mut timings = TimingAggregator::new();
    let mut estimate = None;
    for outcome in outcomes {
        timings.add(WorkerTiming {
            rank: outcome.rank,
            local: outcome.local,
            elapsed: outcome.elapsed,
        });
        if outcome.estimate.is_some() {
            estimate = outcome.estimate;
        }
    }

    let estimate = estimate.context("Root worker produced no estimate")?;
    Ok(LocalRun { estimate, timings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrate::sequential_estimate;
    use crate::integrate::summation::Summation;

    #[test]
    fn test_spawn_single_worker() {
        let params = EstimateParams::new(10_000, Summation::Exact).unwrap();
        let run = spawn_workers(params, 1, false).unwrap();
        assert_eq!(run.estimate.workers, 1);
        assert_eq!(run.estimate.pi.to_bits(), sequential_estimate(&params).to_bits());
        assert_eq!(run.timings.num_workers(), 1);
    }

    #[test]
    fn test_spawn_many_workers() {
        let params = EstimateParams::new(100_000, Summation::Neumaier).unwrap();
        let run = spawn_workers(params, 8, true).unwrap();

        assert_eq!(run.estimate.workers, 8);
        assert!(run.estimate.abs_error < 1e-9);

        let by_rank = run.timings.by_rank();
        let ranks: Vec<usize> = by_rank.iter().map(|t| t.rank).collect();
        assert_eq!(ranks, (0..8).collect::<Vec<_>>());

        let folded = by_rank.iter().map(|t| t.local).fold(0.0, |a, b| a + b);
        assert_eq!(run.estimate.pi.to_bits(), folded.to_bits());

        let slowest = run.timings.slowest().unwrap();
        assert!(run.estimate.max_runtime_secs >= slowest.as_secs_f64());
    }

    #[test]
    fn test_spawn_zero_workers_fails() {
        let params = EstimateParams::new(10, Summation::Exact).unwrap();
        assert!(spawn_workers(params, 0, false).is_err());
    }

    #[test]
    fn test_worker_over_single_comm() {
        let params = EstimateParams::new(1_000, Summation::Naive).unwrap();
        let comm = LocalGroup::new(1).unwrap().pop().unwrap();
        let worker = Worker::new(comm, params, false);
        assert_eq!(worker.rank(), 0);
        let outcome = worker.run().unwrap();
        assert!(outcome.estimate.is_some());
        assert_eq!(worker.into_comm().size(), 1);
    }
}
