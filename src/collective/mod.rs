//! Collective operations between cooperating workers
//!
//! The estimator only needs two collectives from whatever runs the workers:
//! a barrier and a reduction to a designated root. This module defines that
//! interface and its implementations.
//!
//! # Runtimes
//!
//! - `local`: worker threads in one process, values exchanged over channels
//! - `remote`: worker processes talking to a hub over localhost TCP
//! - `protocol`: wire format shared by `remote` and the hub
//! - `mpi_comm`: ranks of an `mpirun` job (with the `mpi` feature)
//!
//! # Example
//!
//! ```
//! use piquad::collective::{Collective, ReduceOp, local::LocalGroup};
//!
//! let comms = LocalGroup::new(1)?;
//! let comm = &comms[0];
//! comm.barrier()?;
//! assert_eq!(comm.reduce(2.5, ReduceOp::Sum, 0)?, Some(2.5));
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi_comm;
pub mod protocol;
pub mod remote;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Associative combine operator for reductions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceOp {
    /// Sum of values
    Sum,
    /// Maximum value
    Max,
    /// Minimum value
    Min,
}

impl ReduceOp {
    /// Combine two values
    #[inline]
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Sum => a + b,
            Self::Max => a.max(b),
            Self::Min => a.min(b),
        }
    }

    /// Combine values left to right
    ///
    /// Returns `None` for an empty sequence. Callers pass values in rank
    /// order so that a given group produces the same bits on every run.
    pub fn fold<I>(self, values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        values.into_iter().reduce(|acc, v| self.combine(acc, v))
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
        }
    }
}

/// Errors raised by collective operations
#[derive(Debug, Error)]
pub enum CollectiveError {
    #[error("root rank {root} is out of range for a group of {size}")]
    InvalidRoot { root: usize, size: usize },

    #[error("rank {rank} is out of range for a group of {size}")]
    InvalidRank { rank: usize, size: usize },

    #[error("group size must be at least 1")]
    EmptyGroup,

    #[error("peer rank {peer} disconnected during {during}")]
    Disconnected { peer: usize, during: String },

    #[error(
        "ranks issued different collectives: expected {expected}, got {actual} from rank {rank}"
    )]
    Mismatch {
        rank: usize,
        expected: String,
        actual: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("collective aborted: {0}")]
    Aborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Collective operations available to a worker
///
/// Every call blocks until all members of the group have made the matching
/// call. All members must issue the same collectives in the same order.
pub trait Collective {
    /// This worker's rank in [0, size)
    fn rank(&self) -> usize;

    /// Number of workers in the group
    fn size(&self) -> usize;

    /// Wait until every worker has arrived
    fn barrier(&self) -> Result<(), CollectiveError>;

    /// Combine one value per worker with `op`
    ///
    /// Returns `Some(result)` on `root` and `None` on every other rank.
    fn reduce(&self, value: f64, op: ReduceOp, root: usize) -> Result<Option<f64>, CollectiveError>;
}

/// Check a root argument against the group size
pub(crate) fn check_root(root: usize, size: usize) -> Result<(), CollectiveError> {
    if root >= size {
        return Err(CollectiveError::InvalidRoot { root, size });
    }
    Ok(())
}
