//! Collectives over MPI, for runs started with `mpirun`
//!
//! Each process of the MPI job is one rank; the group is `MPI_COMM_WORLD`.
//! Reductions map onto `MPI_Reduce` with the matching system operation.
//! The order in which MPI combines values is up to the implementation, so
//! bit-for-bit agreement with the thread and hub runtimes is not promised.

use super::{check_root, Collective, CollectiveError, ReduceOp};
use ::mpi::collective::SystemOperation;
use ::mpi::environment::Universe;
use ::mpi::topology::SimpleCommunicator;
use ::mpi::traits::*;

/// Communicator for one rank of an MPI job
pub struct MpiComm {
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
    // Finalizes MPI on drop, after `world`
    _universe: Universe,
}

impl MpiComm {
    /// Initialize MPI and join the world communicator
    ///
    /// Fails if MPI was already initialized in this process.
    pub fn initialize() -> crate::Result<Self> {
        let universe = ::mpi::initialize()
            .ok_or_else(|| anyhow::anyhow!("MPI is already initialized in this process"))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;

        Ok(Self {
            world,
            rank,
            size,
            _universe: universe,
        })
    }
}

fn system_op(op: ReduceOp) -> SystemOperation {
    match op {
        ReduceOp::Sum => SystemOperation::sum(),
        ReduceOp::Max => SystemOperation::max(),
        ReduceOp::Min => SystemOperation::min(),
    }
}

impl Collective for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), CollectiveError> {
        self.world.barrier();
        Ok(())
    }

    fn reduce(
        &self,
        value: f64,
        op: ReduceOp,
        root: usize,
    ) -> Result<Option<f64>, CollectiveError> {
        check_root(root, self.size)?;
        let root_process = self.world.process_at_rank(root as i32);

        if self.rank == root {
            let mut result = 0.0f64;
            root_process.reduce_into_root(&value, &mut result, system_op(op));
            Ok(Some(result))
        } else {
            root_process.reduce_into(&value, system_op(op));
            Ok(None)
        }
    }
}
