//! MPI-backed collective provider.
//!
//! Requires the `distributed` feature and an MPI installation. The caller
//! must initialize MPI before constructing [`MpiComm`] and keep the universe
//! alive for the duration of the run:
//!
//! ```ignore
//! let _universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new();
//! let gamma = rcg_optl_par(&comm, input, &alpha0, tol, maxiters)?;
//! ```
//!
//! A failure inside any collective aborts the whole process group.

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

/// Collective operations over the MPI world communicator.
pub struct MpiComm;

impl MpiComm {
    /// Create a new MPI provider. Panics if MPI has not been initialized.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MpiComm {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Communicator for MpiComm {
    fn rank(&self) -> usize {
        SimpleCommunicator::world().rank() as usize
    }

    fn size(&self) -> usize {
        SimpleCommunicator::world().size() as usize
    }

    fn broadcast(&self, buf: &mut [f64], root: usize) {
        let world = SimpleCommunicator::world();
        world.process_at_rank(root as i32).broadcast_into(buf);
    }

    fn broadcast_u64(&self, buf: &mut [u64], root: usize) {
        let world = SimpleCommunicator::world();
        world.process_at_rank(root as i32).broadcast_into(buf);
    }

    fn scatter(&self, send: &[f64], recv: &mut [f64], root: usize) {
        let world = SimpleCommunicator::world();
        let root_process = world.process_at_rank(root as i32);
        if world.rank() == root as i32 {
            root_process.scatter_into_root(send, recv);
        } else {
            root_process.scatter_into(recv);
        }
    }

    fn gather(&self, send: &[f64], recv: &mut [f64], root: usize) {
        let world = SimpleCommunicator::world();
        let root_process = world.process_at_rank(root as i32);
        if world.rank() == root as i32 {
            root_process.gather_into_root(send, recv);
        } else {
            root_process.gather_into(send);
        }
    }

    fn all_reduce_sum(&self, local: f64) -> f64 {
        let world = SimpleCommunicator::world();
        let mut global = 0.0f64;
        world.all_reduce_into(&local, &mut global, SystemOperation::sum());
        global
    }

    fn all_reduce_sum_vec(&self, local: &mut [f64]) {
        let world = SimpleCommunicator::world();
        let send = local.to_vec();
        world.all_reduce_into(&send[..], local, SystemOperation::sum());
    }

    fn barrier(&self) {
        SimpleCommunicator::world().barrier();
    }
}
