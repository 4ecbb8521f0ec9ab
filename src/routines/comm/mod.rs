//! Collective-operations abstraction for the data-parallel optimizer.
//!
//! The parallel driver only needs a handful of collectives; this trait keeps
//! it independent of the transport. [`SingleComm`] is the no-op one-process
//! provider, [`threads::ThreadComm`] synchronizes threads inside one process,
//! and the `distributed` feature adds an MPI-backed provider.

pub mod threads;

#[cfg(feature = "distributed")]
pub mod mpi;

/// Collective operations over a fixed group of ranks.
///
/// Every collective is a synchronization point: all ranks must call the same
/// method in the same order with consistent counts. A failure inside a
/// collective is fatal to the whole group.
pub trait Communicator {
    /// This process's rank within the group.
    fn rank(&self) -> usize;

    /// Total number of ranks in the group.
    fn size(&self) -> usize;

    /// Broadcast `buf` from `root` to every rank.
    fn broadcast(&self, buf: &mut [f64], root: usize);

    /// Broadcast small integer metadata (matrix dimensions) from `root`.
    fn broadcast_u64(&self, buf: &mut [u64], root: usize);

    /// Split `send` on `root` into `size()` equal contiguous chunks and
    /// deliver the rank-th chunk into each rank's `recv`. Non-root ranks pass
    /// an empty `send`.
    fn scatter(&self, send: &[f64], recv: &mut [f64], root: usize);

    /// Concatenate every rank's `send` into `recv` on `root`, in rank order.
    /// Non-root ranks pass an empty `recv`.
    fn gather(&self, send: &[f64], recv: &mut [f64], root: usize);

    /// Sum a local scalar across all ranks; every rank gets the total.
    fn all_reduce_sum(&self, local: f64) -> f64;

    /// Element-wise sum of a vector across all ranks, in place.
    fn all_reduce_sum_vec(&self, local: &mut [f64]);

    /// Synchronization barrier.
    fn barrier(&self);
}

/// No-op provider for single-process execution.
///
/// All operations pass data through unchanged, which makes the parallel
/// driver degenerate to the serial iteration.
pub struct SingleComm;

impl Communicator for SingleComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast(&self, _buf: &mut [f64], _root: usize) {}

    fn broadcast_u64(&self, _buf: &mut [u64], _root: usize) {}

    fn scatter(&self, send: &[f64], recv: &mut [f64], _root: usize) {
        recv.copy_from_slice(send);
    }

    fn gather(&self, send: &[f64], recv: &mut [f64], _root: usize) {
        recv.copy_from_slice(send);
    }

    fn all_reduce_sum(&self, local: f64) -> f64 {
        local
    }

    fn all_reduce_sum_vec(&self, _local: &mut [f64]) {
        // Single process: vector is already complete.
    }

    fn barrier(&self) {}
}
