//! In-process collective provider backed by threads.
//!
//! Each participating thread holds one [`ThreadComm`] handle; the handles
//! share a staging buffer guarded by a mutex and synchronize with a barrier.
//! Intended for exercising the parallel optimizer without an MPI runtime,
//! in tests and on a single machine.

use std::sync::{Arc, Barrier, Mutex};

use super::Communicator;

struct Shared {
    size: usize,
    barrier: Barrier,
    stage: Mutex<Vec<f64>>,
    stage_u64: Mutex<Vec<u64>>,
}

/// One rank's handle to an in-process communicator group.
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    /// Create a group of `size` connected handles, one per thread.
    pub fn create(size: usize) -> Vec<ThreadComm> {
        assert!(size > 0, "communicator group must have at least one rank");
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            stage: Mutex::new(Vec::new()),
            stage_u64: Mutex::new(Vec::new()),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn broadcast(&self, buf: &mut [f64], root: usize) {
        if self.rank == root {
            let mut stage = self.shared.stage.lock().unwrap();
            stage.clear();
            stage.extend_from_slice(buf);
        }
        self.shared.barrier.wait();
        if self.rank != root {
            let stage = self.shared.stage.lock().unwrap();
            buf.copy_from_slice(&stage);
        }
        self.shared.barrier.wait();
    }

    fn broadcast_u64(&self, buf: &mut [u64], root: usize) {
        if self.rank == root {
            let mut stage = self.shared.stage_u64.lock().unwrap();
            stage.clear();
            stage.extend_from_slice(buf);
        }
        self.shared.barrier.wait();
        if self.rank != root {
            let stage = self.shared.stage_u64.lock().unwrap();
            buf.copy_from_slice(&stage);
        }
        self.shared.barrier.wait();
    }

    fn scatter(&self, send: &[f64], recv: &mut [f64], root: usize) {
        if self.rank == root {
            let mut stage = self.shared.stage.lock().unwrap();
            stage.clear();
            stage.extend_from_slice(send);
        }
        self.shared.barrier.wait();
        {
            let stage = self.shared.stage.lock().unwrap();
            let width = recv.len();
            recv.copy_from_slice(&stage[self.rank * width..(self.rank + 1) * width]);
        }
        self.shared.barrier.wait();
    }

    fn gather(&self, send: &[f64], recv: &mut [f64], root: usize) {
        let width = send.len();
        {
            let mut stage = self.shared.stage.lock().unwrap();
            stage.resize(self.shared.size * width, 0.0);
            stage[self.rank * width..(self.rank + 1) * width].copy_from_slice(send);
        }
        self.shared.barrier.wait();
        if self.rank == root {
            let stage = self.shared.stage.lock().unwrap();
            recv.copy_from_slice(&stage);
        }
        self.shared.barrier.wait();
    }

    fn all_reduce_sum(&self, local: f64) -> f64 {
        {
            let mut stage = self.shared.stage.lock().unwrap();
            stage.resize(self.shared.size, 0.0);
            stage[self.rank] = local;
        }
        self.shared.barrier.wait();
        // Summed in rank order so every rank sees the identical total.
        let total = {
            let stage = self.shared.stage.lock().unwrap();
            stage.iter().sum()
        };
        self.shared.barrier.wait();
        total
    }

    fn all_reduce_sum_vec(&self, local: &mut [f64]) {
        let len = local.len();
        {
            let mut stage = self.shared.stage.lock().unwrap();
            stage.resize(self.shared.size * len, 0.0);
            stage[self.rank * len..(self.rank + 1) * len].copy_from_slice(local);
        }
        self.shared.barrier.wait();
        {
            let stage = self.shared.stage.lock().unwrap();
            for (i, out) in local.iter_mut().enumerate() {
                let mut sum = 0.0;
                for r in 0..self.shared.size {
                    sum += stage[r * len + i];
                }
                *out = sum;
            }
        }
        self.shared.barrier.wait();
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }
}
