//! Thin wrapper over the MPI collectives this crate uses.
//!
//! Ported from `mpi.hpp`/`mpi.cpp`, which wrap raw `MPI_*` calls behind
//! `rank()`, `root()`, `size()`, `broadcast()`, `reduce()`, `allgather()`,
//! `alltoallv()`, `barrier()`, `gather()` and throw on any non-success
//! return. `mpi` (rsmpi) already returns `Result`-free, panic-on-misuse
//! APIs built on safe collectives, so this layer's job is narrower: give
//! call sites in [`crate::engine`] and [`crate::planner`] the same small,
//! named vocabulary the original has, rather than raw `Communicator`
//! calls scattered through the codebase.

use mpi::collective::SystemOperation;
use mpi::datatype::PartitionMut;
use mpi::topology::SystemCommunicator;
use mpi::traits::*;

/// Process-wide MPI context: the communicator plus cached rank/size.
///
/// Mirrors the original's process-global `mpi::rank()`/`mpi::size()`
/// singletons, but threaded explicitly through the objects that need
/// it (per §9's "pass rank/size through explicit context" note) rather
/// than looked up from a global.
pub struct Context {
    world: SystemCommunicator,
    rank: i32,
    size: i32,
}

impl Context {
    /// Wraps the communicator handed back by `mpi::initialize()`.
    pub fn new(world: SystemCommunicator) -> Self {
        let rank = world.rank();
        let size = world.size();
        Context { world, rank, size }
    }

    pub fn world(&self) -> &SystemCommunicator {
        &self.world
    }

    pub fn rank(&self) -> i32 {
        self.rank
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    pub fn barrier(&self) {
        self.world.barrier();
    }

    /// Broadcasts `buf` from rank 0 to every rank, in place.
    pub fn broadcast_root<T: Equivalence>(&self, buf: &mut T) {
        self.world.process_at_rank(0).broadcast_into(buf);
    }

    /// Broadcasts a buffer of known length from rank 0.
    pub fn broadcast_slice_root<T: Equivalence>(&self, buf: &mut [T]) {
        self.world.process_at_rank(0).broadcast_into(buf);
    }

    /// Sums `value` across all ranks, delivering the result to rank 0
    /// only (other ranks receive a meaningless default).
    pub fn reduce_sum_to_root<T>(&self, value: T) -> T
    where
        T: Equivalence + Default + Copy,
    {
        let mut result = T::default();
        if self.is_root() {
            self.world
                .process_at_rank(0)
                .reduce_into_root(&value, &mut result, SystemOperation::sum());
        } else {
            self.world
                .process_at_rank(0)
                .reduce_into(&value, SystemOperation::sum());
        }
        result
    }

    /// Gathers one `i32` per rank into root's buffer (length `size()`).
    pub fn allgather_i32(&self, value: i32) -> Vec<i32> {
        let mut out = vec![0i32; self.size as usize];
        self.world.all_gather_into(&value, &mut out);
        out
    }

    /// Variable-size all-to-all of `f64` slices, given per-destination
    /// send counts/displacements and per-source receive
    /// counts/displacements (all in units of `f64`, matching the
    /// `sliceSize = x*y` contiguous-double datatype the original
    /// builds for the kernel-spectrum exchange).
    pub fn alltoallv_f64(
        &self,
        send: &[f64],
        send_counts: &[i32],
        send_displs: &[i32],
        recv_counts: &[i32],
        recv_displs: &[i32],
    ) -> Vec<f64> {
        let total_recv: i32 = recv_counts.iter().sum();
        let mut recv = vec![0f64; total_recv.max(0) as usize];
        {
            let send_part = mpi::datatype::Partition::new(send, send_counts, send_displs);
            let mut recv_part = PartitionMut::new(&mut recv, recv_counts, recv_displs);
            self.world.all_to_all_varcount_into(&send_part, &mut recv_part);
        }
        recv
    }

    /// Variable-size all-to-all of `i32` slices, used for scattering
    /// index arrays (atom/cell ids) rather than sample data.
    pub fn alltoallv_i32(
        &self,
        send: &[i32],
        send_counts: &[i32],
        send_displs: &[i32],
        recv_counts: &[i32],
        recv_displs: &[i32],
    ) -> Vec<i32> {
        let total_recv: i32 = recv_counts.iter().sum();
        let mut recv = vec![0i32; total_recv.max(0) as usize];
        {
            let send_part = mpi::datatype::Partition::new(send, send_counts, send_displs);
            let mut recv_part = PartitionMut::new(&mut recv, recv_counts, recv_displs);
            self.world.all_to_all_varcount_into(&send_part, &mut recv_part);
        }
        recv
    }
}
