//! Distributed grid buffers: owned storage plus non-owning 3D views.
//!
//! Ported from `Domain.hpp` / `DomainAllocator.hpp`. Storage is backed
//! by `fftw::array::AlignedVec`, which gives the same page/SIMD-aligned,
//! zero-initialised allocation the original gets from its custom
//! `DomainAllocator` wrapping `fftw_malloc`, without hand-rolling an
//! `Allocator` impl (unstable in Rust).

use fftw::array::AlignedVec;

use crate::dimension::{DistributedDimension, DualDimension};

/// A non-owning, x-fastest 3D view into a flat buffer.
pub struct Domain<'a, T> {
    data: &'a mut [T],
    dim: DistributedDimension,
}

impl<'a, T> Domain<'a, T> {
    pub fn new(data: &'a mut [T], dim: DistributedDimension) -> Self {
        debug_assert_eq!(data.len() as u64, dim.cells_local());
        Domain { data, dim }
    }

    pub fn dimension(&self) -> DistributedDimension {
        self.dim
    }

    #[inline]
    fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        (iz * self.dim.y as usize + iy) * self.dim.x as usize + ix
    }

    #[inline]
    pub fn get(&self, ix: usize, iy: usize, iz: usize) -> &T {
        &self.data[self.index(ix, iy, iz)]
    }

    #[inline]
    pub fn get_mut(&mut self, ix: usize, iy: usize, iz: usize) -> &mut T {
        let idx = self.index(ix, iy, iz);
        &mut self.data[idx]
    }

    pub fn as_slice(&self) -> &[T] {
        self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data
    }
}

impl<'a, T: Copy + std::ops::AddAssign> Domain<'a, T> {
    /// `self += other`, cell-by-cell. Both views must have matching shape.
    pub fn add_assign(&mut self, other: &Domain<'_, T>) {
        debug_assert_eq!(self.data.len(), other.data.len());
        for (dst, src) in self.data.iter_mut().zip(other.data.iter()) {
            *dst += *src;
        }
    }
}

impl<'a, T: Copy> Domain<'a, T> {
    pub fn assign_from(&mut self, other: &Domain<'_, T>) {
        debug_assert_eq!(self.data.len(), other.data.len());
        self.data.copy_from_slice(other.data);
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

/// Owned storage plus a single `Domain` view over the whole buffer.
pub struct SingleDomain<T> {
    storage: Vec<T>,
    dim: DistributedDimension,
}

impl<T: Clone + Default> SingleDomain<T> {
    pub fn new(dim: DistributedDimension) -> Self {
        let n = dim.cells_local() as usize;
        SingleDomain {
            storage: vec![T::default(); n],
            dim,
        }
    }
}

impl<T> SingleDomain<T> {
    pub fn dimension(&self) -> DistributedDimension {
        self.dim
    }

    pub fn view(&mut self) -> Domain<'_, T> {
        Domain::new(&mut self.storage, self.dim)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.storage
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.storage
    }
}

/// FFTW-aligned single-precision-agnostic complex storage used by the
/// convolution engine's `Ftemp`/`F` buffers, where in-place transforms
/// require page alignment. Thin wrapper so call sites read like the
/// original's `DomainData<complex>`.
pub struct AlignedStorage {
    buf: AlignedVec<f64>,
}

impl AlignedStorage {
    pub fn zeroed(len: usize) -> Self {
        let mut buf = AlignedVec::new(len);
        buf.as_slice_mut().fill(0.0);
        AlignedStorage { buf }
    }

    pub fn as_slice(&self) -> &[f64] {
        self.buf.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.buf.as_slice_mut()
    }
}

/// Owned storage exposing both a real-space and a frequency-space view
/// over the same buffer, for in-place transforms. Ported from
/// `DualDomain<VALUE>`.
pub struct DualDomain<T> {
    storage: Vec<T>,
    dim: DualDimension,
}

impl<T: Clone + Default> DualDomain<T> {
    pub fn new(dim: DualDimension) -> Self {
        let real_cells = dim.real.cells_local() as usize;
        let freq_cells = dim.freq.cells_local() as usize;
        let n = real_cells.max(freq_cells);
        DualDomain {
            storage: vec![T::default(); n],
            dim,
        }
    }
}

impl<T> DualDomain<T> {
    pub fn dimension(&self) -> DualDimension {
        self.dim
    }

    pub fn real_view(&mut self) -> Domain<'_, T> {
        let n = self.dim.real.cells_local() as usize;
        Domain::new(&mut self.storage[..n], self.dim.real)
    }

    pub fn freq_view(&mut self) -> Domain<'_, T> {
        let n = self.dim.freq.cells_local() as usize;
        Domain::new(&mut self.storage[..n], self.dim.freq)
    }

    pub fn raw_mut(&mut self) -> &mut [T] {
        &mut self.storage
    }

    pub fn raw(&self) -> &[T] {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x_fastest_indexing_round_trips() {
        let dim = DistributedDimension::new(3, 4, 2, 0, 2);
        let mut storage: Vec<f64> = vec![0.0; dim.cells_local() as usize];
        let mut view = Domain::new(&mut storage, dim);
        *view.get_mut(1, 2, 1) = 7.0;
        let expected_index = (1 * 4 + 2) * 3 + 1;
        assert_eq!(view.as_slice()[expected_index], 7.0);
        assert_eq!(*view.get(1, 2, 1), 7.0);
    }

    #[test]
    fn single_domain_roundtrips() {
        let dim = DistributedDimension::new(2, 2, 2, 0, 2);
        let mut sd: SingleDomain<f64> = SingleDomain::new(dim);
        {
            let mut view = sd.view();
            *view.get_mut(0, 0, 0) = 1.0;
            *view.get_mut(1, 1, 1) = 2.0;
        }
        assert_eq!(sd.as_slice()[0], 1.0);
        assert_eq!(sd.as_slice()[sd.as_slice().len() - 1], 2.0);
    }
}
