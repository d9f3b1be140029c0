//! Grid geometry: raw, padded, distributed, and dual dimensions.
//!
//! Ported from `Dimension.{hpp,cpp}` and `Round.hpp` in the original
//! implementation. `Dimension` is the plain (x,y,z) extent; the other
//! three types describe progressively more specialised views used by
//! the distributed FFT machinery in [`crate::engine`].

use crate::error::{Error, Result};

/// A positive three-dimensional extent.
///
/// Construction rejects zero/negative axes (expressed here as the
/// inability to represent them: axes are `u32`) and rejects a total
/// cell count that would overflow `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimension {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dimension {
    /// Builds a dimension, checking that x,y,z are all positive and that
    /// their product fits in a `u64`.
    pub fn new(x: u32, y: u32, z: u32) -> Result<Self> {
        if x == 0 || y == 0 || z == 0 {
            return Err(Error::logic(format!(
                "dimension axes must be positive, got ({x}, {y}, {z})"
            )));
        }
        (x as u64)
            .checked_mul(y as u64)
            .and_then(|xy| xy.checked_mul(z as u64))
            .ok_or_else(|| {
                Error::logic(format!("dimension ({x}, {y}, {z}) overflows cell count"))
            })?;
        Ok(Dimension { x, y, z })
    }

    /// Total number of cells, as a `u64` (never overflows by construction).
    pub fn cells(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    /// Component-wise `+1` on every axis.
    pub fn plusone(&self) -> Dimension {
        Dimension {
            x: self.x + 1,
            y: self.y + 1,
            z: self.z + 1,
        }
    }

    /// Component-wise doubling; `twice().cells() == 8 * cells()`.
    pub fn twice(&self) -> Dimension {
        Dimension {
            x: self.x * 2,
            y: self.y * 2,
            z: self.z * 2,
        }
    }
}

/// Smallest integer `>= n` of the form `c * product(bases[i]^e_i)`.
///
/// Generalises `Round::up<first,second,...>(n, c)` from the original
/// C++ (a variadic template) over a runtime slice of prime bases, since
/// Rust has no variadic template parameter packs. `bases` is expected to
/// be a short list of small primes (`&[2, 3, 5]` in every call site this
/// crate makes).
pub fn round_up_smooth(n: u32, bases: &[u32], c: u32) -> u32 {
    assert!(c >= 1, "base divisor must be positive");
    assert!(!bases.is_empty(), "need at least one prime base");
    if n <= c {
        return c;
    }
    let mut best = u64::MAX;
    let target = n as u64;
    let c = c as u64;
    fn recurse(bases: &[u32], idx: usize, current: u64, target: u64, best: &mut u64) {
        if current >= target {
            if current < *best {
                *best = current;
            }
            return;
        }
        if idx == bases.len() {
            return;
        }
        // Either stop multiplying by this base and move to the next,
        // or multiply by it again (bounded by not exceeding `best`/target headroom).
        recurse(bases, idx + 1, current, target, best);
        let base = bases[idx] as u64;
        let mut next = current;
        while next < target {
            next *= base;
            recurse(bases, idx + 1, next, target, best);
        }
    }
    recurse(bases, 0, c, target, &mut best);
    best as u32
}

/// Per-rank `(offset, length)` for a contiguous-block partition of `n`
/// items across `size` ranks: `ceil(n / size)`-sized blocks with a
/// short (possibly empty) last block. Used to distribute both the
/// padded grid's z axis and the kernel spectrum's transposed y axis.
pub fn block_partition(n: u32, size: usize, rank: usize) -> (u32, u32) {
    let block = (n as usize + size - 1) / size;
    let off = (block * rank).min(n as usize);
    let len = block.min(n as usize - off);
    (off as u32, len as u32)
}

/// `block_partition` for every rank at once.
pub fn block_partition_all(n: u32, size: usize) -> (Vec<u32>, Vec<u32>) {
    let mut offsets = vec![0u32; size];
    let mut lengths = vec![0u32; size];
    for p in 0..size {
        let (o, l) = block_partition(n, size, p);
        offsets[p] = o;
        lengths[p] = l;
    }
    (offsets, lengths)
}

/// `Dimension` rounded up to FFT-friendly ({2,3,5}-smooth) axis sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaddedDimension(pub Dimension);

impl PaddedDimension {
    /// Rounds `raw` up component-wise, optionally respecting a base
    /// divisor `c` (used when a field has a built-in sub-block factor,
    /// e.g. the doubled grid already carries a factor of 2).
    pub fn from_raw(raw: Dimension, c: u32) -> Result<Self> {
        const BASES: [u32; 3] = [2, 3, 5];
        Ok(PaddedDimension(Dimension::new(
            round_up_smooth(raw.x, &BASES, c),
            round_up_smooth(raw.y, &BASES, c),
            round_up_smooth(raw.z, &BASES, c),
        )?))
    }

    pub fn dimension(&self) -> Dimension {
        self.0
    }
}

/// A `Dimension` extended with a per-process z-slab.
///
/// This process owns z-indices `[z_offset, z_offset + z)` of a grid
/// whose full z extent is `z_full`. A process may legitimately own
/// `z == 0` slices (it still participates in collectives).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DistributedDimension {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub z_offset: u32,
    pub z_full: u32,
}

impl DistributedDimension {
    pub fn new(x: u32, y: u32, z: u32, z_offset: u32, z_full: u32) -> Self {
        DistributedDimension {
            x,
            y,
            z,
            z_offset,
            z_full,
        }
    }

    pub fn local(&self) -> Dimension {
        // z may legitimately be zero on this process; Dimension::new
        // would reject that, so build the triple by hand for local().
        Dimension {
            x: self.x,
            y: self.y,
            z: self.z.max(1),
        }
    }

    /// Number of cells in the local slab (x * y * z, z may be 0).
    pub fn cells_local(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    /// Number of cells in the full (undistributed) grid.
    pub fn cells_full(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z_full as u64
    }
}

/// Bundles the real-space and frequency-space views of one distributed,
/// in-place-transformable buffer.
///
/// The frequency view is y<->z transposed, matching
/// `FFTW_MPI_TRANSPOSED_OUT`: its "z" axis is physically the original
/// y-extent, and its z_full equals the original y extent. Ported from
/// `DualDimension`, which derives both views from
/// `fftw_mpi_local_size_3d_transposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DualDimension {
    pub real: DistributedDimension,
    pub freq: DistributedDimension,
}

impl DualDimension {
    /// Builds both views given the full padded dimension and this
    /// process's local extents in both layouts, as reported by the
    /// FFT library's MPI sizing call.
    pub fn new(
        full: Dimension,
        real_z: u32,
        real_z_offset: u32,
        freq_y: u32,
        freq_y_offset: u32,
    ) -> Self {
        DualDimension {
            real: DistributedDimension::new(full.x, full.y, real_z, real_z_offset, full.z),
            freq: DistributedDimension::new(full.x, freq_y, real_z, freq_y_offset, full.y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_and_derived_shapes() {
        let d = Dimension::new(3, 4, 5).unwrap();
        assert_eq!(d.cells(), 60);
        assert_eq!(d.twice().cells(), 8 * 60);
        assert_eq!(d.plusone(), Dimension::new(4, 5, 6).unwrap());
    }

    #[test]
    fn negative_or_overflowing_dimension_fails() {
        assert!(Dimension::new(0, 4, 5).is_err());
        assert!(Dimension::new(u32::MAX, u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn round_up_matches_examples() {
        assert_eq!(round_up_smooth(101, &[2, 3, 5], 1), 108);
        assert_eq!(round_up_smooth(17, &[2, 3, 5], 4), 20);
        assert_eq!(round_up_smooth(17, &[2], 1), 32);
    }

    #[test]
    fn padded_dimension_rounds_each_axis() {
        let raw = Dimension::new(101, 17, 17).unwrap();
        let padded = PaddedDimension::from_raw(raw, 1).unwrap();
        assert_eq!(padded.dimension(), Dimension::new(108, 18, 18).unwrap());
    }

    #[test]
    fn distributed_dimension_cells() {
        let dd = DistributedDimension::new(4, 4, 2, 2, 8);
        assert_eq!(dd.cells_local(), 32);
        assert_eq!(dd.cells_full(), 128);
    }
}
