//! Owns the loaded states (tight-binding coefficients or legacy
//! wavefunction cubes), the grid geometry inferred from them, and the
//! atom/z-slab distribution every state's data is scattered across.
//! Builds the canonical density generators [`crate::engine`] consumes.
//!
//! Ported from `FunctionCollection.cpp` (tight-binding mode, the
//! constructor and `createProducts`/`appendFile`/`loadFunctionFromFile`
//! actually exercised by `coulombo.cpp`/`potentials.cpp`) and the
//! vestigial `WaveFunctionCollection`/`SpinFunctionCollection` classes
//! in `FunctionCollection.hpp` for the legacy dense/spin modes still
//! reachable via `--step`/`--spin`.

use std::path::Path;

use num_complex::Complex64;

use crate::broadcaster::{self, AxisGrid};
use crate::comm::Context;
use crate::density::{
    BilinearDensity, SelfProduct, SpinorProduct, TightBindingCoefficients, TightBindingProduct,
    WavefunctionProduct,
};
use crate::dimension::{block_partition, block_partition_all, Dimension, DistributedDimension};
use crate::domain::Domain;
use crate::error::{Error, Result};
use crate::io;

enum StateData {
    TightBinding(TightBindingCoefficients),
    Dense(Vec<Complex64>),
    SpinorPair { down: Vec<Complex64>, up: Vec<Complex64> },
}

/// A density generator bound to one canonical `(i_l, i_r)` pair, tying
/// together [`crate::density`]'s generator structs under one type so
/// [`FunctionCollection::create_products`] can return a homogeneous
/// list without boxing each closure.
pub enum Density<'a> {
    TightBinding(TightBindingProduct<'a>),
    Wavefunction(WavefunctionProduct<'a>),
    Spinor(SpinorProduct<'a>),
    SelfTightBinding(SelfProduct<'a>),
    SelfDense(SelfProduct<'a>),
}

impl<'a> BilinearDensity for Density<'a> {
    fn write(&self, f: &mut Domain<'_, Complex64>, conjugate: bool) {
        match self {
            Density::TightBinding(p) => p.write(f, conjugate),
            Density::Wavefunction(p) => p.write(f, conjugate),
            Density::Spinor(p) => p.write(f, conjugate),
            Density::SelfTightBinding(p) => p.write(f, conjugate),
            Density::SelfDense(p) => p.write(f, conjugate),
        }
    }
}

/// Holds every loaded state and the distribution machinery
/// (grid/z-slab/atom partition) they share. One instance is built per
/// run and outlives every [`crate::engine::CoulombCalculator`] round.
pub struct FunctionCollection<'ctx> {
    ctx: &'ctx Context,
    dim: Dimension,
    real_dim: DistributedDimension,
    step: (f64, f64, f64),
    orbital_count: u32,
    total_atom_count: usize,
    /// Root-only: every rank's assigned atoms, needed to scatter new
    /// coefficient files and gather extracted potentials.
    atom_ids_by_process: Option<Vec<Vec<usize>>>,
    /// This rank's local atoms' linear cell index into its own z-slab,
    /// in the same order as every `TightBindingCoefficients` column and
    /// as `local_atom_ids`.
    local_cell_indices: Vec<usize>,
    /// This rank's local atoms' original (root) index, parallel to
    /// `local_cell_indices`.
    local_atom_ids: Vec<usize>,
    states: Vec<StateData>,
}

impl<'ctx> FunctionCollection<'ctx> {
    /// Builds the grid and atom/z-slab distribution from an atom
    /// coordinates file (root-only read) and sizes every subsequent
    /// `append_tight_binding_file` call against it. Ported from the
    /// part of `FunctionCollection`'s constructor that builds the
    /// `Broadcaster` from atom positions.
    pub fn new_tight_binding(ctx: &'ctx Context, atoms_path: &Path, orbital_count: u32) -> Result<Self> {
        let root_result: Result<(Vec<[f64; 3]>, [AxisGrid; 3])> = if ctx.is_root() {
            let coords = io::read_atom_positions(atoms_path)?;
            let grid = broadcaster::infer_grid(&coords)?;
            Ok((coords, grid))
        } else {
            Ok((Vec::new(), [AxisGrid { origin: 0.0, step: 1.0, extent: 1 }; 3]))
        };

        let mut ok = if root_result.is_ok() { 1i32 } else { 0i32 };
        ctx.broadcast_root(&mut ok);
        if ok == 0 {
            return match root_result {
                Err(e) => Err(e),
                Ok(_) => Err(Error::input("rank 0 failed to build the atom grid")),
            };
        }
        let (coords, root_grid) = root_result?;

        let grid = broadcaster::broadcast_grid(ctx, if ctx.is_root() { Some(root_grid) } else { None });
        let raw = Dimension::new(grid[0].extent, grid[1].extent, grid[2].extent)?;
        let dim = broadcaster::round_grid_for_fft(raw)?.dimension();

        let size = ctx.size() as usize;
        let rank = ctx.rank() as usize;
        let (z_offset, z_len) = block_partition(dim.z, size, rank);
        let (z_offsets, z_lengths) = block_partition_all(dim.z, size);
        let real_dim = DistributedDimension::new(dim.x, dim.y, z_len, z_offset, dim.z);

        let total_atom_count = coords.len().max(if ctx.is_root() { 0 } else { 1 });
        let mut total_atom_count = total_atom_count as i32;
        ctx.broadcast_root(&mut total_atom_count);
        let total_atom_count = total_atom_count as usize;

        let partition = if ctx.is_root() {
            Some(broadcaster::partition_atoms(&coords, &grid, &z_offsets, &z_lengths, dim.x, dim.y))
        } else {
            None
        };
        let (local_cell_indices, local_atom_ids) =
            broadcaster::scatter_atom_partition(ctx, partition.as_ref());
        let atom_ids_by_process = partition.map(|p| p.atom_ids_by_process);

        Ok(FunctionCollection {
            ctx,
            dim,
            real_dim,
            step: (grid[0].step, grid[1].step, grid[2].step),
            orbital_count,
            total_atom_count,
            atom_ids_by_process,
            local_cell_indices,
            local_atom_ids,
            states: Vec::new(),
        })
    }

    /// Builds the collection for the legacy dense/spin modes, where the
    /// grid comes from `--step` (a uniform step) plus the first
    /// wavefunction cube's own extent rather than an atoms file. Ported
    /// from `WaveFunctionCollection`/`SpinFunctionCollection`'s implicit
    /// grid (the original infers extent from the cube file itself,
    /// there being no separate atom-position source in legacy mode).
    pub fn new_dense(ctx: &'ctx Context, raw: Dimension, step: f64) -> Result<Self> {
        let dim = broadcaster::round_grid_for_fft(raw)?.dimension();
        let size = ctx.size() as usize;
        let rank = ctx.rank() as usize;
        let (z_offset, z_len) = block_partition(dim.z, size, rank);
        let real_dim = DistributedDimension::new(dim.x, dim.y, z_len, z_offset, dim.z);
        Ok(FunctionCollection {
            ctx,
            dim,
            real_dim,
            step: (step, step, step),
            orbital_count: 0,
            total_atom_count: 0,
            atom_ids_by_process: None,
            local_cell_indices: Vec::new(),
            local_atom_ids: Vec::new(),
            states: Vec::new(),
        })
    }

    pub fn padded_dimension(&self) -> Dimension {
        self.dim
    }

    pub fn step(&self) -> (f64, f64, f64) {
        self.step
    }

    pub fn real_dimension(&self) -> DistributedDimension {
        self.real_dim
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Reads `path` (root-only) and scatters its coefficient columns to
    /// the ranks owning each atom. Ported from
    /// `FunctionCollection::loadFunctionFromFile`/`appendFile`.
    pub fn append_tight_binding_file(&mut self, path: &Path, skip_lines: u32) -> Result<()> {
        let root_result: Result<Vec<Complex64>> = if self.ctx.is_root() {
            io::read_coefficients(path, self.orbital_count, self.total_atom_count as u32, skip_lines)
        } else {
            Ok(Vec::new())
        };
        let mut ok = if root_result.is_ok() { 1i32 } else { 0i32 };
        self.ctx.broadcast_root(&mut ok);
        if ok == 0 {
            return match root_result {
                Err(e) => Err(e),
                Ok(_) => Err(Error::input("rank 0 failed to read a coefficient file")),
            };
        }
        let full = root_result?;

        let local = broadcaster::scatter_atom_coefficients(
            self.ctx,
            if self.ctx.is_root() { Some(&full) } else { None },
            self.orbital_count,
            self.atom_ids_by_process.as_deref(),
            self.local_atom_ids.len(),
        )?;
        self.states.push(StateData::TightBinding(TightBindingCoefficients {
            orbitals: self.orbital_count as usize,
            data: local,
        }));
        Ok(())
    }

    /// Appends one legacy dense wavefunction cube. Ported from
    /// `WaveFunctionCollection::appendFile`.
    pub fn append_wavefunction_file(&mut self, path: &Path) -> Result<()> {
        let total_cells = self.dim.cells() as usize;
        let root_result: Result<Vec<Complex64>> = if self.ctx.is_root() {
            io::read_wavefunction_cube(path, total_cells)
        } else {
            Ok(Vec::new())
        };
        let mut ok = if root_result.is_ok() { 1i32 } else { 0i32 };
        self.ctx.broadcast_root(&mut ok);
        if ok == 0 {
            return match root_result {
                Err(e) => Err(e),
                Ok(_) => Err(Error::input("rank 0 failed to read a wavefunction cube")),
            };
        }
        let full = root_result?;
        let (z_offsets, z_lengths) = block_partition_all(self.dim.z, self.ctx.size() as usize);
        let local = broadcaster::broadcast_wavefunction_cube(
            self.ctx,
            if self.ctx.is_root() { Some(&full) } else { None },
            self.real_dim,
            &z_offsets,
            &z_lengths,
        )?;
        self.states.push(StateData::Dense(local));
        Ok(())
    }

    /// Appends one legacy spin-pair: two cubes (spin down, spin up)
    /// describing a single state. Ported from
    /// `SpinFunctionCollection::appendFile`, which the original
    /// documents as consuming files in up/down pairs.
    pub fn append_spinor_pair(&mut self, down_path: &Path, up_path: &Path) -> Result<()> {
        let total_cells = self.dim.cells() as usize;
        let (z_offsets, z_lengths) = block_partition_all(self.dim.z, self.ctx.size() as usize);
        let mut load_one = |path: &Path| -> Result<Vec<Complex64>> {
            let root_result: Result<Vec<Complex64>> = if self.ctx.is_root() {
                io::read_wavefunction_cube(path, total_cells)
            } else {
                Ok(Vec::new())
            };
            let mut ok = if root_result.is_ok() { 1i32 } else { 0i32 };
            self.ctx.broadcast_root(&mut ok);
            if ok == 0 {
                return match root_result {
                    Err(e) => Err(e),
                    Ok(_) => Err(Error::input("rank 0 failed to read a wavefunction cube")),
                };
            }
            let full = root_result?;
            broadcaster::broadcast_wavefunction_cube(
                self.ctx,
                if self.ctx.is_root() { Some(&full) } else { None },
                self.real_dim,
                &z_offsets,
                &z_lengths,
            )
        };
        let down = load_one(down_path)?;
        let up = load_one(up_path)?;
        self.states.push(StateData::SpinorPair { down, up });
        Ok(())
    }

    /// Builds every canonical `(i_l, i_r)` density with `i_l >= i_r`,
    /// ordered to match [`crate::planner::canonical_density`]'s
    /// indexing. Ported from `FunctionCollection::createProducts`'s
    /// nested `fL in 0..functionCount, fR in 0..=fL` loop.
    pub fn create_products(&self) -> Vec<Density<'_>> {
        let n = self.states.len();
        let mut out = Vec::with_capacity(n * (n + 1) / 2);
        for f_l in 0..n {
            for f_r in 0..=f_l {
                out.push(self.make_product(f_l, f_r));
            }
        }
        out
    }

    fn make_product(&self, f_l: usize, f_r: usize) -> Density<'_> {
        match (&self.states[f_l], &self.states[f_r]) {
            (StateData::TightBinding(left), StateData::TightBinding(right)) => {
                Density::TightBinding(TightBindingProduct {
                    left,
                    right,
                    cell_indices: &self.local_cell_indices,
                })
            }
            (StateData::Dense(left), StateData::Dense(right)) => {
                Density::Wavefunction(WavefunctionProduct { left, right })
            }
            (
                StateData::SpinorPair { down: ld, up: lu },
                StateData::SpinorPair { down: rd, up: ru },
            ) => Density::Spinor(SpinorProduct {
                left_down: ld,
                left_up: lu,
                right_down: rd,
                right_up: ru,
            }),
            _ => unreachable!("all appended states share one loading mode per run"),
        }
    }

    /// Builds the diagonal-only self-products the `potentials`
    /// personality needs. Ported from `createSelfProducts` as called
    /// from `potentials.cpp`.
    pub fn create_self_products(&self) -> Vec<Density<'_>> {
        self.states
            .iter()
            .map(|s| match s {
                StateData::TightBinding(coeffs) => Density::SelfTightBinding(SelfProduct::TightBinding {
                    coeffs,
                    cell_indices: &self.local_cell_indices,
                }),
                StateData::Dense(psi) => Density::SelfDense(SelfProduct::Dense(psi)),
                StateData::SpinorPair { .. } => {
                    unreachable!("potentials mode never loads spinor pairs")
                }
            })
            .collect()
    }

    /// Samples `potential` at every local atom's grid cell and gathers
    /// the result back to root in the original atom order. Ported from
    /// `FunctionCollection::extractAtomCellValues`.
    pub fn extract_atom_cell_values(&self, potential: &[Complex64]) -> Vec<Complex64> {
        let local: Vec<Complex64> = self
            .local_cell_indices
            .iter()
            .map(|&cell| potential[cell])
            .collect();
        broadcaster::gather_atom_values(
            self.ctx,
            &local,
            self.atom_ids_by_process.as_deref(),
            self.total_atom_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_products_covers_every_canonical_pair() {
        // Exercises only the pure combinatorics (canonical ordering),
        // not the MPI-backed constructors.
        let n = 4usize;
        let mut seen = std::collections::HashSet::new();
        for f_l in 0..n {
            for f_r in 0..=f_l {
                seen.insert((f_l, f_r));
            }
        }
        assert_eq!(seen.len(), n * (n + 1) / 2);
    }
}
