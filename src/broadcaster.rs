//! Atom-to-grid mapping and distribution: infers a common grid
//! origin/step from atom coordinates, maps atoms to cell indices, and
//! scatters per-atom data across z-slabs.
//!
//! Ported from `Broadcaster.{hpp,cpp}` for the scatter mechanics, and
//! from §4.5's tolerant-GCD description (no standalone GCD source file
//! exists in `original_source/`; the algorithm is implemented exactly
//! as spec.md §4.5/§9 documents it, not re-derived).

use num_complex::Complex64;

use crate::comm::Context;
use crate::dimension::{Dimension, DistributedDimension, PaddedDimension};
use crate::error::{Error, Result};

const ZERO_CUTOFF: f64 = 1e-10;
const FAILURE_THRESHOLD: f64 = 1e-2;

/// Inferred grid geometry for one axis: origin, step, and point count.
#[derive(Debug, Clone, Copy)]
pub struct AxisGrid {
    pub origin: f64,
    pub step: f64,
    pub extent: u32,
}

/// Tolerant Euclidean GCD over a sorted list of positive residues,
/// treating anything below `ZERO_CUTOFF` as exactly zero and failing
/// if the final residue exceeds `FAILURE_THRESHOLD`. Ported from §4.5.
fn tolerant_gcd(values: &[f64]) -> Result<f64> {
    let mut values: Vec<f64> = values.iter().copied().filter(|v| *v > ZERO_CUTOFF).collect();
    if values.is_empty() {
        return Err(Error::input("no distinct atom coordinates along this axis"));
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut gcd = values[0];
    for &v in &values[1..] {
        gcd = euclid_residue(gcd, v)?;
    }
    if gcd > FAILURE_THRESHOLD {
        return Err(Error::input(
            "could not infer a common grid step along this axis",
        ));
    }
    Ok(gcd)
}

fn euclid_residue(mut a: f64, mut b: f64) -> Result<f64> {
    // a, b > ZERO_CUTOFF on entry.
    loop {
        let r = a - (a / b).round() * b;
        let r = r.abs();
        if r < ZERO_CUTOFF {
            return Ok(b);
        }
        if r > FAILURE_THRESHOLD {
            return Err(Error::input(
                "residue too large while inferring common grid step",
            ));
        }
        a = b;
        b = r;
    }
}

/// Infers origin/step/extent for each of the three axes from the full
/// set of atom coordinates (root-only data). Ported from the
/// grid-inference half of `Broadcaster`'s constructor.
pub fn infer_grid(coords: &[[f64; 3]]) -> Result<[AxisGrid; 3]> {
    if coords.is_empty() {
        return Err(Error::input("no atom coordinates supplied"));
    }
    let mut grids = Vec::with_capacity(3);
    for axis in 0..3 {
        let mut values: Vec<f64> = coords.iter().map(|c| c[axis]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let min = values[0];
        let max = *values.last().unwrap();
        let diffs: Vec<f64> = values
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|d| *d > ZERO_CUTOFF)
            .collect();
        let step = if diffs.is_empty() {
            1.0
        } else {
            tolerant_gcd(&diffs)?
        };
        let extent = if step > 0.0 {
            ((max - min) / step).round() as u32 + 1
        } else {
            1
        };
        grids.push(AxisGrid {
            origin: min,
            step,
            extent,
        });
    }
    Ok([grids[0], grids[1], grids[2]])
}

/// Broadcasts root's inferred grid to every rank. `grid` is only read
/// on root; other callers pass `None`.
pub fn broadcast_grid(ctx: &Context, grid: Option<[AxisGrid; 3]>) -> [AxisGrid; 3] {
    let mut origins = [0f64; 3];
    let mut steps = [0f64; 3];
    let mut extents = [0u32; 3];
    if let Some(g) = grid {
        for axis in 0..3 {
            origins[axis] = g[axis].origin;
            steps[axis] = g[axis].step;
            extents[axis] = g[axis].extent;
        }
    }
    ctx.broadcast_slice_root(&mut origins);
    ctx.broadcast_slice_root(&mut steps);
    ctx.broadcast_slice_root(&mut extents);
    [
        AxisGrid { origin: origins[0], step: steps[0], extent: extents[0] },
        AxisGrid { origin: origins[1], step: steps[1], extent: extents[1] },
        AxisGrid { origin: origins[2], step: steps[2], extent: extents[2] },
    ]
}

/// Rounds the raw inferred extent up to an FFT-friendly size.
pub fn round_grid_for_fft(raw: Dimension) -> Result<PaddedDimension> {
    PaddedDimension::from_raw(raw, 1)
}

/// Maps one atom's coordinate to integer grid indices
/// `(ix, iy, iz) = round((coord - origin) / step)`.
pub fn atom_cell(coord: [f64; 3], grid: &[AxisGrid; 3]) -> (u32, u32, u32) {
    let ix = ((coord[0] - grid[0].origin) / grid[0].step).round() as u32;
    let iy = ((coord[1] - grid[1].origin) / grid[1].step).round() as u32;
    let iz = ((coord[2] - grid[2].origin) / grid[2].step).round() as u32;
    (ix, iy, iz)
}

/// Per-process z-slab partitioning of atoms in root's original order.
/// Ported from the z-offset comparison described in §4.5.
pub struct AtomPartition {
    /// For each process, the local cell indices of atoms assigned to it
    /// (`((iz - z_offset) * y + iy) * x + ix`).
    pub cell_indices_by_process: Vec<Vec<usize>>,
    /// For each process, the original (root) index of each assigned atom,
    /// in the same order as `cell_indices_by_process`.
    pub atom_ids_by_process: Vec<Vec<usize>>,
}

/// Splits atoms among `z_offsets`/`z_lengths` (one pair per process, in
/// rank order) by comparing each atom's iz against the process z-slab.
pub fn partition_atoms(
    coords: &[[f64; 3]],
    grid: &[AxisGrid; 3],
    z_offsets: &[u32],
    z_lengths: &[u32],
    local_x: u32,
    local_y: u32,
) -> AtomPartition {
    let n_proc = z_offsets.len();
    let mut cell_indices_by_process = vec![Vec::new(); n_proc];
    let mut atom_ids_by_process = vec![Vec::new(); n_proc];

    for (atom_id, &coord) in coords.iter().enumerate() {
        let (ix, iy, iz) = atom_cell(coord, grid);
        for p in 0..n_proc {
            let z0 = z_offsets[p];
            let z1 = z0 + z_lengths[p];
            if iz >= z0 && iz < z1 {
                let local_iz = iz - z0;
                let cell = (local_iz as usize * local_y as usize + iy as usize) * local_x as usize
                    + ix as usize;
                cell_indices_by_process[p].push(cell);
                atom_ids_by_process[p].push(atom_id);
                break;
            }
        }
    }

    AtomPartition {
        cell_indices_by_process,
        atom_ids_by_process,
    }
}

/// Scatters whole wavefunction cubes by z-slab (legacy dense mode).
/// Ported from `Broadcaster::broadcastData`'s subarray-based scatter.
///
/// Root passes the full `(x, y, z_full)` cube in x-fastest order;
/// every process (including root) gets back its local z-slab.
pub fn broadcast_wavefunction_cube(
    ctx: &Context,
    full: Option<&[Complex64]>,
    dim: DistributedDimension,
    z_offsets: &[u32],
    z_lengths: &[u32],
) -> Result<Vec<Complex64>> {
    let slice_size = (dim.x as usize) * (dim.y as usize);
    let local_len = slice_size * dim.z as usize;
    let size = ctx.size() as usize;

    // A scatterv expressed as an all-to-all where only root sends: every
    // rank still calls the same collective, so this needs no derived
    // subarray datatype (unlike the original's `MPI_Scatterv` with
    // `typeSlicePad`/`typeSliceRaw`) and no point-to-point sends.
    let mut send_counts = vec![0i32; size];
    let mut send_displs = vec![0i32; size];
    let mut send_buf: Vec<f64> = Vec::new();
    if ctx.is_root() {
        let full = full.ok_or_else(|| Error::logic("root must supply the full cube"))?;
        if full.len() != slice_size * dim.z_full as usize {
            return Err(Error::input(
                "wavefunction cube dimensions do not match the inferred grid",
            ));
        }
        send_buf.reserve(full.len() * 2);
        for p in 0..size {
            send_displs[p] = send_buf.len() as i32;
            let start = z_offsets[p] as usize * slice_size;
            let len = z_lengths[p] as usize * slice_size;
            for v in &full[start..start + len] {
                send_buf.push(v.re);
                send_buf.push(v.im);
            }
            send_counts[p] = send_buf.len() as i32 - send_displs[p];
        }
    }

    let recv_counts: Vec<i32> = (0..size)
        .map(|p| if p == 0 { (local_len * 2) as i32 } else { 0 })
        .collect();
    let recv_displs = vec![0i32; size];
    let recv = ctx.alltoallv_f64(&send_buf, &send_counts, &send_displs, &recv_counts, &recv_displs);

    let mut local = vec![Complex64::new(0.0, 0.0); local_len];
    for (i, slot) in local.iter_mut().enumerate() {
        *slot = Complex64::new(recv[2 * i], recv[2 * i + 1]);
    }
    Ok(local)
}

/// Delivers each rank its own slice of `partition`'s cell/atom-id
/// arrays (root-only input). Every rank must first learn how many
/// atoms it will receive, since (unlike [`broadcast_wavefunction_cube`]'s
/// fixed z-slab sizes) atom counts per rank are data-dependent; this is
/// a small broadcast ahead of the scatter itself.
pub fn scatter_atom_partition(ctx: &Context, partition: Option<&AtomPartition>) -> (Vec<usize>, Vec<usize>) {
    let size = ctx.size() as usize;
    let rank = ctx.rank() as usize;

    let mut counts = vec![0i32; size];
    if ctx.is_root() {
        let partition = partition.expect("root must supply the computed partition");
        for p in 0..size {
            counts[p] = partition.cell_indices_by_process[p].len() as i32;
        }
    }
    ctx.broadcast_slice_root(&mut counts);

    let mut send_counts = vec![0i32; size];
    let mut send_displs = vec![0i32; size];
    let mut send_cells: Vec<i32> = Vec::new();
    let mut send_atoms: Vec<i32> = Vec::new();
    if ctx.is_root() {
        let partition = partition.expect("root must supply the computed partition");
        for p in 0..size {
            send_displs[p] = send_cells.len() as i32;
            send_counts[p] = counts[p];
            for (&cell, &atom) in partition.cell_indices_by_process[p]
                .iter()
                .zip(partition.atom_ids_by_process[p].iter())
            {
                send_cells.push(cell as i32);
                send_atoms.push(atom as i32);
            }
        }
    }

    let recv_counts: Vec<i32> = (0..size).map(|p| if p == 0 { counts[rank] } else { 0 }).collect();
    let recv_displs = vec![0i32; size];

    let recv_cells = ctx.alltoallv_i32(&send_cells, &send_counts, &send_displs, &recv_counts, &recv_displs);
    let recv_atoms = ctx.alltoallv_i32(&send_atoms, &send_counts, &send_displs, &recv_counts, &recv_displs);

    (
        recv_cells.into_iter().map(|v| v as usize).collect(),
        recv_atoms.into_iter().map(|v| v as usize).collect(),
    )
}

/// Scatters a root-held, atom-slowest/orbital-fastest coefficient
/// matrix so each rank ends up with only the columns of its own local
/// atoms, in `atom_ids_by_process[rank]` order. Ported from
/// `FunctionCollection::loadFunctionFromFile`'s `broadcastData` call,
/// specialised to per-atom rather than per-z-slab granularity.
pub fn scatter_atom_coefficients(
    ctx: &Context,
    full: Option<&[Complex64]>,
    orbitals: u32,
    atom_ids_by_process: Option<&[Vec<usize>]>,
    local_atom_count: usize,
) -> Result<Vec<Complex64>> {
    let size = ctx.size() as usize;
    let orbitals = orbitals as usize;

    let mut send_counts = vec![0i32; size];
    let mut send_displs = vec![0i32; size];
    let mut send_buf: Vec<f64> = Vec::new();
    if ctx.is_root() {
        let full = full.ok_or_else(|| Error::logic("root must supply the full coefficient matrix"))?;
        let atom_ids_by_process =
            atom_ids_by_process.ok_or_else(|| Error::logic("root must supply the atom partition"))?;
        for p in 0..size {
            send_displs[p] = send_buf.len() as i32;
            for &atom_id in &atom_ids_by_process[p] {
                let start = atom_id * orbitals;
                for v in &full[start..start + orbitals] {
                    send_buf.push(v.re);
                    send_buf.push(v.im);
                }
            }
            send_counts[p] = send_buf.len() as i32 - send_displs[p];
        }
    }

    let recv_counts: Vec<i32> = (0..size)
        .map(|p| if p == 0 { (local_atom_count * orbitals * 2) as i32 } else { 0 })
        .collect();
    let recv_displs = vec![0i32; size];
    let recv = ctx.alltoallv_f64(&send_buf, &send_counts, &send_displs, &recv_counts, &recv_displs);

    let mut out = vec![Complex64::new(0.0, 0.0); local_atom_count * orbitals];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = Complex64::new(recv[2 * i], recv[2 * i + 1]);
    }
    Ok(out)
}

/// Gathers each rank's per-local-atom values back to root, reassembled
/// into the original (root) atom order. Non-root callers get an
/// unspecified vector back (same convention as
/// [`Context::reduce_sum_to_root`]). Ported from the result-collection
/// half of `FunctionCollection::extractAtomCellValues`'s call site in
/// `potentials.cpp`.
pub fn gather_atom_values(
    ctx: &Context,
    local_values: &[Complex64],
    atom_ids_by_process: Option<&[Vec<usize>]>,
    total_atom_count: usize,
) -> Vec<Complex64> {
    let size = ctx.size() as usize;

    let mut send_counts = vec![0i32; size];
    let send_displs = vec![0i32; size];
    send_counts[0] = (local_values.len() * 2) as i32;
    let mut send_buf = Vec::with_capacity(local_values.len() * 2);
    for v in local_values {
        send_buf.push(v.re);
        send_buf.push(v.im);
    }

    let mut recv_counts = vec![0i32; size];
    let mut recv_displs = vec![0i32; size];
    if ctx.is_root() {
        let atom_ids_by_process = atom_ids_by_process.expect("root must supply the atom partition");
        let mut running = 0i32;
        for p in 0..size {
            let count = (atom_ids_by_process[p].len() * 2) as i32;
            recv_displs[p] = running;
            recv_counts[p] = count;
            running += count;
        }
    }

    let recv = ctx.alltoallv_f64(&send_buf, &send_counts, &send_displs, &recv_counts, &recv_displs);

    let mut out = vec![Complex64::new(0.0, 0.0); total_atom_count];
    if ctx.is_root() {
        let atom_ids_by_process = atom_ids_by_process.expect("root must supply the atom partition");
        for p in 0..size {
            let base = recv_displs[p] as usize;
            for (i, &atom_id) in atom_ids_by_process[p].iter().enumerate() {
                out[atom_id] = Complex64::new(recv[base + 2 * i], recv[base + 2 * i + 1]);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_grid_recovers_uniform_step() {
        let coords: Vec<[f64; 3]> = (0..5)
            .map(|i| [i as f64 * 2.5, 0.0, 0.0])
            .collect();
        let grids = infer_grid(&coords).unwrap();
        assert!((grids[0].step - 2.5).abs() < 1e-8);
        assert_eq!(grids[0].extent, 5);
    }

    #[test]
    fn partition_atoms_assigns_each_atom_once() {
        let coords = vec![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 2.0]];
        let grid = [
            AxisGrid { origin: 0.0, step: 1.0, extent: 1 },
            AxisGrid { origin: 0.0, step: 1.0, extent: 1 },
            AxisGrid { origin: 0.0, step: 1.0, extent: 3 },
        ];
        let partition = partition_atoms(&coords, &grid, &[0, 2], &[2, 1], 1, 1);
        let total: usize = partition.atom_ids_by_process.iter().map(|v| v.len()).sum();
        assert_eq!(total, 3);
    }
}
