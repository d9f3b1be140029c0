//! Quasi-density generators: bilinear combinations of two states,
//! written into the convolution engine's shared input buffer.
//!
//! Ported from `Product.{hpp,cpp}` (dense/spinor variants) and the
//! tight-binding revision of `FunctionCollection.cpp` referenced in
//! `original_source/_INDEX.md`. Modeled as borrowed references into the
//! owning [`crate::function_collection::FunctionCollection`]'s state
//! data rather than reference-counted handles, per §9.

use num_complex::Complex64;

use crate::domain::Domain;

/// A callable that writes a quasi-density into the engine's shared
/// input buffer. `write` never allocates; it touches every local cell
/// of `f` exactly once (dense variants) or only the cells owned by a
/// local atom (tight-binding variant).
pub trait BilinearDensity {
    fn write(&self, f: &mut Domain<'_, Complex64>, conjugate: bool);
}

/// rho(r) = conj(psi_l(r)) * psi_r(r), or its conjugate-flagged form
/// psi_l(r) * conj(psi_r(r)). Ported from `ProductFromWavefunctions`.
pub struct WavefunctionProduct<'a> {
    pub left: &'a [Complex64],
    pub right: &'a [Complex64],
}

impl<'a> BilinearDensity for WavefunctionProduct<'a> {
    fn write(&self, f: &mut Domain<'_, Complex64>, conjugate: bool) {
        let out = f.as_mut_slice();
        debug_assert_eq!(out.len(), self.left.len());
        debug_assert_eq!(out.len(), self.right.len());
        if conjugate {
            for ((dst, &l), &r) in out.iter_mut().zip(self.left.iter()).zip(self.right.iter()) {
                *dst = l * r.conj();
            }
        } else {
            for ((dst, &l), &r) in out.iter_mut().zip(self.left.iter()).zip(self.right.iter()) {
                *dst = l.conj() * r;
            }
        }
    }
}

/// Sum of two [`WavefunctionProduct`] terms (spin up/down components).
/// Ported from `ProductFromSpinfunctions`.
pub struct SpinorProduct<'a> {
    pub left_down: &'a [Complex64],
    pub left_up: &'a [Complex64],
    pub right_down: &'a [Complex64],
    pub right_up: &'a [Complex64],
}

impl<'a> BilinearDensity for SpinorProduct<'a> {
    fn write(&self, f: &mut Domain<'_, Complex64>, conjugate: bool) {
        let out = f.as_mut_slice();
        let n = out.len();
        debug_assert_eq!(self.left_down.len(), n);
        debug_assert_eq!(self.left_up.len(), n);
        debug_assert_eq!(self.right_down.len(), n);
        debug_assert_eq!(self.right_up.len(), n);
        for i in 0..n {
            let (ld, lu, rd, ru) = (
                self.left_down[i],
                self.left_up[i],
                self.right_down[i],
                self.right_up[i],
            );
            out[i] = if conjugate {
                ld * rd.conj() + lu * ru.conj()
            } else {
                ld.conj() * rd + lu.conj() * ru
            };
        }
    }
}

/// Coefficient matrix for one tight-binding state: `orbital`-fastest,
/// `atom`-slowest, restricted to the atoms local to this process (i.e.
/// whose z-cell falls in this process's slab).
pub struct TightBindingCoefficients {
    pub orbitals: usize,
    /// length == orbitals * local_atom_count, orbital-fastest.
    pub data: Vec<Complex64>,
}

impl TightBindingCoefficients {
    fn column(&self, atom: usize) -> &[Complex64] {
        let start = atom * self.orbitals;
        &self.data[start..start + self.orbitals]
    }
}

/// Writes `F[cell(a)] = sum_orb conj(c_l[orb,a]) * c_r[orb,a]` (or its
/// conjugate form) for every atom `a` local to this process, leaving
/// every other cell zero. Ported from the tight-binding
/// `ProductFromTightBinding` generator.
pub struct TightBindingProduct<'a> {
    pub left: &'a TightBindingCoefficients,
    pub right: &'a TightBindingCoefficients,
    /// Local-domain linear cell index of each local atom, in the same
    /// order as the coefficient columns.
    pub cell_indices: &'a [usize],
}

impl<'a> BilinearDensity for TightBindingProduct<'a> {
    fn write(&self, f: &mut Domain<'_, Complex64>, conjugate: bool) {
        let out = f.as_mut_slice();
        out.fill(Complex64::new(0.0, 0.0));
        for (atom, &cell) in self.cell_indices.iter().enumerate() {
            let l = self.left.column(atom);
            let r = self.right.column(atom);
            let mut acc = Complex64::new(0.0, 0.0);
            if conjugate {
                for (&lv, &rv) in l.iter().zip(r.iter()) {
                    acc += lv * rv.conj();
                }
            } else {
                for (&lv, &rv) in l.iter().zip(r.iter()) {
                    acc += lv.conj() * rv;
                }
            }
            out[cell] = acc;
        }
    }
}

/// The diagonal (i == i) density |psi_i|^2, used by the `potentials`
/// personality which only ever needs self-products. Not part of
/// spec.md's bilinear pair contract (which only needs off-diagonal
/// reuse through the planner); added because the on-site-potential
/// tool needs a diagonal-only generator, ported from
/// `createSelfProducts` as called from `potentials.cpp`.
pub enum SelfProduct<'a> {
    Dense(&'a [Complex64]),
    TightBinding {
        coeffs: &'a TightBindingCoefficients,
        cell_indices: &'a [usize],
    },
}

impl<'a> BilinearDensity for SelfProduct<'a> {
    fn write(&self, f: &mut Domain<'_, Complex64>, _conjugate: bool) {
        match self {
            SelfProduct::Dense(psi) => {
                let out = f.as_mut_slice();
                for (dst, &v) in out.iter_mut().zip(psi.iter()) {
                    *dst = v.conj() * v;
                }
            }
            SelfProduct::TightBinding {
                coeffs,
                cell_indices,
            } => {
                let out = f.as_mut_slice();
                out.fill(Complex64::new(0.0, 0.0));
                for (atom, &cell) in cell_indices.iter().enumerate() {
                    let c = coeffs.column(atom);
                    let acc: Complex64 = c.iter().map(|v| v.conj() * v).sum();
                    out[cell] = acc;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::DistributedDimension;

    #[test]
    fn wavefunction_product_conjugate_flips_to_complex_conjugate() {
        let left = vec![Complex64::new(1.0, 2.0), Complex64::new(0.0, 1.0)];
        let right = vec![Complex64::new(3.0, -1.0), Complex64::new(2.0, 0.0)];
        let dim = DistributedDimension::new(2, 1, 1, 0, 1);
        let mut storage = vec![Complex64::new(0.0, 0.0); 2];
        let mut storage2 = vec![Complex64::new(0.0, 0.0); 2];

        let p = WavefunctionProduct {
            left: &left,
            right: &right,
        };
        {
            let mut f = Domain::new(&mut storage, dim);
            p.write(&mut f, false);
        }
        {
            let mut f2 = Domain::new(&mut storage2, dim);
            p.write(&mut f2, true);
        }
        for (a, b) in storage.iter().zip(storage2.iter()) {
            assert!((a - b.conj()).norm() < 1e-12);
        }
    }
}
