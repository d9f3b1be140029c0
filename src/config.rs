//! Command-line surface shared by both binary personalities.
//!
//! One `Cli` struct covers every flag spec.md's external-interface
//! table lists; `integrals`/`potentials` each parse it and then diverge
//! exactly as `coulombo.cpp`/`potentials.cpp`'s `main` functions do.
//! Ported from the `Parser`/flag registration block at the top of each
//! original `main`, re-expressed as a `clap` derive struct (mirroring
//! the single-`Opts`-struct-reused-by-one-`main` shape other grid/tool
//! crates in this corpus use for their CLI).

use std::path::PathBuf;

use clap::Parser;

use crate::error::{Error, Result};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Text file of atom coordinates, one "x y z" per line. Required
    /// unless `--step` selects legacy dense/wavefunction mode.
    #[arg(long)]
    pub atoms: Option<PathBuf>,

    /// Orbitals per atom (tight-binding mode only).
    #[arg(long, default_value_t = 20)]
    pub orbitals: u32,

    /// Header lines to skip in each coefficient file.
    #[arg(long = "skip-lines", default_value_t = 0)]
    pub skip_lines: u32,

    /// Relative permittivity.
    #[arg(long, default_value_t = 1.0)]
    pub dielectric: f64,

    /// Value placed at G(0,0,0) (eV).
    #[arg(long, default_value_t = 0.0)]
    pub onsite: f64,

    /// Thomas-Fermi-Resta lattice constant (A); requires dielectric > 1.
    #[arg(long = "tf-lattice")]
    pub tf_lattice: Option<f64>,

    /// Comma-separated 4-character integral-selection templates.
    #[arg(long, default_value = "****")]
    pub integrals: String,

    /// Output directory.
    #[arg(long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// In-process thread count.
    #[arg(long = "threads-per-node", default_value_t = 1)]
    pub threads_per_node: usize,

    /// Legacy: coefficient files come in up/down pairs.
    #[arg(long)]
    pub spin: bool,

    /// Legacy: uniform grid step (A) for wavefunction mode.
    #[arg(long)]
    pub step: Option<f64>,

    /// Coefficient or wavefunction data files, in order.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

impl Cli {
    /// Cross-flag validation that doesn't depend on the classified
    /// input file list (that ordering check lives in
    /// [`crate::io::validate_hole_electron_order`], run once the
    /// binary has classified `inputs`). Ported from the option-sanity
    /// checks `coulombo.cpp`/`potentials.cpp` run right after parsing.
    pub fn validate(&self) -> Result<()> {
        if let Some(lattice) = self.tf_lattice {
            if self.dielectric <= 1.0 {
                return Err(Error::config(
                    "--tf-lattice requires --dielectric > 1.0",
                ));
            }
            if lattice <= 0.0 {
                return Err(Error::config("--tf-lattice must be positive"));
            }
        }
        if self.orbitals == 0 {
            return Err(Error::config("--orbitals must be positive"));
        }
        if self.threads_per_node == 0 {
            return Err(Error::config("--threads-per-node must be positive"));
        }
        if self.atoms.is_none() && self.step.is_none() {
            return Err(Error::config(
                "either --atoms (tight-binding mode) or --step (legacy wavefunction mode) is required",
            ));
        }
        if self.inputs.is_empty() {
            return Err(Error::config("at least one input data file is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Cli {
        Cli {
            atoms: Some(PathBuf::from("atoms.txt")),
            orbitals: 20,
            skip_lines: 0,
            dielectric: 1.0,
            onsite: 0.0,
            tf_lattice: None,
            integrals: "****".into(),
            output_dir: PathBuf::from("."),
            threads_per_node: 1,
            spin: false,
            step: None,
            inputs: vec![PathBuf::from("h1.dat")],
        }
    }

    #[test]
    fn tf_lattice_requires_dielectric_above_one() {
        let mut cli = base();
        cli.tf_lattice = Some(5.0);
        cli.dielectric = 1.0;
        assert!(cli.validate().is_err());
        cli.dielectric = 4.0;
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn requires_atoms_or_step() {
        let mut cli = base();
        cli.atoms = None;
        assert!(cli.validate().is_err());
        cli.step = Some(0.5);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn rejects_zero_orbitals_and_threads() {
        let mut cli = base();
        cli.orbitals = 0;
        assert!(cli.validate().is_err());
        let mut cli = base();
        cli.threads_per_node = 0;
        assert!(cli.validate().is_err());
    }
}
