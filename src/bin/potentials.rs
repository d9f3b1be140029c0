//! "potentials" personality: evaluates each input state's own
//! Hartree potential and writes the on-site value at every atom to
//! `potential-<basename>`.
//!
//! Ported from `potentials.cpp`'s `main`/`potentials` functions.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use gridcoulomb::comm::Context;
use gridcoulomb::config::Cli;
use gridcoulomb::density::BilinearDensity;
use gridcoulomb::engine::CoulombCalculator;
use gridcoulomb::error::{Error, Result};
use gridcoulomb::function_collection::FunctionCollection;
use gridcoulomb::kernel::{InteractionKernel, SimpleKernel, ThomasFermiKernel};

fn build_kernel(cli: &Cli, step: (f64, f64, f64)) -> Box<dyn InteractionKernel> {
    match cli.tf_lattice {
        Some(lattice) => Box::new(ThomasFermiKernel::new(step, cli.onsite, cli.dielectric, lattice)),
        None => Box::new(SimpleKernel::new(step, cli.onsite, cli.dielectric)),
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    cli.validate()?;

    let universe = mpi::initialize().ok_or_else(|| Error::logic("MPI failed to initialize"))?;
    let ctx = Context::new(universe.world());

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads_per_node)
        .build_global()
        .map_err(|e| Error::logic(format!("failed to configure thread pool: {e}")))?;

    let atoms_path = cli
        .atoms
        .as_ref()
        .ok_or_else(|| Error::config("--atoms is required in tight-binding mode"))?;

    if ctx.is_root() {
        info!("reading atom positions from {}", atoms_path.display());
    }
    let mut functions = FunctionCollection::new_tight_binding(&ctx, atoms_path, cli.orbitals)?;

    if ctx.is_root() {
        info!("reading {} input state files", cli.inputs.len());
    }
    for path in &cli.inputs {
        functions.append_tight_binding_file(path, cli.skip_lines)?;
    }

    if ctx.is_root() {
        info!("initializing calculator");
    }
    let dim = functions.padded_dimension();
    let real_dim = functions.real_dimension();
    let kernel = build_kernel(&cli, functions.step());

    let mut calculator = CoulombCalculator::new(&ctx, dim, real_dim.z_offset, real_dim.z)?;
    calculator.initialize(&ctx, kernel.as_ref())?;

    if ctx.is_root() {
        info!("computing on-site potentials");
    }
    let products = functions.create_self_products();

    if ctx.is_root() {
        std::fs::create_dir_all(&cli.output_dir)
            .map_err(|e| Error::input(format!("{}: {e}", cli.output_dir.display())))?;
    }

    for (product, path) in products.iter().zip(cli.inputs.iter()) {
        {
            let mut input = calculator.input_mut();
            product.write(&mut input, false);
        }
        calculator.prepare(&ctx)?;
        let values = functions.extract_atom_cell_values(calculator.potential());

        if ctx.is_root() {
            let basename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "state".to_string());
            let out_path = cli.output_dir.join(format!("potential-{basename}"));
            let mut lines = String::with_capacity(values.len() * 20);
            for value in &values {
                lines.push_str(&format!("{:.12e}\n", value.re));
            }
            std::fs::write(&out_path, lines)
                .map_err(|e| Error::input(format!("{}: {e}", out_path.display())))?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
