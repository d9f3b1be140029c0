//! "integrals" personality: evaluates a selected set of Coulomb/
//! exchange integrals over every requested 4-tuple of input states and
//! writes them, grouped by hole/electron type, to `<type>.txt` files.
//!
//! Ported from `coulombo.cpp`'s `main`/`coulombo` functions.

use std::collections::HashMap;
use std::process::ExitCode;

use clap::Parser;
use num_complex::Complex64;
use tracing::info;

use gridcoulomb::comm::Context;
use gridcoulomb::config::Cli;
use gridcoulomb::engine::CoulombCalculator;
use gridcoulomb::error::{Error, Result};
use gridcoulomb::function_collection::FunctionCollection;
use gridcoulomb::io::{classify_basename, validate_hole_electron_order};
use gridcoulomb::kernel::{InteractionKernel, SimpleKernel, ThomasFermiKernel};
use gridcoulomb::pattern::Pattern;
use gridcoulomb::planner::{MasterPlanner, PlanStep, WorkerPlanner};

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

    let input_count = cli.inputs.len() as u32;
    let kinds = cli
        .inputs
        .iter()
        .map(|p| classify_basename(p))
        .collect::<Result<Vec<_>>>()?;
    let hole_count = validate_hole_electron_order(&kinds)?;

    if ctx.is_root() {
        info!("reading {} input state files", cli.inputs.len());
    }
    for path in &cli.inputs {
        functions.append_tight_binding_file(path, cli.skip_lines)?;
    }

    if ctx.is_root() {
        info!("preparing integral plan");
    }
    let pattern = Pattern::new(&cli.integrals, hole_count)?;
    let products = functions.create_products();

    let mut master = ctx.is_root().then(|| MasterPlanner::new(products.len()));
    let mut worker = (!ctx.is_root()).then(WorkerPlanner::new);

    let mut integral_specs: Vec<[u32; 4]> = Vec::new();
    if let Some(planner) = master.as_mut() {
        let mut id = 0i32;
        for i1 in 1..=input_count {
            for i2 in 1..=input_count {
                for i3 in 1..=input_count {
                    for i4 in 1..=input_count {
                        if pattern.matches(i1, i2, i3, i4) {
                            planner.add_integral(id, i1, i2, i3, i4);
                            integral_specs.push([i1, i2, i3, i4]);
                            id += 1;
                        }
                    }
                }
            }
        }
        planner.compute_plan();
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
        info!("computing requested integrals");
    }
    let mut integral_values = vec![Complex64::new(0.0, 0.0); integral_specs.len()];
    let mut last_left: i64 = -1;
    let mut last_right: i64 = -1;
    let mut last_right_conjugate = false;
    let mut value_last = Complex64::new(0.0, 0.0);

    loop {
        let mut step = PlanStep::sentinel();
        let more = match master.as_mut() {
            Some(planner) => planner.next_step(&ctx, &mut step),
            None => worker.as_mut().unwrap().next_step(&ctx, &mut step),
        };
        if !more {
            break;
        }

        if step.left.index as i64 != last_left {
            {
                let mut input = calculator.input_mut();
                products[step.left.index].write(&mut input, false);
            }
            calculator.prepare(&ctx)?;
            last_left = step.left.index as i64;
        }
        let right_conjugate = step.left.conjugate != step.right.conjugate;
        if step.right.index as i64 != last_right || right_conjugate != last_right_conjugate {
            {
                let mut input = calculator.input_mut();
                products[step.right.index].write(&mut input, right_conjugate);
            }
            last_right = step.right.index as i64;
            last_right_conjugate = right_conjugate;
            value_last = calculator.calculate(&ctx);
        }
        if ctx.is_root() {
            let value = if step.left.conjugate { value_last.conj() } else { value_last };
            integral_values[step.integral_id as usize] = value;
        }
    }

    if ctx.is_root() {
        info!("exporting results to {}", cli.output_dir.display());
        write_output_files(&cli, hole_count, input_count - hole_count, &integral_specs, &integral_values)?;
    }

    Ok(())
}

fn write_output_files(
    cli: &Cli,
    hole_count: u32,
    electron_count: u32,
    specs: &[[u32; 4]],
    values: &[Complex64],
) -> Result<()> {
    let mut by_spec: HashMap<[u32; 4], Complex64> = HashMap::with_capacity(specs.len());
    for (spec, value) in specs.iter().zip(values.iter()) {
        by_spec.insert(*spec, *value);
    }

    std::fs::create_dir_all(&cli.output_dir)
        .map_err(|e| Error::input(format!("{}: {e}", cli.output_dir.display())))?;

    for ti in 0..2u32 {
        for tj in 0..2u32 {
            for tk in 0..2u32 {
                for tl in 0..2u32 {
                    let core: String = [ti, tj, tk, tl]
                        .iter()
                        .map(|&t| if t == 1 { 'e' } else { 'h' })
                        .collect();
                    let n = [ti, tj, tk, tl].map(|t| if t == 1 { electron_count } else { hole_count });

                    let mut lines = String::new();
                    for ni in 1..=n[0] {
                        for nj in 1..=n[1] {
                            for nk in 1..=n[2] {
                                for nl in 1..=n[3] {
                                    let spec = [
                                        resolve_index(ti, hole_count, ni),
                                        resolve_index(tj, hole_count, nj),
                                        resolve_index(tk, hole_count, nk),
                                        resolve_index(tl, hole_count, nl),
                                    ];
                                    if let Some(value) = by_spec.get(&spec) {
                                        lines.push_str(&format!(
                                            "{:2} {:2} {:2} {:2}   {:17.14} {:17.14}\n",
                                            ni, nj, nk, nl, value.re, value.im
                                        ));
                                    }
                                }
                            }
                        }
                    }
                    if !lines.is_empty() {
                        let path = cli.output_dir.join(format!("{core}.txt"));
                        std::fs::write(&path, lines)
                            .map_err(|e| Error::input(format!("{}: {e}", path.display())))?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Maps a within-type index `n` (1-based) back to the global 1-based
/// state index: electron states (`t == 1`) follow the hole states,
/// hole states (`t == 0`) count down from `hole_count`. Ported from
/// `coulombo.cpp`'s `specs[i] = ti ? hoStateCount+ni : hoStateCount+1-ni`.
fn resolve_index(t: u32, hole_count: u32, n: u32) -> u32 {
    if t == 1 {
        hole_count + n
    } else {
        hole_count + 1 - n
    }
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
