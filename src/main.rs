use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use proton_satria::solver::{Mode, Solver};
use proton_satria::{io, random};

#[derive(Parser)]
#[command(version, about = "A CDCL solver for DIMACS CNF formulas")]
struct Cli {
    /// Path to the input formula (DIMACS CNF).
    input: PathBuf,

    /// Answer conflicts by flipping the latest decision instead of learning.
    #[arg(long)]
    dpll: bool,

    /// Conflict-driven clause learning (the default; overrides --dpll).
    #[arg(long)]
    cdcl: bool,

    /// Evaluate random full assignments instead of searching.
    #[arg(long, alias = "random")]
    rand: bool,

    /// Time limit in seconds.
    #[arg(long, default_value_t = 300)]
    time: u64,

    /// Print the model, conflict, or decision stack under the verdict.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.time);

    let mut input = std::fs::File::open(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?;
    let problem = io::read_problem(&mut input)
        .with_context(|| format!("failed to parse {}", cli.input.display()))?;

    let solution = if cli.rand {
        let mut rng = SmallRng::from_entropy();
        random::solve(&problem, timeout, &mut rng)
    } else {
        let mode = if cli.dpll && !cli.cdcl {
            Mode::Dpll
        } else {
            Mode::Cdcl
        };
        Solver::new(problem, mode).solve(Some(timeout))
    };

    io::write_solution(&mut std::io::stdout(), &solution, cli.verbose)?;
    Ok(())
}
