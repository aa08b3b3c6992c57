//! Command-line entry point: `twosd <base_path> <problem_name> <n_workers>`.
//!
//! Positional arguments only, per §1's exclusion of an argument-parsing
//! crate — the SMPS triple's location is the only required input.

use std::path::PathBuf;
use std::process::ExitCode;

use problemo::Problem;
use problemo::common::IntoCommonProblem;

use twosd::backend::ipm::MehrotraSolver;
use twosd::callback::ConvergenceOutput;
use twosd::driver::{DriverOptions, TwoStageDriver};
use twosd::terminators::InterruptTerminator;

fn usage() -> String {
    "usage: twosd <base_path> <problem_name> <n_workers>".to_string()
}

fn run() -> Result<(), Problem> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [base_path, problem_name, n_workers] = args.as_slice() else {
        return Err(usage().gloss());
    };

    let n_workers: usize = n_workers
        .parse()
        .map_err(|_| format!("n_workers must be a positive integer, got '{n_workers}'").gloss())?;

    let instance = smps_io::Instance::load(&PathBuf::from(base_path), problem_name)
        .map_err(|e| e.to_string().gloss())?;

    let options = DriverOptions::new().with_n_workers(n_workers);
    let mut driver = TwoStageDriver::<MehrotraSolver>::new(&instance.core, &instance.time, &instance.stoch, options)
        .map_err(Problem::from)?
        .with_callback(Box::new(ConvergenceOutput))
        .with_terminator(Box::new(InterruptTerminator::new()));

    let status = driver.run().map_err(Problem::from)?;
    println!("twosd: {status:?}");
    println!("x = {:?}", driver.x());

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(problem) => {
            eprintln!("{problem}");
            ExitCode::FAILURE
        }
    }
}
