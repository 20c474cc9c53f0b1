//! Drives an optimizer to completion by evaluating each proposed batch
extern crate ltl_core;
extern crate rayon;

use std::time::SystemTime;

use self::ltl_core::optimizer::{Optimizer, Report, Status};
use self::ltl_core::{Fitness, Individual, Result, Simulate};
use self::rayon::prelude::*;

/// Evaluates every batch on the current thread
pub fn run_sequential<O, S>(optimizer: &mut O, simulator: &S) -> Result<Report>
where
    O: Optimizer + ?Sized,
    S: Simulate,
{
    run(optimizer, |batch| {
        batch
            .iter()
            .enumerate()
            .map(|(i, ind)| (i, simulator.simulate(ind)))
            .collect()
    })
}

/// Evaluates every batch on the rayon thread pool
pub fn run_parallel<O, S>(optimizer: &mut O, simulator: &S) -> Result<Report>
where
    O: Optimizer + ?Sized,
    S: Simulate,
{
    run(optimizer, |batch| {
        batch
            .par_iter()
            .enumerate()
            .map(|(i, ind)| (i, simulator.simulate(ind)))
            .collect()
    })
}

fn run<O, F>(optimizer: &mut O, evaluate: F) -> Result<Report>
where
    O: Optimizer + ?Sized,
    F: Fn(&[Individual]) -> Vec<(usize, Fitness)>,
{
    let now = SystemTime::now();
    while !optimizer.is_terminated() {
        let generation = optimizer.generation();
        let results = evaluate(optimizer.batch());
        let n = results.len();
        let status = optimizer.post_process(results)?;

        let elapsed = now.elapsed().unwrap_or_default();
        info!(
            target: "ltl::runner",
            "Time: {}.{:03},\tGeneration: {},\tEvaluated: {},\tBest: {}",
            elapsed.as_secs(),
            elapsed.subsec_millis(),
            generation,
            n,
            optimizer
                .snapshot()
                .best_weighted_fitness
                .map(|f| format!("{:.6}", f))
                .unwrap_or_else(|| "-".into())
        );
        if status == Status::Terminated {
            break;
        }
    }
    Ok(optimizer.end())
}
