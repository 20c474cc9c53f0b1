//! The outer loop shared by every optimizer.
//!
//! An optimizer proposes a batch of individuals, an external scheduler
//! evaluates them in any order (possibly in parallel), and the complete set of
//! `(index, fitness)` results is handed back through `post_process`.  The
//! optimizer then updates its model and either proposes the next batch or
//! terminates.
use std::fmt;

use crate::crossentropy::CrossEntropyParameters;
use crate::distribution::DistributionSnapshot;
use crate::error::{LtlError, Result};
use crate::evolution::GeneticAlgorithmParameters;
use crate::face::FaceParameters;
use crate::fitness::{Candidate, Fitness, FitnessWeights};
use crate::individual::{Individual, ParamSpec};
use crate::optimizee::Optimizee;

/// Outcome of a generation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Status {
    /// A new batch is waiting for evaluation
    Running,
    /// No more batches will be proposed
    Terminated,
}

/// Individuals proposed for one generation, alongside their flattened genomes.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    individuals: Vec<Individual>,
    genomes: Vec<Vec<f64>>,
}

impl Batch {
    /// Creates `n` individuals from the optimizee, bounded and encoded under `spec`.
    pub fn create<O: Optimizee>(n: usize, spec: &ParamSpec, optimizee: &mut O) -> Result<Self> {
        let mut batch = Batch::default();
        for _ in 0..n {
            let ind = optimizee.create_individual();
            let ind = optimizee.bounding_func(ind);
            batch.genomes.push(spec.flatten(&ind)?);
            batch.individuals.push(ind);
        }
        Ok(batch)
    }

    /// Decodes sampled genomes, bounds them and re-encodes the bounded values.
    pub fn propose<O: Optimizee>(
        genomes: Vec<Vec<f64>>,
        spec: &ParamSpec,
        optimizee: &O,
    ) -> Result<Self> {
        let mut batch = Batch::default();
        for genome in genomes {
            let ind = optimizee.bounding_func(spec.unflatten(&genome)?);
            batch.genomes.push(spec.flatten(&ind)?);
            batch.individuals.push(ind);
        }
        Ok(batch)
    }

    /// Individuals awaiting evaluation
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// Flattened individuals, same order as `individuals`
    pub fn genomes(&self) -> &[Vec<f64>] {
        &self.genomes
    }

    /// Number of proposed individuals
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// True when nothing is proposed
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Orders `results` by candidate index.
    ///
    /// Every proposed index must appear exactly once, and every fitness must
    /// have one finite value per weight.  On failure nothing is consumed from the
    /// batch.
    pub fn collect(
        &self,
        results: Vec<(usize, Fitness)>,
        weights: &FitnessWeights,
    ) -> Result<Vec<Fitness>> {
        let n = self.len();
        let mut slots: Vec<Option<Fitness>> = vec![None; n];
        for (idx, fitness) in results {
            if idx >= n {
                return Err(LtlError::incomplete(format!(
                    "result index {} outside batch of {}",
                    idx, n
                )));
            }
            weights
                .check(&fitness)
                .map_err(|e| LtlError::incomplete(format!("candidate {}: {}", idx, e)))?;
            if fitness.values().iter().any(|v| !v.is_finite()) {
                return Err(LtlError::incomplete(format!(
                    "candidate {} has a non-finite fitness {:?}",
                    idx,
                    fitness.values()
                )));
            }
            if slots[idx].is_some() {
                return Err(LtlError::incomplete(format!(
                    "duplicate result for candidate {}",
                    idx
                )));
            }
            slots[idx] = Some(fitness);
        }

        let missing: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .collect();
        if !missing.is_empty() {
            return Err(LtlError::incomplete(format!(
                "missing results for candidates {:?}",
                missing
            )));
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Pairs each proposed individual with its fitness
    pub fn candidates(&self, fitnesses: &[Fitness], weighted: &[f64]) -> Vec<Candidate> {
        self.individuals
            .iter()
            .zip(self.genomes.iter())
            .zip(fitnesses.iter().zip(weighted.iter()))
            .map(|((ind, genome), (fitness, w))| Candidate {
                individual: ind.clone(),
                genome: genome.clone(),
                fitness: fitness.clone(),
                weighted: *w,
            })
            .collect()
    }
}

/// Generation counter and stopping policy
#[derive(Clone, Debug, Serialize)]
pub struct Progress {
    generation: usize,
    n_iteration: usize,
    stop_criterion: f64,
    terminated: bool,
}

impl Progress {
    /// Runs at most `n_iteration` generations, stopping early once the best
    /// weighted fitness of a generation reaches `stop_criterion`.
    pub fn new(n_iteration: usize, stop_criterion: f64) -> Self {
        Progress {
            generation: 0,
            n_iteration: n_iteration,
            stop_criterion: stop_criterion,
            terminated: false,
        }
    }

    /// Current generation, starting at 0
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Whether the optimizer has stopped
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Fails once the optimizer has stopped
    pub fn ensure_running(&self) -> Result<()> {
        if self.terminated {
            Err(LtlError::Terminated(self.generation))
        } else {
            Ok(())
        }
    }

    /// Closes the current generation.  Either terminates or advances the counter.
    pub fn finish_generation(&mut self, best_weighted: f64) -> Status {
        if self.generation + 1 >= self.n_iteration || best_weighted >= self.stop_criterion {
            self.terminated = true;
            Status::Terminated
        } else {
            self.generation += 1;
            Status::Running
        }
    }

    /// Number of generations whose results have been processed
    pub fn completed(&self) -> usize {
        if self.terminated {
            self.generation + 1
        } else {
            self.generation
        }
    }
}

/// Parameter record for any of the optimizers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "optimizer")]
pub enum AlgorithmParameters {
    /// Cross-entropy method
    CrossEntropy(CrossEntropyParameters),
    /// Cross-entropy with adaptive population
    Face(FaceParameters),
    /// Genetic algorithm
    GeneticAlgorithm(GeneticAlgorithmParameters),
}

impl AlgorithmParameters {
    /// Validates the wrapped record
    pub fn validate(&self) -> Result<()> {
        match self {
            AlgorithmParameters::CrossEntropy(p) => p.validate(),
            AlgorithmParameters::Face(p) => p.validate(),
            AlgorithmParameters::GeneticAlgorithm(p) => p.validate(),
        }
    }
}

/// Serializable view of an optimizer for external recorders
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimizerSnapshot {
    /// Configuration
    pub parameters: AlgorithmParameters,
    /// Current generation
    pub generation: usize,
    /// Whether the optimizer has stopped
    pub terminated: bool,
    /// Size of the current batch
    pub population_size: usize,
    /// Sampling distribution, for distribution-based optimizers
    pub distribution: Option<DistributionSnapshot>,
    /// Annealing temperature, for distribution-based optimizers
    pub temperature: Option<f64>,
    /// Best weighted fitness seen so far
    pub best_weighted_fitness: Option<f64>,
    /// Number of refits that kept the previous covariance
    pub degenerate_fits: usize,
}

/// Final summary returned by `Optimizer::end`
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    /// Name of the optimizer
    pub optimizer: String,
    /// Completed generations
    pub generations: usize,
    /// Best individual ever evaluated
    pub best: Option<Candidate>,
    /// Best distinct individuals ever evaluated, best first
    pub hall_of_fame: Vec<Candidate>,
}

impl Report {
    /// Logs the report
    pub fn log(&self) {
        info!(
            target: "ltl::optimizer",
            "-- End of {} after {} generations --",
            self.optimizer, self.generations
        );
        if let Some(best) = &self.best {
            info!(
                target: "ltl::optimizer",
                "Best individual is {}, fitness {:?}, weighted {:.6}",
                best.individual, best.fitness.0, best.weighted
            );
        }
        for (i, c) in self.hall_of_fame.iter().enumerate() {
            debug!(
                target: "ltl::optimizer",
                "HOF #{}: {}, {:?}",
                i, c.individual, c.fitness.0
            );
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} generations", self.optimizer, self.generations)?;
        if let Some(best) = &self.best {
            write!(f, ", best {} -> {:?}", best.individual, best.fitness.0)?;
        }
        Ok(())
    }
}

/// Step-wise optimizer interface.
///
/// The first batch exists as soon as the optimizer is constructed.  After
/// every successful `post_process` either a new batch is available or the
/// optimizer has terminated.
pub trait Optimizer {
    /// Current generation, starting at 0
    fn generation(&self) -> usize;

    /// Individuals awaiting evaluation for the current generation
    fn batch(&self) -> &[Individual];

    /// Consumes the fitness of every individual in the current batch.
    fn post_process(&mut self, results: Vec<(usize, Fitness)>) -> Result<Status>;

    /// Whether the optimizer has stopped
    fn is_terminated(&self) -> bool;

    /// Final report.  Does not modify the optimizer.
    fn end(&self) -> Report;

    /// Snapshot of the configuration and state
    fn snapshot(&self) -> OptimizerSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizee::FnOptimizee;

    fn batch_of(n: usize) -> Batch {
        let mut x = 0.0;
        let mut opt = FnOptimizee::new(move || {
            x += 1.0;
            Individual::new().with("x", x)
        });
        let spec = ParamSpec::from_individual(&Individual::new().with("x", 0.0));
        Batch::create(n, &spec, &mut opt).unwrap()
    }

    #[test]
    fn test_collect_orders_results() {
        let batch = batch_of(3);
        let results = vec![
            (2, Fitness::from(2.)),
            (0, Fitness::from(0.)),
            (1, Fitness::from(1.)),
        ];
        let fits = batch.collect(results, &FitnessWeights::maximize()).unwrap();
        assert_eq!(fits, vec![Fitness::from(0.), Fitness::from(1.), Fitness::from(2.)]);
        assert_eq!(batch.genomes()[2], vec![3.0]);
    }

    #[test]
    fn test_collect_rejects_malformed_results() {
        let batch = batch_of(3);
        let w = FitnessWeights::maximize();

        let missing = vec![(0, Fitness::from(0.)), (2, Fitness::from(2.))];
        match batch.collect(missing, &w) {
            Err(LtlError::IncompleteBatch(msg)) => assert!(msg.contains("[1]")),
            other => panic!("expected incomplete batch, got {:?}", other),
        }

        let duplicate = vec![
            (0, Fitness::from(0.)),
            (0, Fitness::from(0.)),
            (1, Fitness::from(1.)),
            (2, Fitness::from(2.)),
        ];
        assert!(batch.collect(duplicate, &w).is_err());

        let outside = vec![
            (0, Fitness::from(0.)),
            (1, Fitness::from(1.)),
            (3, Fitness::from(2.)),
        ];
        assert!(batch.collect(outside, &w).is_err());

        let wrong_len = vec![
            (0, Fitness::from(0.)),
            (1, Fitness(vec![1., 1.])),
            (2, Fitness::from(2.)),
        ];
        assert!(batch.collect(wrong_len, &w).is_err());
    }

    #[test]
    fn test_collect_rejects_non_finite_fitness() {
        let batch = batch_of(4);
        let w = FitnessWeights::minimize();
        for bad in &[std::f64::NAN, std::f64::INFINITY, std::f64::NEG_INFINITY] {
            let results = vec![
                (0, Fitness::from(-1.)),
                (1, Fitness::from(-2.)),
                (2, Fitness::from(*bad)),
                (3, Fitness::from(-3.)),
            ];
            match batch.collect(results, &w) {
                Err(LtlError::IncompleteBatch(msg)) => assert!(msg.contains("candidate 2")),
                other => panic!("expected incomplete batch, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_progress_stops_at_last_generation() {
        let mut p = Progress::new(3, std::f64::INFINITY);
        assert_eq!(p.finish_generation(0.), Status::Running);
        assert_eq!(p.finish_generation(0.), Status::Running);
        assert_eq!(p.generation(), 2);
        assert_eq!(p.finish_generation(0.), Status::Terminated);
        assert_eq!(p.generation(), 2);
        assert_eq!(p.completed(), 3);
        assert!(p.ensure_running().is_err());
    }

    #[test]
    fn test_progress_stop_criterion() {
        let mut p = Progress::new(100, -1.0);
        assert_eq!(p.finish_generation(-5.0), Status::Running);
        assert_eq!(p.finish_generation(-0.5), Status::Terminated);
        assert_eq!(p.completed(), 2);
    }
}
