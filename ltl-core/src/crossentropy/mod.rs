//! Cross-Entropy optimizer
//! ---
//!
//! Each generation samples a population from a parametric distribution, ranks
//! it by weighted fitness and refits the distribution to the top `rho`
//! fraction.  A temperature, decayed every generation, optionally lets
//! individuals just below the elite threshold into the refit as well.
extern crate rand;
extern crate rand_xorshift;

use self::rand::{Rng, SeedableRng};
use self::rand_xorshift::XorShiftRng;

use crate::distribution::{Distribution, DistributionParameters, FitOutcome};
use crate::error::{LtlError, Result};
use crate::fitness::{rank, Fitness, FitnessWeights, HallOfFame, HALL_OF_FAME_SIZE};
use crate::individual::{Individual, ParamSpec};
use crate::optimizee::Optimizee;
use crate::optimizer::*;

pub(crate) fn default_stop_criterion() -> f64 {
    std::f64::INFINITY
}

pub(crate) fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if value >= 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(LtlError::config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

/// Settings for the cross-entropy optimizer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossEntropyParameters {
    /// Number of individuals sampled per generation
    pub pop_size: usize,

    /// Fraction of the population used to refit the distribution
    pub rho: f64,

    /// Weight of the previous distribution parameters in each refit.  0 replaces
    /// them with the elite statistics.
    pub smoothing: f64,

    /// Factor applied to the temperature every generation.  0 disables
    /// admission of non-elite individuals.
    pub temp_decay: f64,

    /// Maximum number of generations
    pub n_iteration: usize,

    /// Sampling distribution
    pub distribution: DistributionParameters,

    /// Stops once the best weighted fitness of a generation reaches this value
    #[serde(default = "default_stop_criterion")]
    pub stop_criterion: f64,

    /// Seed for sampling
    #[serde(default)]
    pub seed: u64,
}

impl CrossEntropyParameters {
    /// Checks the record is usable
    pub fn validate(&self) -> Result<()> {
        if self.pop_size < 2 {
            return Err(LtlError::config(format!(
                "pop_size must be at least 2, got {}",
                self.pop_size
            )));
        }
        if !(self.rho > 0.0 && self.rho <= 1.0) {
            return Err(LtlError::config(format!(
                "rho must be within (0, 1], got {}",
                self.rho
            )));
        }
        check_unit_interval("smoothing", self.smoothing)?;
        check_unit_interval("temp_decay", self.temp_decay)?;
        if self.n_iteration == 0 {
            return Err(LtlError::config("n_iteration must be at least 1"));
        }
        self.distribution.validate()
    }

    /// Number of elite individuals per generation: `rho * pop_size`, rounded,
    /// and at least one.
    pub fn n_elite(&self) -> usize {
        ((self.rho * self.pop_size as f64).round() as usize)
            .max(1)
            .min(self.pop_size)
    }
}

/// Samples selected for a refit
#[derive(Debug)]
pub(crate) struct Elite {
    /// Elite genomes followed by any annealed admissions
    pub samples: Vec<Vec<f64>>,
    /// Weighted fitness of the worst elite member
    pub gamma: f64,
    /// Best weighted fitness of the generation
    pub best: f64,
    /// Number of non-elite individuals admitted
    pub admitted: usize,
}

/// Takes the `n_elite` best genomes by weighted fitness, ties broken by
/// population order.  While `temperature` is positive every other genome is
/// admitted with probability `exp((f - gamma) / temperature)`.
pub(crate) fn select_elite(
    genomes: &[Vec<f64>],
    weighted: &[f64],
    n_elite: usize,
    temperature: f64,
    rng: &mut XorShiftRng,
) -> Elite {
    let order = rank(weighted);
    let n_elite = n_elite.min(order.len());
    let best = order
        .first()
        .map(|i| weighted[*i])
        .unwrap_or(std::f64::NEG_INFINITY);
    let gamma = if n_elite > 0 {
        weighted[order[n_elite - 1]]
    } else {
        best
    };

    let mut samples: Vec<Vec<f64>> = order[..n_elite]
        .iter()
        .map(|i| genomes[*i].clone())
        .collect();

    let mut admitted = 0;
    if temperature > 0.0 {
        for &i in order[n_elite..].iter() {
            let p = ((weighted[i] - gamma) / temperature).exp();
            if rng.gen::<f64>() < p {
                samples.push(genomes[i].clone());
                admitted += 1;
            }
        }
    }

    Elite {
        samples: samples,
        gamma: gamma,
        best: best,
        admitted: admitted,
    }
}

/// Cross-entropy optimizer over an optimizee
pub struct CrossEntropyOptimizer<O: Optimizee> {
    optimizee: O,
    params: CrossEntropyParameters,
    weights: FitnessWeights,
    spec: ParamSpec,
    rng: XorShiftRng,
    distribution: Box<dyn Distribution>,
    temperature: f64,
    batch: Batch,
    progress: Progress,
    hall_of_fame: HallOfFame,
    degenerate_fits: usize,
}

impl<O: Optimizee> CrossEntropyOptimizer<O> {
    /// Builds the optimizer and its first batch.  Generation 0 comes straight
    /// from the optimizee; later generations are sampled from the distribution.
    pub fn new(
        mut optimizee: O,
        weights: FitnessWeights,
        spec: ParamSpec,
        params: CrossEntropyParameters,
    ) -> Result<Self> {
        params.validate()?;
        let batch = Batch::create(params.pop_size, &spec, &mut optimizee)?;
        info!(
            target: "ltl::ce",
            "Cross-entropy over {} parameters, population {}, elite {}",
            spec.len(),
            params.pop_size,
            params.n_elite()
        );

        Ok(CrossEntropyOptimizer {
            rng: XorShiftRng::seed_from_u64(params.seed),
            distribution: params.distribution.build(),
            temperature: 1.0,
            batch: batch,
            progress: Progress::new(params.n_iteration, params.stop_criterion),
            hall_of_fame: HallOfFame::new(HALL_OF_FAME_SIZE),
            degenerate_fits: 0,
            optimizee: optimizee,
            params: params,
            weights: weights,
            spec: spec,
        })
    }

    /// Sampling distribution
    pub fn distribution(&self) -> &dyn Distribution {
        self.distribution.as_ref()
    }

    /// Current temperature
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Best individuals seen so far
    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    /// Parameter spec used to encode individuals
    pub fn spec(&self) -> &ParamSpec {
        &self.spec
    }
}

impl<O: Optimizee> Optimizer for CrossEntropyOptimizer<O> {
    fn generation(&self) -> usize {
        self.progress.generation()
    }

    fn batch(&self) -> &[Individual] {
        self.batch.individuals()
    }

    fn post_process(&mut self, results: Vec<(usize, Fitness)>) -> Result<Status> {
        self.progress.ensure_running()?;
        let fitnesses = self.batch.collect(results, &self.weights)?;
        let weighted: Vec<f64> = fitnesses.iter().map(|f| self.weights.weigh(f)).collect();

        // Staged copies; committed once the next batch exists
        let mut rng = self.rng.clone();
        let mut distribution = self.distribution.clone();
        let mut progress = self.progress.clone();
        let temperature = self.temperature * self.params.temp_decay;

        let elite = select_elite(
            self.batch.genomes(),
            &weighted,
            self.params.n_elite(),
            temperature,
            &mut rng,
        );
        let outcome = distribution.fit(&elite.samples, self.params.smoothing);

        let status = progress.finish_generation(elite.best);
        let next = if status == Status::Running {
            let genomes = distribution.sample(self.params.pop_size, &mut rng);
            Some(Batch::propose(genomes, &self.spec, &self.optimizee)?)
        } else {
            None
        };

        let generation = self.progress.generation();
        if outcome == FitOutcome::DegenerateCovariance {
            self.degenerate_fits += 1;
            warn!(
                target: "ltl::ce",
                "Generation {}: {} samples cannot estimate a covariance; keeping the previous one",
                generation,
                elite.samples.len()
            );
        }
        info!(
            target: "ltl::ce",
            "-- End of generation {} -- best: {:.6}, elite threshold: {:.6}, admitted: {}",
            generation,
            elite.best,
            elite.gamma,
            elite.admitted
        );
        debug!(target: "ltl::ce", "Distribution: {:?}", distribution.snapshot());

        self.hall_of_fame
            .update(self.batch.candidates(&fitnesses, &weighted));
        self.rng = rng;
        self.distribution = distribution;
        self.progress = progress;
        self.temperature = temperature;
        if let Some(batch) = next {
            self.batch = batch;
        }
        Ok(status)
    }

    fn is_terminated(&self) -> bool {
        self.progress.is_terminated()
    }

    fn end(&self) -> Report {
        let report = Report {
            optimizer: "CrossEntropyOptimizer".into(),
            generations: self.progress.completed(),
            best: self.hall_of_fame.best().cloned(),
            hall_of_fame: self.hall_of_fame.entries().to_vec(),
        };
        report.log();
        report
    }

    fn snapshot(&self) -> OptimizerSnapshot {
        OptimizerSnapshot {
            parameters: AlgorithmParameters::CrossEntropy(self.params.clone()),
            generation: self.progress.generation(),
            terminated: self.progress.is_terminated(),
            population_size: self.batch.len(),
            distribution: Some(self.distribution.snapshot()),
            temperature: Some(self.temperature),
            best_weighted_fitness: self.hall_of_fame.best().map(|c| c.weighted),
            degenerate_fits: self.degenerate_fits,
        }
    }
}
