//! FACE: cross-entropy with an adaptive population
//! ---
//!
//! Works like the cross-entropy optimizer, except that the elite set is
//! widened with jittered copies of each elite member before the refit, and
//! the population size follows the rate of improvement.  While the best
//! fitness stalls the population grows towards `max_pop_size`; fast progress
//! shrinks it back towards `min_pop_size`.
extern crate rand;
extern crate rand_xorshift;

use self::rand::distributions::{Distribution as _, Normal};
use self::rand::SeedableRng;
use self::rand_xorshift::XorShiftRng;

use crate::crossentropy::{check_unit_interval, default_stop_criterion, select_elite};
use crate::distribution::{Distribution, DistributionParameters, FitOutcome};
use crate::error::{LtlError, Result};
use crate::fitness::{Fitness, FitnessWeights, HallOfFame, HALL_OF_FAME_SIZE};
use crate::individual::{Individual, ParamSpec};
use crate::optimizee::Optimizee;
use crate::optimizer::*;

fn default_expand_sigma() -> f64 {
    0.1
}

fn default_improvement_scale() -> f64 {
    0.01
}

/// Settings for the FACE optimizer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceParameters {
    /// Smallest population; also the size of generation 0
    pub min_pop_size: usize,

    /// Largest population
    pub max_pop_size: usize,

    /// Number of elite individuals per generation
    pub n_elite: usize,

    /// Weight of the previous distribution parameters in each refit
    pub smoothing: f64,

    /// Factor applied to the temperature every generation
    pub temp_decay: f64,

    /// Maximum number of generations
    pub n_iteration: usize,

    /// Sampling distribution
    pub distribution: DistributionParameters,

    /// Jittered copies added to the fit set per elite individual
    pub n_expand: usize,

    /// Stops once the best weighted fitness of a generation reaches this value
    #[serde(default = "default_stop_criterion")]
    pub stop_criterion: f64,

    /// Seed for sampling
    #[serde(default)]
    pub seed: u64,

    /// Jitter of the expansion copies, relative to the per-dimension standard
    /// deviation of the distribution
    #[serde(default = "default_expand_sigma")]
    pub expand_sigma: f64,

    /// Relative improvement at which the population starts shrinking
    #[serde(default = "default_improvement_scale")]
    pub improvement_scale: f64,
}

impl FaceParameters {
    /// Checks the record is usable
    pub fn validate(&self) -> Result<()> {
        if self.min_pop_size < 2 {
            return Err(LtlError::config(format!(
                "min_pop_size must be at least 2, got {}",
                self.min_pop_size
            )));
        }
        if self.max_pop_size < self.min_pop_size {
            return Err(LtlError::config(format!(
                "max_pop_size ({}) is below min_pop_size ({})",
                self.max_pop_size, self.min_pop_size
            )));
        }
        if self.n_elite == 0 || self.n_elite > self.min_pop_size {
            return Err(LtlError::config(format!(
                "n_elite must be within [1, min_pop_size = {}], got {}",
                self.min_pop_size, self.n_elite
            )));
        }
        check_unit_interval("smoothing", self.smoothing)?;
        check_unit_interval("temp_decay", self.temp_decay)?;
        if self.n_iteration == 0 {
            return Err(LtlError::config("n_iteration must be at least 1"));
        }
        if !(self.expand_sigma >= 0.0) || !self.expand_sigma.is_finite() {
            return Err(LtlError::config(format!(
                "expand_sigma must be finite and >= 0, got {}",
                self.expand_sigma
            )));
        }
        if !(self.improvement_scale > 0.0) {
            return Err(LtlError::config(format!(
                "improvement_scale must be positive, got {}",
                self.improvement_scale
            )));
        }
        self.distribution.validate()
    }
}

/// Relative improvement of `best` over `previous`.  Regressions count as 0.
pub fn improvement_ratio(previous: f64, best: f64) -> f64 {
    (best - previous).max(0.0) / previous.abs().max(1e-12)
}

/// Population size for the next generation.
///
/// The target size decays exponentially from `max` to `min` as `ratio` grows.
/// The population moves half-way towards it, at least by one, and never
/// leaves `[min, max]`.
pub fn next_population_size(current: usize, min: usize, max: usize, ratio: f64, scale: f64) -> usize {
    let target = min as f64 + (max - min) as f64 * (-ratio / scale).exp();
    let step = (target - current as f64) / 2.0;
    let step = if step > 0.0 { step.ceil() } else { step.floor() };
    let next = current as f64 + step;
    if next <= min as f64 {
        min
    } else if next >= max as f64 {
        max
    } else {
        next as usize
    }
}

/// Adds `n_expand` copies of each sample, jittered per dimension by
/// `N(0, (expand_sigma * sd[d])^2)`.
pub fn expansion(
    samples: &[Vec<f64>],
    n_expand: usize,
    sd: &[f64],
    expand_sigma: f64,
    rng: &mut XorShiftRng,
) -> Vec<Vec<f64>> {
    let normal = Normal::new(0.0, 1.0);
    let mut out = Vec::with_capacity(samples.len() * n_expand);
    for s in samples {
        for _ in 0..n_expand {
            out.push(
                s.iter()
                    .zip(sd.iter())
                    .map(|(v, d)| v + expand_sigma * d * normal.sample(rng))
                    .collect(),
            );
        }
    }
    out
}

/// FACE optimizer over an optimizee
pub struct FaceOptimizer<O: Optimizee> {
    optimizee: O,
    params: FaceParameters,
    weights: FitnessWeights,
    spec: ParamSpec,
    rng: XorShiftRng,
    distribution: Box<dyn Distribution>,
    temperature: f64,
    batch: Batch,
    progress: Progress,
    hall_of_fame: HallOfFame,
    previous_best: Option<f64>,
    degenerate_fits: usize,
}

impl<O: Optimizee> FaceOptimizer<O> {
    /// Builds the optimizer and a first batch of `min_pop_size` individuals
    pub fn new(
        mut optimizee: O,
        weights: FitnessWeights,
        spec: ParamSpec,
        params: FaceParameters,
    ) -> Result<Self> {
        params.validate()?;
        let batch = Batch::create(params.min_pop_size, &spec, &mut optimizee)?;
        info!(
            target: "ltl::face",
            "FACE over {} parameters, population {}..{}, elite {}",
            spec.len(),
            params.min_pop_size,
            params.max_pop_size,
            params.n_elite
        );

        Ok(FaceOptimizer {
            rng: XorShiftRng::seed_from_u64(params.seed),
            distribution: params.distribution.build(),
            temperature: 1.0,
            batch: batch,
            progress: Progress::new(params.n_iteration, params.stop_criterion),
            hall_of_fame: HallOfFame::new(HALL_OF_FAME_SIZE),
            previous_best: None,
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

    /// Best individuals seen so far
    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }
}

impl<O: Optimizee> Optimizer for FaceOptimizer<O> {
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

        let n_elite = self.params.n_elite.min(self.batch.len());
        let mut elite = select_elite(
            self.batch.genomes(),
            &weighted,
            n_elite,
            temperature,
            &mut rng,
        );

        let sd = distribution
            .std_devs()
            .unwrap_or_else(|| vec![1.0; self.spec.len()]);
        let expanded = expansion(
            &elite.samples[..n_elite],
            self.params.n_expand,
            &sd,
            self.params.expand_sigma,
            &mut rng,
        );
        elite.samples.extend(expanded);
        let outcome = distribution.fit(&elite.samples, self.params.smoothing);

        let current = self.batch.len();
        let next_size = match self.previous_best {
            Some(previous) => next_population_size(
                current,
                self.params.min_pop_size,
                self.params.max_pop_size,
                improvement_ratio(previous, elite.best),
                self.params.improvement_scale,
            ),
            None => current,
        };

        let status = progress.finish_generation(elite.best);
        let next = if status == Status::Running {
            let genomes = distribution.sample(next_size, &mut rng);
            Some(Batch::propose(genomes, &self.spec, &self.optimizee)?)
        } else {
            None
        };

        let generation = self.progress.generation();
        if outcome == FitOutcome::DegenerateCovariance {
            self.degenerate_fits += 1;
            warn!(
                target: "ltl::face",
                "Generation {}: {} samples cannot estimate a covariance; keeping the previous one",
                generation,
                elite.samples.len()
            );
        }
        info!(
            target: "ltl::face",
            "-- End of generation {} -- best: {:.6}, fit set: {}, next population: {}",
            generation,
            elite.best,
            elite.samples.len(),
            next_size
        );
        debug!(target: "ltl::face", "Distribution: {:?}", distribution.snapshot());

        self.hall_of_fame
            .update(self.batch.candidates(&fitnesses, &weighted));
        self.previous_best = Some(elite.best);
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
            optimizer: "FaceOptimizer".into(),
            generations: self.progress.completed(),
            best: self.hall_of_fame.best().cloned(),
            hall_of_fame: self.hall_of_fame.entries().to_vec(),
        };
        report.log();
        report
    }

    fn snapshot(&self) -> OptimizerSnapshot {
        OptimizerSnapshot {
            parameters: AlgorithmParameters::Face(self.params.clone()),
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

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::crossentropy::tests::{
        coords_spec, evaluate, shape_changing_optimizee, uniform_optimizee,
    };

    fn params() -> FaceParameters {
        FaceParameters {
            min_pop_size: 20,
            max_pop_size: 50,
            n_elite: 10,
            smoothing: 0.2,
            temp_decay: 0.0,
            n_iteration: 30,
            distribution: DistributionParameters::Gaussian,
            n_expand: 5,
            stop_criterion: std::f64::INFINITY,
            seed: 7,
            expand_sigma: 0.1,
            improvement_scale: 0.01,
        }
    }

    #[test]
    fn test_population_grows_on_stall_and_shrinks_on_progress() {
        let mut p = params();
        p.n_iteration = 13;
        let mut face =
            FaceOptimizer::new(uniform_optimizee(1), FitnessWeights::maximize(), coords_spec(), p)
                .unwrap();

        let mut sizes = Vec::new();
        while !face.is_terminated() {
            let g = face.generation();
            sizes.push(face.batch().len());
            let f = if g <= 6 { 1.0 } else { 10f64.powi(g as i32 - 6) };
            let results = (0..face.batch().len()).map(|i| (i, Fitness::from(f))).collect();
            face.post_process(results).unwrap();
        }
        assert_eq!(
            sizes,
            vec![20, 20, 35, 43, 47, 49, 50, 50, 35, 27, 23, 21, 20]
        );
    }

    #[test]
    fn test_next_population_size_direction() {
        assert!(next_population_size(20, 20, 50, 0.0, 0.01) > 20);
        assert!(next_population_size(50, 20, 50, 10.0, 0.01) < 50);
        assert_eq!(next_population_size(50, 20, 50, 0.0, 0.01), 50);
        assert_eq!(next_population_size(20, 20, 50, 10.0, 0.01), 20);
        assert_eq!(next_population_size(7, 7, 7, 0.0, 0.01), 7);
    }

    #[test]
    fn test_improvement_ratio() {
        assert_eq!(improvement_ratio(-2.0, -1.0), 0.5);
        assert_eq!(improvement_ratio(-1.0, -2.0), 0.0);
        assert!(improvement_ratio(0.0, 1.0) > 1e9);
    }

    #[test]
    fn test_expansion_copies() {
        let mut rng = XorShiftRng::seed_from_u64(3);
        let elite = vec![vec![1., 2.], vec![3., 4.]];
        let exact = expansion(&elite, 3, &[1., 1.], 0.0, &mut rng);
        assert_eq!(exact.len(), 6);
        assert_eq!(exact[0], vec![1., 2.]);
        assert_eq!(exact[5], vec![3., 4.]);

        let jittered = expansion(&elite, 3, &[1., 1.], 0.1, &mut rng);
        assert!(jittered.iter().all(|s| (s[0] - 1.).abs() < 1.0 || (s[0] - 3.).abs() < 1.0));
        assert!(jittered[0] != elite[0]);
    }

    #[test]
    fn test_sizes_stay_within_bounds_on_sphere() {
        let mut face = FaceOptimizer::new(
            uniform_optimizee(2),
            FitnessWeights::maximize(),
            coords_spec(),
            params(),
        )
        .unwrap();
        assert_eq!(face.batch().len(), 20);
        while !face.is_terminated() {
            let n = face.batch().len();
            assert!(n >= 20 && n <= 50);
            assert_eq!(face.snapshot().population_size, n);
            let results = evaluate(face.batch());
            face.post_process(results).unwrap();
        }
        let report = face.end();
        assert_eq!(report.generations, 30);
        assert!(report.best.unwrap().weighted > -0.5);
    }

    #[test]
    fn test_failed_proposal_leaves_state_untouched() {
        let mut face = FaceOptimizer::new(
            shape_changing_optimizee(4, 20),
            FitnessWeights::maximize(),
            coords_spec(),
            params(),
        )
        .unwrap();
        let before = face.snapshot();
        let batch = face.batch().to_vec();

        for _ in 0..2 {
            assert!(face.post_process(evaluate(&batch)).is_err());
            assert_eq!(face.generation(), 0);
            assert_eq!(face.snapshot(), before);
            assert!(face.previous_best.is_none());
            assert!(face.hall_of_fame().is_empty());
        }
    }

    #[test]
    fn test_nan_fitness_is_rejected() {
        let mut face = FaceOptimizer::new(
            uniform_optimizee(5),
            FitnessWeights::maximize(),
            coords_spec(),
            params(),
        )
        .unwrap();
        let mut results = evaluate(face.batch());
        results[7].1 = Fitness::from(std::f64::NAN);
        assert!(face.post_process(results).is_err());
        assert_eq!(face.generation(), 0);
        assert!(face.hall_of_fame().is_empty());
    }

    #[test]
    fn test_validation() {
        let mut p = params();
        p.n_elite = 21;
        assert!(p.validate().is_err());
        p.n_elite = 10;
        p.max_pop_size = 10;
        assert!(p.validate().is_err());
        p.max_pop_size = 50;
        p.improvement_scale = 0.0;
        assert!(p.validate().is_err());
        p.improvement_scale = 0.01;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_defaults_from_json() {
        let json = r#"{
            "min_pop_size": 20, "max_pop_size": 50, "n_elite": 10,
            "smoothing": 0.2, "temp_decay": 0, "n_iteration": 30,
            "distribution": {"type": "Gaussian"}, "n_expand": 5
        }"#;
        let p: FaceParameters = serde_json::from_str(json).unwrap();
        assert_eq!(p.expand_sigma, 0.1);
        assert_eq!(p.improvement_scale, 0.01);
        assert_eq!(p.seed, 0);
        assert!(p.stop_criterion.is_infinite());
    }

    proptest! {
        #[test]
        fn next_size_is_bounded(
            min in 2usize..40,
            extra in 0usize..40,
            offset in 0usize..40,
            ratio in 0.0f64..5.0
        ) {
            let max = min + extra;
            let current = min + offset.min(extra);
            let next = next_population_size(current, min, max, ratio, 0.01);
            prop_assert!(next >= min && next <= max);
        }
    }
}
