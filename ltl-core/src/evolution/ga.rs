//! Implements a generational genetic algorithm with tournament selection,
//! blend crossover and Gaussian mutation.
extern crate rand;
extern crate rand_xorshift;

use self::rand::{Rng, SeedableRng};
use self::rand_xorshift::XorShiftRng;

use crate::crossentropy::check_unit_interval;
use crate::error::{LtlError, Result};
use crate::fitness::{rank, same_genome, Candidate, Fitness, FitnessWeights, HallOfFame, HALL_OF_FAME_SIZE};
use crate::individual::{Individual, ParamSpec};
use crate::optimizee::Optimizee;
use crate::optimizer::*;

use super::{Crossover, Mutation, Selection};

/// Chance that an offspring identical to an earlier one is mutated again
const DUPLICATE_REMUTATION_PROB: f64 = 0.8;

/// Settings for the genetic algorithm
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneticAlgorithmParameters {
    /// Seed for selection and variation
    pub seed: u64,

    /// Population size
    pub popsize: usize,

    /// Probability that a pair of offspring is mated
    #[serde(rename = "CXPB")]
    pub cxpb: f64,

    /// Probability that an offspring is mutated
    #[serde(rename = "MUTPB")]
    pub mutpb: f64,

    /// Number of generations
    #[serde(rename = "NGEN")]
    pub ngen: usize,

    /// Per-gene mutation probability
    pub indpb: f64,

    /// Tournament size
    pub tournsize: usize,

    /// Blend crossover `alpha`
    pub matepar: f64,

    /// Standard deviation of the Gaussian mutation
    pub mutpar: f64,
}

impl GeneticAlgorithmParameters {
    /// Checks the record is usable
    pub fn validate(&self) -> Result<()> {
        if self.popsize == 0 {
            return Err(LtlError::config("popsize must be at least 1"));
        }
        if self.tournsize == 0 {
            return Err(LtlError::config("tournsize must be at least 1"));
        }
        if self.ngen == 0 {
            return Err(LtlError::config("NGEN must be at least 1"));
        }
        check_unit_interval("CXPB", self.cxpb)?;
        check_unit_interval("MUTPB", self.mutpb)?;
        check_unit_interval("indpb", self.indpb)?;
        if !(self.matepar >= 0.0) || !self.matepar.is_finite() {
            return Err(LtlError::config(format!(
                "matepar must be finite and >= 0, got {}",
                self.matepar
            )));
        }
        if !(self.mutpar >= 0.0) || !self.mutpar.is_finite() {
            return Err(LtlError::config(format!(
                "mutpar must be finite and >= 0, got {}",
                self.mutpar
            )));
        }
        Ok(())
    }

    /// Parent selection operator
    pub fn selection(&self) -> Selection {
        Selection::Tournament {
            size: self.tournsize,
        }
    }

    /// Crossover operator
    pub fn crossover(&self) -> Crossover {
        Crossover::Blend {
            alpha: self.matepar,
        }
    }

    /// Mutation operator
    pub fn mutation(&self) -> Mutation {
        Mutation::Gaussian {
            mu: 0.0,
            sigma: self.mutpar,
            indpb: self.indpb,
        }
    }
}

/// A population member.  `fitness` is `None` until it has been evaluated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// The individual
    pub individual: Individual,
    /// Its fitness, when known
    pub fitness: Option<Fitness>,
}

/// Applies crossover on consecutive pairs, then mutation, then re-mutates
/// offspring that duplicate an earlier one.  Returns the number of duplicates
/// that were re-mutated.
pub(crate) fn vary(
    offspring: &mut [Vec<f64>],
    params: &GeneticAlgorithmParameters,
    rng: &mut XorShiftRng,
) -> usize {
    let crossover = params.crossover();
    let mutation = params.mutation();

    for pair in offspring.chunks_mut(2) {
        if let [x1, x2] = pair {
            if rng.gen::<f64>() < params.cxpb {
                crossover.mate(x1, x2, rng);
            }
        }
    }

    for genome in offspring.iter_mut() {
        if rng.gen::<f64>() < params.mutpb {
            mutation.mutate(genome, rng);
        }
    }

    let mut remutated = 0;
    for j in 1..offspring.len() {
        let (earlier, rest) = offspring.split_at_mut(j);
        let genome = &mut rest[0];
        if earlier.iter().any(|e| same_genome(e, &genome[..]))
            && rng.gen::<f64>() < DUPLICATE_REMUTATION_PROB
        {
            mutation.mutate(genome, rng);
            remutated += 1;
        }
    }
    remutated
}

/// Genetic algorithm over an optimizee.
///
/// Every generation the whole population is replaced by its offspring and
/// every offspring is proposed for evaluation.
pub struct GeneticAlgorithmOptimizer<O: Optimizee> {
    optimizee: O,
    params: GeneticAlgorithmParameters,
    weights: FitnessWeights,
    spec: ParamSpec,
    rng: XorShiftRng,
    population: Vec<Member>,
    // population index of each batch entry
    pending: Vec<usize>,
    batch: Batch,
    progress: Progress,
    hall_of_fame: HallOfFame,
}

impl<O: Optimizee> GeneticAlgorithmOptimizer<O> {
    /// Builds the optimizer with `popsize` fresh individuals
    pub fn new(
        mut optimizee: O,
        weights: FitnessWeights,
        spec: ParamSpec,
        params: GeneticAlgorithmParameters,
    ) -> Result<Self> {
        params.validate()?;
        let batch = Batch::create(params.popsize, &spec, &mut optimizee)?;
        let population = batch
            .individuals()
            .iter()
            .map(|ind| Member {
                individual: ind.clone(),
                fitness: None,
            })
            .collect();
        Ok(GeneticAlgorithmOptimizer::assemble(
            optimizee, weights, spec, params, population, batch,
        ))
    }

    /// Resumes from an existing population.  Members that already carry a
    /// fitness are not proposed again; when all of them do, the first batch is
    /// empty and `post_process(vec![])` breeds the next generation.
    pub fn resume(
        optimizee: O,
        weights: FitnessWeights,
        spec: ParamSpec,
        params: GeneticAlgorithmParameters,
        population: Vec<Member>,
    ) -> Result<Self> {
        params.validate()?;
        if population.len() != params.popsize {
            return Err(LtlError::config(format!(
                "resumed population has {} members, popsize is {}",
                population.len(),
                params.popsize
            )));
        }

        let mut members = Vec::with_capacity(population.len());
        let mut genomes = Vec::new();
        for member in population {
            if let Some(f) = &member.fitness {
                weights
                    .check(f)
                    .map_err(|e| LtlError::config(format!("resumed population: {}", e)))?;
            }
            let individual = optimizee.bounding_func(member.individual);
            let genome = spec.flatten(&individual)?;
            if member.fitness.is_none() {
                genomes.push(genome);
            }
            members.push(Member {
                individual: individual,
                fitness: member.fitness,
            });
        }
        let batch = Batch::propose(genomes, &spec, &optimizee)?;

        let mut ga = GeneticAlgorithmOptimizer::assemble(optimizee, weights, spec, params, members, batch);
        let known: Vec<Candidate> = ga
            .population
            .iter()
            .filter_map(|m| {
                let fitness = m.fitness.clone()?;
                let genome = ga.spec.flatten(&m.individual).ok()?;
                Some(Candidate {
                    weighted: ga.weights.weigh(&fitness),
                    individual: m.individual.clone(),
                    genome: genome,
                    fitness: fitness,
                })
            })
            .collect();
        info!(
            target: "ltl::ga",
            "Resuming with {} evaluated members out of {}",
            known.len(),
            ga.population.len()
        );
        ga.hall_of_fame.update(known);
        Ok(ga)
    }

    fn assemble(
        optimizee: O,
        weights: FitnessWeights,
        spec: ParamSpec,
        params: GeneticAlgorithmParameters,
        population: Vec<Member>,
        batch: Batch,
    ) -> Self {
        let pending = population
            .iter()
            .enumerate()
            .filter(|(_, m)| m.fitness.is_none())
            .map(|(i, _)| i)
            .collect();
        GeneticAlgorithmOptimizer {
            rng: XorShiftRng::seed_from_u64(params.seed),
            progress: Progress::new(params.ngen, std::f64::INFINITY),
            hall_of_fame: HallOfFame::new(HALL_OF_FAME_SIZE),
            optimizee: optimizee,
            params: params,
            weights: weights,
            spec: spec,
            population: population,
            pending: pending,
            batch: batch,
        }
    }

    /// Current population
    pub fn population(&self) -> &[Member] {
        &self.population
    }

    /// Best individuals seen so far
    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    // Weighted fitness of every member; unevaluated members rank last
    fn weighted(&self, population: &[Member]) -> Vec<f64> {
        population
            .iter()
            .map(|m| {
                m.fitness
                    .as_ref()
                    .map(|f| self.weights.weigh(f))
                    .unwrap_or(std::f64::NEG_INFINITY)
            })
            .collect()
    }

    /// Selects `popsize` parents and returns copies of their genomes
    fn select_parents(
        &self,
        population: &[Member],
        weighted: &[f64],
        rng: &mut XorShiftRng,
    ) -> Result<Vec<Vec<f64>>> {
        let picks = self
            .params
            .selection()
            .select(weighted, self.params.popsize, rng);
        picks
            .into_iter()
            .map(|i| self.spec.flatten(&population[i].individual))
            .collect()
    }
}

impl<O: Optimizee> Optimizer for GeneticAlgorithmOptimizer<O> {
    fn generation(&self) -> usize {
        self.progress.generation()
    }

    fn batch(&self) -> &[Individual] {
        self.batch.individuals()
    }

    fn post_process(&mut self, results: Vec<(usize, Fitness)>) -> Result<Status> {
        self.progress.ensure_running()?;
        let fitnesses = self.batch.collect(results, &self.weights)?;
        let batch_weighted: Vec<f64> = fitnesses.iter().map(|f| self.weights.weigh(f)).collect();

        // Staged copies; committed once the next batch exists
        let mut population = self.population.clone();
        for (&member, fitness) in self.pending.iter().zip(fitnesses.iter()) {
            population[member].fitness = Some(fitness.clone());
        }
        let mut rng = self.rng.clone();
        let mut progress = self.progress.clone();

        let weighted = self.weighted(&population);
        let order = rank(&weighted);
        let best = order
            .first()
            .map(|i| weighted[*i])
            .unwrap_or(std::f64::NEG_INFINITY);

        let status = progress.finish_generation(best);
        let mut remutated = 0;
        let next = if status == Status::Running {
            let mut offspring = self.select_parents(&population, &weighted, &mut rng)?;
            remutated = vary(&mut offspring, &self.params, &mut rng);
            Some(Batch::propose(offspring, &self.spec, &self.optimizee)?)
        } else {
            None
        };

        info!(target: "ltl::ga", "  Evaluated {} individuals", fitnesses.len());
        info!(target: "ltl::ga", "-- End of generation {} --", self.progress.generation());
        for &i in order.iter().take(2) {
            info!(
                target: "ltl::ga",
                "Best individual is {}, weighted fitness {:.6}",
                population[i].individual,
                weighted[i]
            );
        }
        if remutated > 0 {
            info!(target: "ltl::ga", "Mutating more: {} duplicate offspring", remutated);
        }

        self.hall_of_fame
            .update(self.batch.candidates(&fitnesses, &batch_weighted));
        self.rng = rng;
        self.progress = progress;
        match next {
            Some(batch) => {
                self.population = batch
                    .individuals()
                    .iter()
                    .map(|ind| Member {
                        individual: ind.clone(),
                        fitness: None,
                    })
                    .collect();
                self.pending = (0..self.population.len()).collect();
                self.batch = batch;
            }
            None => self.population = population,
        }
        Ok(status)
    }

    fn is_terminated(&self) -> bool {
        self.progress.is_terminated()
    }

    fn end(&self) -> Report {
        let report = Report {
            optimizer: "GeneticAlgorithmOptimizer".into(),
            generations: self.progress.completed(),
            best: self.hall_of_fame.best().cloned(),
            hall_of_fame: self.hall_of_fame.entries().to_vec(),
        };
        report.log();
        report
    }

    fn snapshot(&self) -> OptimizerSnapshot {
        OptimizerSnapshot {
            parameters: AlgorithmParameters::GeneticAlgorithm(self.params.clone()),
            generation: self.progress.generation(),
            terminated: self.progress.is_terminated(),
            population_size: self.population.len(),
            distribution: None,
            temperature: None,
            best_weighted_fitness: self.hall_of_fame.best().map(|c| c.weighted),
            degenerate_fits: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crossentropy::tests::{
        coords, coords_spec, evaluate, shape_changing_optimizee, uniform_optimizee,
    };
    use crate::individual::ParamValue;
    use crate::optimizee::FnOptimizee;

    fn params() -> GeneticAlgorithmParameters {
        GeneticAlgorithmParameters {
            seed: 42,
            popsize: 30,
            cxpb: 0.5,
            mutpb: 0.5,
            ngen: 40,
            indpb: 0.5,
            tournsize: 3,
            matepar: 0.5,
            mutpar: 0.3,
        }
    }

    #[test]
    fn test_population_size_is_constant() {
        let mut p = params();
        p.popsize = 12;
        p.ngen = 8;
        let mut ga =
            GeneticAlgorithmOptimizer::new(uniform_optimizee(1), FitnessWeights::maximize(), coords_spec(), p)
                .unwrap();
        let mut generations = 0;
        while !ga.is_terminated() {
            assert_eq!(ga.batch().len(), 12);
            assert_eq!(ga.population().len(), 12);
            let results = evaluate(ga.batch());
            ga.post_process(results).unwrap();
            generations += 1;
        }
        assert_eq!(generations, 8);
        assert!(ga.population().iter().all(|m| m.fitness.is_some()));
        assert_eq!(ga.end().generations, 8);
    }

    #[test]
    fn test_crossover_only_changes_every_offspring() {
        let mut p = params();
        p.popsize = 6;
        p.tournsize = 2;
        p.cxpb = 1.0;
        p.mutpb = 0.0;
        let ga =
            GeneticAlgorithmOptimizer::new(uniform_optimizee(2), FitnessWeights::maximize(), coords_spec(), p)
                .unwrap();

        let results = evaluate(ga.batch());
        let weighted: Vec<f64> = results.iter().map(|(_, f)| f.0[0]).collect();
        let genomes: Vec<Vec<f64>> = ga.batch().iter().map(coords).collect();

        let mut rng = XorShiftRng::seed_from_u64(9);
        let picks = ga.params.selection().select(&weighted, 6, &mut rng);
        let parents: Vec<Vec<f64>> = picks.iter().map(|i| genomes[*i].clone()).collect();
        let mut offspring = parents.clone();
        vary(&mut offspring, &ga.params, &mut rng);

        for pair in 0..3 {
            let (a, b) = (2 * pair, 2 * pair + 1);
            if parents[a] != parents[b] {
                assert!(offspring[a] != parents[a]);
                assert!(offspring[b] != parents[b]);
            }
        }
    }

    #[test]
    fn test_duplicates_are_remutated() {
        let mut p = params();
        p.cxpb = 0.0;
        p.mutpb = 0.0;
        p.indpb = 1.0;
        let mut rng = XorShiftRng::seed_from_u64(3);
        let mut offspring = vec![vec![1.0, 1.0]; 6];
        let remutated = vary(&mut offspring, &p, &mut rng);
        assert!(remutated > 0);
        assert_eq!(offspring[0], vec![1.0, 1.0]);
        let distinct = offspring
            .iter()
            .enumerate()
            .filter(|(i, o)| !offspring[..*i].iter().any(|e| same_genome(e, o)))
            .count();
        assert_eq!(distinct, remutated + 1);
    }

    #[test]
    fn test_offspring_are_bounded() {
        let mut p = params();
        p.mutpar = 5.0;
        p.ngen = 5;
        let clip = |mut ind: Individual| {
            if let Some(v) = ind.get_mut("coords") {
                for x in v.values_mut() {
                    *x = x.max(-1.0).min(1.0);
                }
            }
            ind
        };
        let mut rng = XorShiftRng::seed_from_u64(4);
        let optimizee = FnOptimizee::new(move || {
            let c: Vec<f64> = (0..2).map(|_| rng.gen_range(-5.0, 5.0)).collect();
            Individual::new().with("coords", c)
        })
        .with_bounds(clip);

        let mut ga = GeneticAlgorithmOptimizer::new(optimizee, FitnessWeights::maximize(), coords_spec(), p)
            .unwrap();
        while !ga.is_terminated() {
            for ind in ga.batch() {
                assert!(coords(ind).iter().all(|x| *x >= -1.0 && *x <= 1.0));
            }
            let results = evaluate(ga.batch());
            ga.post_process(results).unwrap();
        }
    }

    #[test]
    fn test_failed_proposal_leaves_state_untouched() {
        let mut p = params();
        p.popsize = 8;
        let mut ga = GeneticAlgorithmOptimizer::new(
            shape_changing_optimizee(10, 8),
            FitnessWeights::maximize(),
            coords_spec(),
            p,
        )
        .unwrap();
        let before = ga.snapshot();
        let batch = ga.batch().to_vec();

        for _ in 0..2 {
            assert!(ga.post_process(evaluate(&batch)).is_err());
            assert_eq!(ga.generation(), 0);
            assert_eq!(ga.snapshot(), before);
            assert!(ga.population().iter().all(|m| m.fitness.is_none()));
            assert!(ga.hall_of_fame().is_empty());
            assert_eq!(ga.batch(), &batch[..]);
        }
    }

    #[test]
    fn test_improves_on_sphere() {
        let mut ga = GeneticAlgorithmOptimizer::new(
            uniform_optimizee(6),
            FitnessWeights::maximize(),
            coords_spec(),
            params(),
        )
        .unwrap();
        while !ga.is_terminated() {
            let results = evaluate(ga.batch());
            ga.post_process(results).unwrap();
        }
        let report = ga.end();
        assert!(report.best.unwrap().weighted > -0.5);
        assert_eq!(report.hall_of_fame.len(), HALL_OF_FAME_SIZE);
        assert!(ga.snapshot().distribution.is_none());
    }

    #[test]
    fn test_resume_skips_evaluated_members() {
        let mut p = params();
        p.popsize = 4;
        let member = |x: f64, fitness: Option<f64>| Member {
            individual: Individual::new().with("coords", vec![x, x]),
            fitness: fitness.map(Fitness::from),
        };
        let population = vec![
            member(1.0, Some(-1.4)),
            member(2.0, None),
            member(3.0, Some(-4.2)),
            member(4.0, None),
        ];

        let mut ga = GeneticAlgorithmOptimizer::resume(
            uniform_optimizee(7),
            FitnessWeights::maximize(),
            coords_spec(),
            p.clone(),
            population.clone(),
        )
        .unwrap();
        assert_eq!(ga.batch().len(), 2);
        assert_eq!(
            ga.batch()[0].get("coords"),
            Some(&ParamValue::vector(vec![2.0, 2.0]))
        );
        assert_eq!(ga.hall_of_fame().len(), 2);

        let results = evaluate(ga.batch());
        assert_eq!(ga.post_process(results).unwrap(), Status::Running);
        assert_eq!(ga.batch().len(), 4);
        assert_eq!(ga.hall_of_fame().best().unwrap().weighted, -1.4);

        match GeneticAlgorithmOptimizer::resume(
            uniform_optimizee(7),
            FitnessWeights::maximize(),
            coords_spec(),
            p,
            population[..3].to_vec(),
        ) {
            Err(LtlError::Configuration(_)) => (),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn test_fully_evaluated_resume_breeds_immediately() {
        let mut p = params();
        p.popsize = 2;
        let population = vec![
            Member {
                individual: Individual::new().with("coords", vec![0.5, 0.5]),
                fitness: Some(Fitness::from(-0.7)),
            },
            Member {
                individual: Individual::new().with("coords", vec![1.0, 1.0]),
                fitness: Some(Fitness::from(-1.4)),
            },
        ];
        let mut ga = GeneticAlgorithmOptimizer::resume(
            uniform_optimizee(8),
            FitnessWeights::maximize(),
            coords_spec(),
            p,
            population,
        )
        .unwrap();
        assert!(ga.batch().is_empty());
        assert_eq!(ga.post_process(vec![]).unwrap(), Status::Running);
        assert_eq!(ga.batch().len(), 2);
    }

    #[test]
    fn test_parameter_names() {
        let json = r#"{"seed": 1, "popsize": 10, "CXPB": 0.5, "MUTPB": 0.2,
            "NGEN": 20, "indpb": 0.02, "tournsize": 3, "matepar": 0.5, "mutpar": 1.0}"#;
        let p: GeneticAlgorithmParameters = serde_json::from_str(json).unwrap();
        assert_eq!(p.cxpb, 0.5);
        assert_eq!(p.ngen, 20);
        assert!(p.validate().is_ok());

        let mut bad = p.clone();
        bad.mutpb = 2.0;
        assert!(bad.validate().is_err());
        bad.mutpb = 0.2;
        bad.tournsize = 0;
        assert!(bad.validate().is_err());
    }
}
