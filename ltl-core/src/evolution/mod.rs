//! Genetic operators on flat genomes
extern crate rand;
extern crate rand_xorshift;

mod ga;

use self::rand::distributions::{Distribution, Normal, Uniform};
use self::rand::Rng;
use self::rand_xorshift::XorShiftRng;

pub use self::ga::{GeneticAlgorithmOptimizer, GeneticAlgorithmParameters, Member};

/// How parents are picked from the population
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    /// Best of `size` individuals drawn uniformly with replacement
    Tournament {
        /// Number of aspirants per tournament
        size: usize,
    },
}

impl Selection {
    /// Returns `k` population indices, chosen by weighted fitness.
    pub fn select(&self, weighted: &[f64], k: usize, rng: &mut XorShiftRng) -> Vec<usize> {
        if weighted.is_empty() {
            return Vec::new();
        }
        match *self {
            Selection::Tournament { size } => {
                let dist = Uniform::from(0..weighted.len());
                (0..k)
                    .map(|_| {
                        let mut winner = dist.sample(rng);
                        for _ in 1..size {
                            let aspirant = dist.sample(rng);
                            if weighted[aspirant] > weighted[winner] {
                                winner = aspirant;
                            }
                        }
                        winner
                    })
                    .collect()
            }
        }
    }
}

/// How two parents exchange genes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Crossover {
    /// Per gene, `γ = (1 + 2α)u - α` with `u ~ U(0, 1)`; the children are
    /// `(1 - γ)x1 + γx2` and `γx1 + (1 - γ)x2`.
    Blend {
        /// Extent of the blend beyond the parents
        alpha: f64,
    },
}

impl Crossover {
    /// Mates two genomes in place
    pub fn mate(&self, x1: &mut [f64], x2: &mut [f64], rng: &mut XorShiftRng) {
        match *self {
            Crossover::Blend { alpha } => {
                for (a, b) in x1.iter_mut().zip(x2.iter_mut()) {
                    let gamma = (1. + 2. * alpha) * rng.gen::<f64>() - alpha;
                    let (old_a, old_b) = (*a, *b);
                    *a = (1. - gamma) * old_a + gamma * old_b;
                    *b = gamma * old_a + (1. - gamma) * old_b;
                }
            }
        }
    }
}

/// How a single genome is perturbed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Adds `N(mu, sigma^2)` to each gene with probability `indpb`
    Gaussian {
        /// Mean of the perturbation
        mu: f64,
        /// Standard deviation of the perturbation
        sigma: f64,
        /// Per-gene mutation probability
        indpb: f64,
    },
}

impl Mutation {
    /// Mutates a genome in place
    pub fn mutate(&self, genome: &mut [f64], rng: &mut XorShiftRng) {
        match *self {
            Mutation::Gaussian { mu, sigma, indpb } => {
                let normal = Normal::new(mu, sigma);
                for gene in genome.iter_mut() {
                    if rng.gen::<f64>() < indpb {
                        *gene += normal.sample(rng);
                    }
                }
            }
        }
    }
}
