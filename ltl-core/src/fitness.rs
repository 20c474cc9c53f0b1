//! Fitness values, objective weights and the hall of fame.
extern crate float_ord;

use self::float_ord::FloatOrd;

use crate::error::{LtlError, Result};
use crate::individual::Individual;
use crate::intrinsics::dot;

/// Number of best individuals remembered across generations
pub const HALL_OF_FAME_SIZE: usize = 20;

/// Raw fitness reported by the optimizee, one value per objective
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fitness(pub Vec<f64>);

impl Fitness {
    /// Returns the objective values
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Number of objectives
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no objectives
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<f64> for Fitness {
    fn from(v: f64) -> Self {
        Fitness(vec![v])
    }
}

impl From<Vec<f64>> for Fitness {
    fn from(v: Vec<f64>) -> Self {
        Fitness(v)
    }
}

/// Per-objective weights.  The weighted fitness is the dot product of the raw
/// fitness with these weights, and higher weighted fitness is always better:
/// a negative weight turns an objective into a minimization target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitnessWeights(Vec<f64>);

impl FitnessWeights {
    /// Creates a weight vector.  Must be non-empty and finite.
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(LtlError::config("fitness weights must not be empty"));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(LtlError::config(format!(
                "fitness weights must be finite, got {:?}",
                weights
            )));
        }
        Ok(FitnessWeights(weights))
    }

    /// Single objective to minimize
    pub fn minimize() -> Self {
        FitnessWeights(vec![-1.0])
    }

    /// Single objective to maximize
    pub fn maximize() -> Self {
        FitnessWeights(vec![1.0])
    }

    /// Number of objectives
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; weights are never empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the weights
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Ensures `fitness` has one value per weight
    pub fn check(&self, fitness: &Fitness) -> Result<()> {
        if fitness.len() != self.0.len() {
            return Err(LtlError::incomplete(format!(
                "fitness has {} values, expected {}",
                fitness.len(),
                self.0.len()
            )));
        }
        Ok(())
    }

    #[inline]
    /// Weighted fitness.  Assumes `check` has passed.
    pub fn weigh(&self, fitness: &Fitness) -> f64 {
        dot(&self.0, &fitness.0)
    }
}

/// An evaluated individual
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Named parameters
    pub individual: Individual,
    /// Flattened parameters
    pub genome: Vec<f64>,
    /// Raw fitness
    pub fitness: Fitness,
    /// Weighted fitness
    pub weighted: f64,
}

/// Indices of `weighted` sorted best first.  Ties keep their original order.
pub fn rank(weighted: &[f64]) -> Vec<usize> {
    let mut idxs: Vec<usize> = (0..weighted.len()).collect();
    idxs.sort_by_key(|i| FloatOrd(-weighted[*i]));
    idxs
}

/// Bounded record of the best distinct individuals ever seen.
///
/// Entries are kept sorted best first and two entries never share a genome.
/// Updating can only replace the current worst entry with a strictly better
/// candidate, so the record improves monotonically.
#[derive(Clone, Debug, Serialize)]
pub struct HallOfFame {
    capacity: usize,
    entries: Vec<Candidate>,
}

impl HallOfFame {
    /// Creates an empty hall of fame holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        HallOfFame {
            capacity: capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Offers every candidate for inclusion
    pub fn update<I: IntoIterator<Item = Candidate>>(&mut self, candidates: I) {
        if self.capacity == 0 {
            return;
        }
        for cand in candidates {
            if self.entries.iter().any(|e| same_genome(&e.genome, &cand.genome)) {
                continue;
            }

            if self.entries.len() == self.capacity {
                match self.entries.last() {
                    Some(worst) if cand.weighted > worst.weighted => {
                        self.entries.pop();
                    }
                    _ => continue,
                }
            }

            let pos = self
                .entries
                .iter()
                .position(|e| e.weighted < cand.weighted)
                .unwrap_or(self.entries.len());
            self.entries.insert(pos, cand);
        }
    }

    /// Best entry
    pub fn best(&self) -> Option<&Candidate> {
        self.entries.first()
    }

    /// Entries, best first
    pub fn entries(&self) -> &[Candidate] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Bitwise genome equality, matching duplicate detection on flattened tuples
pub fn same_genome(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cand(x: f64, weighted: f64) -> Candidate {
        Candidate {
            individual: Individual::new().with("x", x),
            genome: vec![x],
            fitness: Fitness::from(-weighted),
            weighted: weighted,
        }
    }

    #[test]
    fn test_weights() {
        let w = FitnessWeights::new(vec![-0.1, 2.0]).unwrap();
        assert!((w.weigh(&Fitness(vec![10., 1.])) - 1.0).abs() < 1e-12);
        assert!(w.check(&Fitness::from(1.0)).is_err());
        assert!(FitnessWeights::new(vec![]).is_err());
        assert!(FitnessWeights::new(vec![std::f64::NAN]).is_err());
    }

    #[test]
    fn test_rank_is_stable() {
        let order = rank(&[1.0, 3.0, 1.0, 2.0, 3.0]);
        assert_eq!(order, vec![1, 4, 3, 0, 2]);
    }

    #[test]
    fn test_hall_of_fame_keeps_best_distinct() {
        let mut hof = HallOfFame::new(3);
        hof.update(vec![cand(1., 1.), cand(2., 5.), cand(3., 3.)]);
        hof.update(vec![cand(2., 5.), cand(4., 0.5), cand(5., 4.)]);

        let weighted: Vec<f64> = hof.entries().iter().map(|c| c.weighted).collect();
        assert_eq!(weighted, vec![5., 4., 3.]);
        assert_eq!(hof.best().map(|c| c.genome.clone()), Some(vec![2.]));
    }

    #[test]
    fn test_hall_of_fame_zero_capacity() {
        let mut hof = HallOfFame::new(0);
        hof.update(vec![cand(1., 1.)]);
        assert!(hof.is_empty());
    }

    proptest! {
        #[test]
        fn prop_hall_of_fame_holds_top_k(
            genes in prop::collection::vec(0_i32..50, 1..120),
            k in 1_usize..25
        ) {
            // Distinct genomes map to distinct weighted fitness
            let stream: Vec<Candidate> = genes
                .iter()
                .map(|g| cand(*g as f64, -((*g as f64).powi(2))))
                .collect();

            let mut hof = HallOfFame::new(k);
            for chunk in stream.chunks(7) {
                hof.update(chunk.to_vec());
            }

            let mut distinct: Vec<i32> = genes.clone();
            distinct.sort();
            distinct.dedup();
            let mut expected: Vec<f64> = distinct.iter().map(|g| -((*g as f64).powi(2))).collect();
            expected.sort_by(|a, b| b.partial_cmp(a).unwrap());
            expected.truncate(k);

            let got: Vec<f64> = hof.entries().iter().map(|c| c.weighted).collect();
            prop_assert!(hof.len() <= k);
            prop_assert_eq!(got, expected);
        }
    }
}
