//! Interfaces for the inner loop: the thing being optimized.
use crate::fitness::Fitness;
use crate::individual::Individual;

/// Source of candidate individuals for an optimizer.
///
/// Optimizers never evaluate fitness themselves.  They only need to create
/// individuals (generation 0, or whenever they need fresh samples) and to
/// project proposals back into the feasible region.
pub trait Optimizee {
    /// Creates a random individual.  Every call must be independent.
    fn create_individual(&mut self) -> Individual;

    /// Clips an individual into the feasible region.  Must be idempotent.
    fn bounding_func(&self, individual: Individual) -> Individual {
        individual
    }
}

/// Evaluates an individual.  Used by schedulers, which may call it from many
/// threads at once.
pub trait Simulate: Send + Sync {
    /// Returns the fitness of `individual`, one value per objective.
    fn simulate(&self, individual: &Individual) -> Fitness;
}

/// Optimizee built from closures
pub struct FnOptimizee<C, B> {
    create: C,
    bound: B,
}

impl<C> FnOptimizee<C, fn(Individual) -> Individual>
where
    C: FnMut() -> Individual,
{
    /// Wraps a creation function; bounding is the identity.
    pub fn new(create: C) -> Self {
        FnOptimizee {
            create: create,
            bound: identity,
        }
    }
}

impl<C, B> FnOptimizee<C, B>
where
    C: FnMut() -> Individual,
    B: Fn(Individual) -> Individual,
{
    /// Replaces the bounding function
    pub fn with_bounds<B2>(self, bound: B2) -> FnOptimizee<C, B2>
    where
        B2: Fn(Individual) -> Individual,
    {
        FnOptimizee {
            create: self.create,
            bound: bound,
        }
    }
}

fn identity(individual: Individual) -> Individual {
    individual
}

impl<C, B> Optimizee for FnOptimizee<C, B>
where
    C: FnMut() -> Individual,
    B: Fn(Individual) -> Individual,
{
    fn create_individual(&mut self) -> Individual {
        (self.create)()
    }

    fn bounding_func(&self, individual: Individual) -> Individual {
        (self.bound)(individual)
    }
}

impl<F> Simulate for F
where
    F: Fn(&Individual) -> Fitness + Send + Sync,
{
    fn simulate(&self, individual: &Individual) -> Fitness {
        self(individual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::ParamValue;

    #[test]
    fn test_fn_optimizee() {
        let mut calls = 0.0;
        let mut opt = FnOptimizee::new(move || {
            calls += 1.0;
            Individual::new().with("x", calls)
        })
        .with_bounds(|mut ind: Individual| {
            if let Some(ParamValue::Scalar(x)) = ind.get_mut("x") {
                *x = x.min(1.5);
            }
            ind
        });

        let first = opt.create_individual();
        let second = opt.create_individual();
        assert_eq!(first.get("x"), Some(&ParamValue::Scalar(1.0)));
        assert_eq!(
            opt.bounding_func(second.clone()).get("x"),
            Some(&ParamValue::Scalar(1.5))
        );

        // idempotent
        let once = opt.bounding_func(second);
        assert_eq!(opt.bounding_func(once.clone()), once);
    }

    #[test]
    fn test_closure_simulate() {
        let sim = |ind: &Individual| Fitness::from(ind.get("x").map(|v| v.values()[0]).unwrap_or(0.));
        assert_eq!(sim.simulate(&Individual::new().with("x", 2.0)), Fitness::from(2.0));
    }
}
