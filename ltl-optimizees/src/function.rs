//! Benchmark cost functions as optimizees
use std::f64::consts::{E, PI};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use ltl_core;
use rand;
use rand_xorshift;

use self::ltl_core::individual::Shape;
use self::ltl_core::{Fitness, Individual, LtlError, Optimizee, ParamSpec, Result, Simulate};
use self::rand::distributions::{Distribution, Normal};
use self::rand::{Rng, SeedableRng};
use self::rand_xorshift::XorShiftRng;

use super::{clip_coords, COORDS};

/// Named benchmark landscapes.  All of them have their global minimum at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostFunction {
    /// Sum of squares
    Sphere,
    /// Highly multimodal, minimum at the origin
    Rastrigin,
    /// Curved valley, minimum at (1, ..., 1)
    Rosenbrock,
    /// Nearly flat outer region with a deep hole at the origin
    Ackley,
    /// Two dimensional narrow chasm along the y axis
    Chasm,
}

impl CostFunction {
    /// Looks up a function by name
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "sphere" => Ok(CostFunction::Sphere),
            "rastrigin" => Ok(CostFunction::Rastrigin),
            "rosenbrock" => Ok(CostFunction::Rosenbrock),
            "ackley" => Ok(CostFunction::Ackley),
            "chasm" => Ok(CostFunction::Chasm),
            other => Err(LtlError::config(format!(
                "unknown cost function '{}', expected one of sphere, rastrigin, rosenbrock, ackley, chasm",
                other
            ))),
        }
    }

    /// Lower-case name
    pub fn name(&self) -> &'static str {
        match self {
            CostFunction::Sphere => "sphere",
            CostFunction::Rastrigin => "rastrigin",
            CostFunction::Rosenbrock => "rosenbrock",
            CostFunction::Ackley => "ackley",
            CostFunction::Chasm => "chasm",
        }
    }

    /// Search box shared by every coordinate
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            CostFunction::Sphere => (-5., 5.),
            CostFunction::Rastrigin => (-5., 5.),
            CostFunction::Rosenbrock => (-2., 2.),
            CostFunction::Ackley => (-20., 20.),
            CostFunction::Chasm => (-5., 5.),
        }
    }

    /// Checks the function is defined in `dims` dimensions
    pub fn check_dims(&self, dims: usize) -> Result<()> {
        let ok = match self {
            CostFunction::Rosenbrock => dims >= 2,
            CostFunction::Chasm => dims == 2,
            _ => dims >= 1,
        };
        if ok {
            Ok(())
        } else {
            Err(LtlError::config(format!(
                "{} is not defined in {} dimensions",
                self.name(),
                dims
            )))
        }
    }

    /// Evaluates the function
    pub fn cost(&self, x: &[f64]) -> f64 {
        let n = x.len() as f64;
        match self {
            CostFunction::Sphere => x.iter().map(|v| v * v).sum(),
            CostFunction::Rastrigin => {
                10. * n
                    + x.iter()
                        .map(|v| v * v - 10. * (2. * PI * v).cos())
                        .sum::<f64>()
            }
            CostFunction::Rosenbrock => x
                .windows(2)
                .map(|w| 100. * (w[1] - w[0] * w[0]).powi(2) + (1. - w[0]).powi(2))
                .sum(),
            CostFunction::Ackley => {
                let sq = x.iter().map(|v| v * v).sum::<f64>() / n;
                let cos = x.iter().map(|v| (2. * PI * v).cos()).sum::<f64>() / n;
                -20. * (-0.2 * sq.sqrt()).exp() - cos.exp() + 20. + E
            }
            CostFunction::Chasm => {
                let (a, b) = (x[0].abs(), x[1].abs());
                1e3 * a / (1e3 * b + 1.) + 1e-2 * b
            }
        }
    }
}

impl FromStr for CostFunction {
    type Err = LtlError;

    fn from_str(s: &str) -> Result<Self> {
        CostFunction::from_name(s)
    }
}

impl fmt::Display for CostFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Optimizee over a benchmark function.  Individuals carry a single `coords`
/// vector drawn uniformly from the function's bounds.
pub struct FunctionOptimizee {
    cost: CostFunction,
    dims: usize,
    noise: f64,
    seed: u64,
    rng: XorShiftRng,
}

impl FunctionOptimizee {
    /// Builds an optimizee in `dims` dimensions
    pub fn new(cost: CostFunction, dims: usize, seed: u64) -> Result<Self> {
        cost.check_dims(dims)?;
        Ok(FunctionOptimizee {
            cost: cost,
            dims: dims,
            noise: 0.0,
            seed: seed,
            rng: XorShiftRng::seed_from_u64(seed),
        })
    }

    /// Adds Gaussian noise with standard deviation `sigma` to every evaluation
    pub fn with_noise(mut self, sigma: f64) -> Result<Self> {
        if !(sigma >= 0.0) || !sigma.is_finite() {
            return Err(LtlError::config(format!(
                "noise must be finite and >= 0, got {}",
                sigma
            )));
        }
        self.noise = sigma;
        Ok(self)
    }

    /// Cost function
    pub fn cost_function(&self) -> CostFunction {
        self.cost
    }

    /// Layout of the individuals
    pub fn spec(&self) -> ParamSpec {
        ParamSpec::from_individual(&Individual::new().with(COORDS, vec![0.0; self.dims]))
    }

    /// Evaluator for the individuals of this optimizee
    pub fn simulator(&self) -> FunctionSimulator {
        FunctionSimulator {
            cost: self.cost,
            dims: self.dims,
            noise: self.noise,
            rng: Mutex::new(XorShiftRng::seed_from_u64(self.seed.wrapping_add(1))),
        }
    }
}

impl Optimizee for FunctionOptimizee {
    fn create_individual(&mut self) -> Individual {
        let (lo, hi) = self.cost.bounds();
        let rng = &mut self.rng;
        let coords: Vec<f64> = (0..self.dims).map(|_| rng.gen_range(lo, hi)).collect();
        Individual::new().with(COORDS, coords)
    }

    fn bounding_func(&self, individual: Individual) -> Individual {
        let (lo, hi) = self.cost.bounds();
        clip_coords(individual, lo, hi)
    }
}

/// Evaluates benchmark functions, optionally with additive noise.  Safe to
/// share across threads.
pub struct FunctionSimulator {
    cost: CostFunction,
    dims: usize,
    noise: f64,
    rng: Mutex<XorShiftRng>,
}

impl FunctionSimulator {
    fn noise(&self) -> f64 {
        if self.noise <= 0.0 {
            return 0.0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        Normal::new(0.0, self.noise).sample(&mut *rng)
    }
}

impl Simulate for FunctionSimulator {
    fn simulate(&self, individual: &Individual) -> Fitness {
        match individual.get(COORDS) {
            Some(v) if v.shape() == Shape::Array(vec![self.dims]) => {
                Fitness::from(self.cost.cost(v.values()) + self.noise())
            }
            _ => {
                warn!(
                    target: "ltl::optimizees",
                    "Individual {} has no {}-dimensional coords",
                    individual, self.dims
                );
                Fitness::from(std::f64::NAN)
            }
        }
    }
}
