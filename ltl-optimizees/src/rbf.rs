//! Sum-of-Gaussians landscape
use std::f64::consts::PI;

use ltl_core;
use nalgebra;
use rand;
use rand_xorshift;

use self::ltl_core::individual::Shape;
use self::ltl_core::{Fitness, Individual, LtlError, Optimizee, ParamSpec, Result, Simulate};
use self::nalgebra::{DMatrix, DVector};
use self::rand::{Rng, SeedableRng};
use self::rand_xorshift::XorShiftRng;

use super::{clip_coords, COORDS};

const BOUNDS: (f64, f64) = (-5., 5.);

/// Parameters of one Gaussian bump
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianBump {
    /// Covariance rows, `dims x dims`
    pub covariance: Vec<Vec<f64>>,
    /// Center, `dims` values
    pub mean: Vec<f64>,
}

#[derive(Clone, Debug)]
struct Bump {
    mean: DVector<f64>,
    inverse: DMatrix<f64>,
    scale: f64,
}

impl Bump {
    fn density(&self, x: &DVector<f64>) -> f64 {
        let diff = x - &self.mean;
        self.scale * (-0.5 * diff.dot(&(&self.inverse * &diff))).exp()
    }
}

/// Landscape whose value is the sum of the bumps' probability densities
#[derive(Clone, Debug)]
pub struct RbfLandscape {
    dims: usize,
    bumps: Vec<Bump>,
}

impl RbfLandscape {
    /// Validates every bump against `dims` and precomputes its inverse
    /// covariance and normalization.
    pub fn new(bumps: &[GaussianBump], dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(LtlError::config("an RBF landscape needs at least one dimension"));
        }
        let mut out = Vec::with_capacity(bumps.len());
        for (i, b) in bumps.iter().enumerate() {
            if b.mean.len() != dims {
                return Err(LtlError::shape(
                    format!("bump {} mean", i),
                    dims,
                    b.mean.len(),
                ));
            }
            if b.covariance.len() != dims || b.covariance.iter().any(|r| r.len() != dims) {
                return Err(LtlError::shape(
                    format!("bump {} covariance", i),
                    format!("{}x{}", dims, dims),
                    format!(
                        "{} rows of {:?}",
                        b.covariance.len(),
                        b.covariance.iter().map(|r| r.len()).collect::<Vec<_>>()
                    ),
                ));
            }

            let cov = DMatrix::from_fn(dims, dims, |r, c| b.covariance[r][c]);
            let det = cov.determinant();
            let inverse = match cov.try_inverse() {
                Some(inv) if det > 0.0 => inv,
                _ => {
                    return Err(LtlError::config(format!(
                        "bump {} covariance is not positive definite",
                        i
                    )))
                }
            };
            out.push(Bump {
                mean: DVector::from_column_slice(&b.mean),
                inverse: inverse,
                scale: 1. / ((2. * PI).powi(dims as i32) * det).sqrt(),
            });
        }
        Ok(RbfLandscape {
            dims: dims,
            bumps: out,
        })
    }

    /// Number of dimensions
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Value at `x`
    pub fn cost(&self, x: &[f64]) -> f64 {
        let x = DVector::from_column_slice(x);
        self.bumps.iter().map(|b| b.density(&x)).sum()
    }
}

impl Simulate for RbfLandscape {
    fn simulate(&self, individual: &Individual) -> Fitness {
        match individual.get(COORDS) {
            Some(v) if v.shape() == Shape::Array(vec![self.dims]) => {
                Fitness::from(self.cost(v.values()))
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

/// Optimizee over an RBF landscape, searched within `[-5, 5]` per dimension
pub struct RbfOptimizee {
    landscape: RbfLandscape,
    rng: XorShiftRng,
}

impl RbfOptimizee {
    /// Builds the optimizee
    pub fn new(landscape: RbfLandscape, seed: u64) -> Self {
        RbfOptimizee {
            landscape: landscape,
            rng: XorShiftRng::seed_from_u64(seed),
        }
    }

    /// Layout of the individuals
    pub fn spec(&self) -> ParamSpec {
        ParamSpec::from_individual(&Individual::new().with(COORDS, vec![0.0; self.landscape.dims]))
    }

    /// Evaluator for the individuals of this optimizee
    pub fn simulator(&self) -> RbfLandscape {
        self.landscape.clone()
    }
}

impl Optimizee for RbfOptimizee {
    fn create_individual(&mut self) -> Individual {
        let rng = &mut self.rng;
        let coords: Vec<f64> = (0..self.landscape.dims)
            .map(|_| rng.gen_range(BOUNDS.0, BOUNDS.1))
            .collect();
        Individual::new().with(COORDS, coords)
    }

    fn bounding_func(&self, individual: Individual) -> Individual {
        clip_coords(individual, BOUNDS.0, BOUNDS.1)
    }
}
