//! Library defining optimizees to run the optimizers against
#![warn(missing_docs, unused)]

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;

/// Defines benchmark cost functions
pub mod function;

/// Defines landscapes built from Gaussian radial basis functions
pub mod rbf;

pub use crate::function::{CostFunction, FunctionOptimizee, FunctionSimulator};
pub use crate::rbf::{GaussianBump, RbfLandscape, RbfOptimizee};

use ltl_core::Individual;

/// Name of the single parameter carried by the individuals of this crate
pub const COORDS: &str = "coords";

/// Clips every value of `coords` into `[lo, hi]`
fn clip_coords(mut individual: Individual, lo: f64, hi: f64) -> Individual {
    if let Some(v) = individual.get_mut(COORDS) {
        for x in v.values_mut() {
            *x = x.max(lo).min(hi);
        }
    }
    individual
}
