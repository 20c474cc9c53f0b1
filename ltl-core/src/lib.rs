//! LTL-Core
//! ===
//!
//! This library contains the outer loop of a learning-to-learn setup: black-box
//! optimizers that propose batches of parameter sets ("individuals") for an
//! optimizee, receive their fitness and propose the next batch.  Optimizers
//! never evaluate fitness themselves, so batches can be evaluated sequentially,
//! on a thread pool or on a cluster.
//!
//! Out of the box, it contains three optimizers.
//!
//! Cross-Entropy
//! ---
//! Samples each generation from a parametric distribution (Gaussian or
//! NoisyGaussian) and refits the distribution to the best `rho` fraction of
//! the population, optionally smoothed with the previous parameters and with
//! temperature-annealed admission of near-elite individuals.
//!
//! FACE
//! ---
//! A cross-entropy variant whose population size adapts between a minimum and
//! a maximum depending on how fast the best fitness improves, and whose elite
//! set is expanded with jittered copies before each refit.
//!
//! Genetic Algorithm
//! ---
//! A generational GA with tournament selection, blend crossover, Gaussian
//! mutation and re-mutation of duplicate offspring.  It can resume from a
//! partially evaluated population.
//!
//! Individuals are encoded to flat `f64` vectors through a `ParamSpec`; the
//! optimizers work on those vectors and decode them again before proposing.

#![warn(missing_docs, unused)]

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;

/// Error type shared by every optimizer
pub mod error;

/// Individuals and their flat encoding
pub mod individual;

/// Fitness vectors, objective weights and the hall of fame
pub mod fitness;

/// Vector and matrix helpers
pub mod intrinsics;

/// Interfaces implemented by optimizees
pub mod optimizee;

/// Defines the step-wise optimizer interface and its shared bookkeeping
pub mod optimizer;

/// Sampling distributions
pub mod distribution;

/// Defines the Cross-Entropy optimizer
pub mod crossentropy;

/// Defines the FACE optimizer
pub mod face;

/// Defines the Genetic Algorithm optimizer and its operators
pub mod evolution;

pub use crate::crossentropy::{CrossEntropyOptimizer, CrossEntropyParameters};
pub use crate::distribution::{DistributionParameters, Gaussian, NoisyGaussian};
pub use crate::error::{LtlError, Result};
pub use crate::evolution::{GeneticAlgorithmOptimizer, GeneticAlgorithmParameters};
pub use crate::face::{FaceOptimizer, FaceParameters};
pub use crate::fitness::{Fitness, FitnessWeights};
pub use crate::individual::{flatten, unflatten, Individual, ParamSpec, ParamValue, Shape};
pub use crate::optimizee::{Optimizee, Simulate};
pub use crate::optimizer::{AlgorithmParameters, Optimizer, Report, Status};
