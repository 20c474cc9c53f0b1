//! Sampling distributions for the cross-entropy family of optimizers.
//!
//! A distribution is refit once per generation from the selected samples and
//! is read-only while the next population is drawn from it.
extern crate nalgebra;
extern crate rand;
extern crate rand_xorshift;

use std::fmt::Debug;

use self::nalgebra::{DMatrix, DVector};
use self::rand::distributions::{Distribution as _, Normal};
use self::rand_xorshift::XorShiftRng;

use crate::error::{LtlError, Result};
use crate::intrinsics::{cholesky_factor, covariance, mean};

/// Result of a refit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitOutcome {
    /// Mean and covariance were both re-estimated
    Full,
    /// Too few samples to estimate a covariance; the previous one was kept
    DegenerateCovariance,
}

/// Serializable view of a distribution
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DistributionSnapshot {
    /// Kind of distribution
    pub kind: String,
    /// Mean, empty before the first fit
    pub mean: Vec<f64>,
    /// Covariance rows, empty before the first fit
    pub covariance: Vec<Vec<f64>>,
    /// Injected noise magnitude, when applicable
    pub noise_magnitude: Option<f64>,
}

/// A parametric distribution over flat parameter vectors
pub trait Distribution: Debug + Send {
    /// Refits the parameters to `samples`, blending with the previous
    /// parameters: `new = smoothing * old + (1 - smoothing) * estimate`.
    fn fit(&mut self, samples: &[Vec<f64>], smoothing: f64) -> FitOutcome;

    /// Draws `n` samples.  Returns nothing before the first fit.
    fn sample(&self, n: usize, rng: &mut XorShiftRng) -> Vec<Vec<f64>>;

    /// Per-dimension standard deviation, once fitted
    fn std_devs(&self) -> Option<Vec<f64>>;

    /// Snapshot of the current parameters
    fn snapshot(&self) -> DistributionSnapshot;

    /// Boxed copy, for staging a refit
    fn boxed(&self) -> Box<dyn Distribution>;
}

impl Clone for Box<dyn Distribution> {
    fn clone(&self) -> Self {
        self.boxed()
    }
}

/// Configuration for the sampling distribution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DistributionParameters {
    /// Multivariate Gaussian with full covariance
    Gaussian,
    /// Gaussian with decaying isotropic noise added to every sample
    NoisyGaussian {
        /// Initial variance of the injected noise
        noise_magnitude: f64,
        /// Factor applied to the noise magnitude after every fit
        noise_decay: f64,
    },
}

impl DistributionParameters {
    /// Checks the parameters are usable
    pub fn validate(&self) -> Result<()> {
        match self {
            DistributionParameters::Gaussian => Ok(()),
            DistributionParameters::NoisyGaussian {
                noise_magnitude,
                noise_decay,
            } => {
                if !(*noise_magnitude >= 0.0) || !noise_magnitude.is_finite() {
                    return Err(LtlError::config(format!(
                        "noise_magnitude must be finite and >= 0, got {}",
                        noise_magnitude
                    )));
                }
                if !(*noise_decay >= 0.0 && *noise_decay <= 1.0) {
                    return Err(LtlError::config(format!(
                        "noise_decay must be within [0, 1], got {}",
                        noise_decay
                    )));
                }
                Ok(())
            }
        }
    }

    /// Builds an unfitted distribution
    pub fn build(&self) -> Box<dyn Distribution> {
        match self {
            DistributionParameters::Gaussian => Box::new(Gaussian::new()),
            DistributionParameters::NoisyGaussian {
                noise_magnitude,
                noise_decay,
            } => Box::new(NoisyGaussian::new(*noise_magnitude, *noise_decay)),
        }
    }
}

/// Multivariate Gaussian
#[derive(Clone, Debug, Default)]
pub struct Gaussian {
    mean: Option<DVector<f64>>,
    covariance: Option<DMatrix<f64>>,
    // Cholesky factor of `covariance`, refreshed on every fit
    factor: Option<DMatrix<f64>>,
}

impl Gaussian {
    /// Unfitted Gaussian
    pub fn new() -> Self {
        Gaussian::default()
    }

    /// Gaussian with known parameters
    pub fn with_parameters(mean: Vec<f64>, cov: DMatrix<f64>) -> Result<Self> {
        let n = mean.len();
        if cov.nrows() != n || cov.ncols() != n {
            return Err(LtlError::shape(
                "covariance",
                format!("{}x{}", n, n),
                format!("{}x{}", cov.nrows(), cov.ncols()),
            ));
        }
        let factor = cholesky_factor(&cov);
        Ok(Gaussian {
            mean: Some(DVector::from_vec(mean)),
            covariance: Some(cov),
            factor: Some(factor),
        })
    }

    /// Current mean
    pub fn mean(&self) -> Option<&DVector<f64>> {
        self.mean.as_ref()
    }

    /// Current covariance
    pub fn covariance(&self) -> Option<&DMatrix<f64>> {
        self.covariance.as_ref()
    }
}

impl Distribution for Gaussian {
    fn fit(&mut self, samples: &[Vec<f64>], smoothing: f64) -> FitOutcome {
        if samples.is_empty() {
            return FitOutcome::DegenerateCovariance;
        }
        let dims = samples[0].len();
        let sample_mean = mean(samples);
        let sample_cov = covariance(samples, &sample_mean);
        let outcome = if sample_cov.is_some() {
            FitOutcome::Full
        } else {
            FitOutcome::DegenerateCovariance
        };

        self.mean = Some(match self.mean.take() {
            Some(old) => old * smoothing + sample_mean * (1.0 - smoothing),
            None => sample_mean,
        });

        self.covariance = Some(match (self.covariance.take(), sample_cov) {
            (Some(old), Some(new)) => old * smoothing + new * (1.0 - smoothing),
            (Some(old), None) => old,
            (None, Some(new)) => new,
            // nothing to fall back on yet
            (None, None) => DMatrix::identity(dims, dims),
        });

        self.factor = self.covariance.as_ref().map(cholesky_factor);
        outcome
    }

    fn sample(&self, n: usize, rng: &mut XorShiftRng) -> Vec<Vec<f64>> {
        let (mean, factor) = match (&self.mean, &self.factor) {
            (Some(m), Some(f)) => (m, f),
            _ => return Vec::new(),
        };
        let normal = Normal::new(0.0, 1.0);
        let dims = mean.len();
        (0..n)
            .map(|_| {
                let z = DVector::from_iterator(dims, (0..dims).map(|_| normal.sample(rng)));
                let x = mean + factor * z;
                x.iter().cloned().collect()
            })
            .collect()
    }

    fn std_devs(&self) -> Option<Vec<f64>> {
        self.covariance
            .as_ref()
            .map(|c| (0..c.nrows()).map(|i| c[(i, i)].max(0.0).sqrt()).collect())
    }

    fn snapshot(&self) -> DistributionSnapshot {
        DistributionSnapshot {
            kind: "Gaussian".into(),
            mean: self
                .mean
                .as_ref()
                .map(|m| m.iter().cloned().collect())
                .unwrap_or_default(),
            covariance: self
                .covariance
                .as_ref()
                .map(|c| {
                    c.row_iter()
                        .map(|r| r.iter().cloned().collect())
                        .collect()
                })
                .unwrap_or_default(),
            noise_magnitude: None,
        }
    }

    fn boxed(&self) -> Box<dyn Distribution> {
        Box::new(self.clone())
    }
}

/// Gaussian whose samples receive extra isotropic noise.
///
/// The noise has variance `noise_magnitude` in every dimension and the
/// magnitude is multiplied by `noise_decay` after every fit, so after `k`
/// fits it equals `initial * noise_decay^k`.
#[derive(Clone, Debug)]
pub struct NoisyGaussian {
    gaussian: Gaussian,
    noise_magnitude: f64,
    noise_decay: f64,
}

impl NoisyGaussian {
    /// Unfitted noisy Gaussian
    pub fn new(noise_magnitude: f64, noise_decay: f64) -> Self {
        NoisyGaussian {
            gaussian: Gaussian::new(),
            noise_magnitude: noise_magnitude,
            noise_decay: noise_decay,
        }
    }

    /// Current noise variance
    pub fn noise_magnitude(&self) -> f64 {
        self.noise_magnitude
    }

    /// Underlying Gaussian
    pub fn gaussian(&self) -> &Gaussian {
        &self.gaussian
    }
}

impl Distribution for NoisyGaussian {
    fn fit(&mut self, samples: &[Vec<f64>], smoothing: f64) -> FitOutcome {
        let outcome = self.gaussian.fit(samples, smoothing);
        self.noise_magnitude *= self.noise_decay;
        outcome
    }

    fn sample(&self, n: usize, rng: &mut XorShiftRng) -> Vec<Vec<f64>> {
        let mut samples = self.gaussian.sample(n, rng);
        if self.noise_magnitude > 0.0 {
            let noise = Normal::new(0.0, self.noise_magnitude.sqrt());
            for s in samples.iter_mut() {
                for v in s.iter_mut() {
                    *v += noise.sample(rng);
                }
            }
        }
        samples
    }

    fn std_devs(&self) -> Option<Vec<f64>> {
        self.gaussian
            .std_devs()
            .map(|sd| sd.into_iter().map(|s| (s * s + self.noise_magnitude).sqrt()).collect())
    }

    fn snapshot(&self) -> DistributionSnapshot {
        let mut snap = self.gaussian.snapshot();
        snap.kind = "NoisyGaussian".into();
        snap.noise_magnitude = Some(self.noise_magnitude);
        snap
    }

    fn boxed(&self) -> Box<dyn Distribution> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::rand::SeedableRng;

    #[test]
    fn test_first_fit_uses_sample_statistics() {
        let mut g = Gaussian::new();
        let samples = vec![vec![0., 0.], vec![2., 4.]];
        assert_eq!(g.fit(&samples, 0.7), FitOutcome::Full);
        assert_eq!(g.mean().unwrap().as_slice(), &[1., 2.]);
        assert!((g.covariance().unwrap()[(1, 1)] - 8.).abs() < 1e-12);
    }

    #[test]
    fn test_smoothing_blends_parameters() {
        let mut g = Gaussian::new();
        g.fit(&[vec![0.], vec![2.]], 0.);
        g.fit(&[vec![10.], vec![14.]], 0.25);
        // 0.25 * 1 + 0.75 * 12
        assert!((g.mean().unwrap()[0] - 9.25).abs() < 1e-12);
        // 0.25 * 2 + 0.75 * 8
        assert!((g.covariance().unwrap()[(0, 0)] - 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_sample_keeps_previous_covariance() {
        let mut g = Gaussian::new();
        g.fit(&[vec![0., 0.], vec![2., 2.]], 0.);
        let before = g.covariance().unwrap().clone();
        assert_eq!(g.fit(&[vec![5., 5.]], 0.), FitOutcome::DegenerateCovariance);
        assert_eq!(g.covariance().unwrap(), &before);
        assert_eq!(g.mean().unwrap().as_slice(), &[5., 5.]);

        // with no history, a single sample yields the identity
        let mut fresh = Gaussian::new();
        assert_eq!(fresh.fit(&[vec![1., 1.]], 0.), FitOutcome::DegenerateCovariance);
        assert_eq!(fresh.covariance().unwrap(), &DMatrix::identity(2, 2));
    }

    #[test]
    fn test_samples_follow_parameters() {
        let cov = DMatrix::from_row_slice(2, 2, &[1., 0.5, 0.5, 2.]);
        let g = Gaussian::with_parameters(vec![3., -1.], cov).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(42);
        let samples = g.sample(20000, &mut rng);
        assert_eq!(samples.len(), 20000);

        let m = mean(&samples);
        assert!((m[0] - 3.).abs() < 0.05);
        assert!((m[1] + 1.).abs() < 0.05);
        let c = covariance(&samples, &m).unwrap();
        assert!((c[(0, 1)] - 0.5).abs() < 0.1);
        assert!((c[(1, 1)] - 2.).abs() < 0.1);
    }

    #[test]
    fn test_unfitted_samples_nothing() {
        let mut rng = XorShiftRng::seed_from_u64(1);
        assert!(Gaussian::new().sample(5, &mut rng).is_empty());
    }

    #[test]
    fn test_noise_decays_geometrically() {
        let mut ng = NoisyGaussian::new(2.0, 0.9);
        let samples = vec![vec![0., 1.], vec![1., 0.], vec![0.5, 0.5]];
        for k in 1..=5 {
            ng.fit(&samples, 0.);
            let expected = 2.0 * 0.9f64.powi(k);
            assert!((ng.noise_magnitude() - expected).abs() < 1e-12);
        }
        assert_eq!(ng.snapshot().noise_magnitude, Some(ng.noise_magnitude()));
    }

    #[test]
    fn test_noise_widens_samples() {
        let mut ng = NoisyGaussian::new(4.0, 1.0);
        ng.fit(&[vec![0.], vec![0.0001]], 0.);
        let mut rng = XorShiftRng::seed_from_u64(7);
        let samples = ng.sample(20000, &mut rng);
        let m = mean(&samples);
        let var = covariance(&samples, &m).unwrap()[(0, 0)];
        assert!((var - 4.).abs() < 0.3);
    }

    #[test]
    fn test_boxed_copy_is_independent() {
        let mut original: Box<dyn Distribution> = Box::new(NoisyGaussian::new(1.0, 0.5));
        original.fit(&[vec![0.], vec![2.]], 0.);
        let mut copy = original.clone();
        copy.fit(&[vec![10.], vec![14.]], 0.);
        assert_eq!(original.snapshot().mean, vec![1.]);
        assert_eq!(original.snapshot().noise_magnitude, Some(0.5));
        assert_eq!(copy.snapshot().mean, vec![12.]);
        assert_eq!(copy.snapshot().noise_magnitude, Some(0.25));
    }

    #[test]
    fn test_validate() {
        let bad = DistributionParameters::NoisyGaussian {
            noise_magnitude: -1.,
            noise_decay: 0.5,
        };
        assert!(bad.validate().is_err());
        let bad = DistributionParameters::NoisyGaussian {
            noise_magnitude: 1.,
            noise_decay: 1.5,
        };
        assert!(bad.validate().is_err());
        assert!(DistributionParameters::Gaussian.validate().is_ok());
    }
}
