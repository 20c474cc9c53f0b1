//! Helper functions for vector and matrix math
extern crate nalgebra;

use self::nalgebra::{DMatrix, DVector};

/// Dot product
pub fn dot(v1: &[f64], v2: &[f64]) -> f64 {
    assert_eq!(v1.len(), v2.len());
    v1.iter().zip(v2.iter()).map(|(a, b)| a * b).sum()
}

/// L2 norm
pub fn l2norm(v1: &[f64]) -> f64 {
    dot(v1, v1).sqrt()
}

/// Column-wise mean of a set of samples.  Samples must share a length.
pub fn mean(samples: &[Vec<f64>]) -> DVector<f64> {
    let dims = samples.first().map(|s| s.len()).unwrap_or(0);
    let mut m = DVector::zeros(dims);
    for s in samples {
        for (i, v) in s.iter().enumerate() {
            m[i] += v;
        }
    }
    if !samples.is_empty() {
        m /= samples.len() as f64;
    }
    m
}

/// Unbiased sample covariance around `mean`.  Needs at least two samples.
pub fn covariance(samples: &[Vec<f64>], mean: &DVector<f64>) -> Option<DMatrix<f64>> {
    if samples.len() < 2 {
        return None;
    }
    let dims = mean.len();
    let mut cov = DMatrix::zeros(dims, dims);
    for s in samples {
        let centered = DVector::from_iterator(dims, s.iter().zip(mean.iter()).map(|(x, m)| x - m));
        cov += &centered * centered.transpose();
    }
    cov /= (samples.len() - 1) as f64;
    Some(cov)
}

/// Lower-triangular factor `L` with `L * L^T ≈ cov`.
///
/// Sample covariances are often only positive semi-definite, so a growing
/// diagonal jitter is tried before falling back to the square root of the
/// diagonal.
pub fn cholesky_factor(cov: &DMatrix<f64>) -> DMatrix<f64> {
    let n = cov.nrows();
    let mut jitter = 0.0;
    for _ in 0..8 {
        let attempt = cov + DMatrix::identity(n, n) * jitter;
        if let Some(chol) = attempt.cholesky() {
            return chol.l();
        }
        jitter = if jitter == 0.0 { 1e-12 } else { jitter * 100.0 };
    }
    warn!(target: "ltl::intrinsics", "Covariance is not positive definite; sampling from its diagonal");
    DMatrix::from_fn(n, n, |i, j| if i == j { cov[(i, i)].max(0.0).sqrt() } else { 0.0 })
}
