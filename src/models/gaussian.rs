//! Multivariate Gaussian distribution for HMM emissions

use super::linalg::{cholesky, log_det, solve_lower};
use super::ModelError;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;

/// Multivariate Gaussian with a full covariance matrix
#[derive(Debug, Clone)]
pub struct MultivariateGaussian {
    /// Mean vector
    pub mean: Array1<f64>,
    /// Covariance matrix
    pub covariance: Array2<f64>,
    /// Cholesky factor of the covariance
    chol: Array2<f64>,
    /// Log determinant of the covariance
    log_det: f64,
}

impl MultivariateGaussian {
    /// Create new multivariate Gaussian
    ///
    /// Fails if the covariance is not symmetric positive definite.
    pub fn new(mean: Array1<f64>, covariance: Array2<f64>) -> Result<Self, ModelError> {
        let d = mean.len();
        if covariance.nrows() != d || covariance.ncols() != d {
            return Err(ModelError::DimensionMismatch {
                expected: d,
                got: covariance.nrows(),
            });
        }

        let chol = cholesky(&covariance).ok_or_else(|| {
            ModelError::NumericalInstability("covariance is not positive definite".to_string())
        })?;
        let log_det = log_det(&chol);

        Ok(Self {
            mean,
            covariance,
            chol,
            log_det,
        })
    }

    /// Maximum likelihood estimate from samples, `min_covar` added to the diagonal
    pub fn from_samples(samples: &Array2<f64>, min_covar: f64) -> Result<Self, ModelError> {
        let weights = Array1::ones(samples.nrows());
        let (mean, covariance) = weighted_moments(samples, &weights, min_covar)?;
        Self::new(mean, covariance)
    }

    /// Dimension of the distribution
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Compute log probability density at a point
    pub fn log_pdf(&self, x: ArrayView1<f64>) -> f64 {
        let d = self.dim() as f64;
        let diff = &x - &self.mean;

        // (x - mu)' Sigma^-1 (x - mu) = |L^-1 (x - mu)|^2
        let z = solve_lower(&self.chol, diff.view());
        let quad_form = z.dot(&z);

        -0.5 * (d * (2.0 * PI).ln() + self.log_det + quad_form)
    }

    /// Compute probability density at a point
    pub fn pdf(&self, x: ArrayView1<f64>) -> f64 {
        self.log_pdf(x).exp()
    }

    /// Draw one sample: `mu + L z` with standard normal `z`
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Array1<f64> {
        let z: Array1<f64> = (0..self.dim())
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect();
        &self.mean + &self.chol.dot(&z)
    }

    /// Re-estimate parameters from weighted samples
    ///
    /// A state with (numerically) no responsibility keeps its parameters.
    pub fn update_weighted(
        &mut self,
        samples: &Array2<f64>,
        weights: &Array1<f64>,
        min_covar: f64,
    ) -> Result<(), ModelError> {
        if weights.sum() < 1e-10 {
            return Ok(());
        }

        let (mean, covariance) = weighted_moments(samples, weights, min_covar)?;
        *self = Self::new(mean, covariance)?;
        Ok(())
    }
}

/// Weighted mean and covariance with diagonal regularization
fn weighted_moments(
    samples: &Array2<f64>,
    weights: &Array1<f64>,
    min_covar: f64,
) -> Result<(Array1<f64>, Array2<f64>), ModelError> {
    let n = samples.nrows();
    let d = samples.ncols();
    if weights.len() != n {
        return Err(ModelError::DimensionMismatch {
            expected: n,
            got: weights.len(),
        });
    }

    let weight_sum = weights.sum();
    if !(weight_sum > 0.0) {
        return Err(ModelError::DegenerateInput("no sample weight".to_string()));
    }

    let mean = samples
        .t()
        .dot(weights)
        .mapv(|v| v / weight_sum);

    let mut covariance = Array2::<f64>::zeros((d, d));
    for (row, &w) in samples.axis_iter(Axis(0)).zip(weights.iter()) {
        let diff = &row - &mean;
        for j in 0..d {
            for k in 0..d {
                covariance[[j, k]] += w * diff[j] * diff[k];
            }
        }
    }
    covariance /= weight_sum;

    for i in 0..d {
        covariance[[i, i]] += min_covar;
    }

    Ok((mean, covariance))
}
