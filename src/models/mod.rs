//! Statistical models
//!
//! Gaussian HMM (Viterbi, Forward-Backward, Baum-Welch) for regime
//! detection and L2-regularized logistic regression for direction
//! classification. Both sit behind small traits so the pipeline can be
//! driven by another backend.

mod algorithms;
mod gaussian;
mod hmm;
mod linalg;
mod logistic;

pub use algorithms::{baum_welch_step, forward_backward, viterbi};
pub use gaussian::MultivariateGaussian;
pub use hmm::GaussianHmm;
pub use logistic::{LogisticRegression, Regularization};

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Errors raised while fitting or evaluating a model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model has not been fitted yet")]
    NotFitted,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid model parameter: {0}")]
    InvalidParameter(String),

    #[error("Need at least {required} samples, got {got}")]
    InsufficientSamples { required: usize, got: usize },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
}

/// Outcome of a successful fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSummary {
    /// Final (penalized) log-likelihood
    pub log_likelihood: f64,
    /// Iterations used
    pub iterations: usize,
    pub converged: bool,
}

/// Unsupervised model assigning a hidden state to every observation
pub trait SequenceModel {
    /// Fit on an observation matrix (rows = time steps)
    fn fit(&mut self, observations: &Array2<f64>) -> Result<FitSummary, ModelError>;

    /// Most likely state per row
    fn decode(&self, observations: &Array2<f64>) -> Result<Vec<usize>, ModelError>;

    fn n_states(&self) -> usize;
}

/// Binary classifier producing P(y = 1)
pub trait Classifier {
    /// Fit on a feature matrix and 0/1 labels
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FitSummary, ModelError>;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;

    /// Coefficients on the raw feature scale, once fitted
    fn coefficients(&self) -> Option<&Array1<f64>>;

    fn intercept(&self) -> Option<f64>;
}
