//! Logistic Regression for binary classification
//!
//! Predicts next-bar direction (up or down). Fitted by damped Newton-Raphson
//! on internally standardized columns; the penalty is rescaled so that the
//! returned coefficients solve the problem on the raw features:
//!
//! ```text
//! minimize  0.5 * ||w||^2 + C * sum_i log_loss(y_i, sigmoid(x_i . w + b))
//! ```
//!
//! with the intercept `b` unpenalized.

use super::linalg::{cholesky, cholesky_solve};
use super::{Classifier, FitSummary, ModelError};
use ndarray::{Array1, Array2, Axis};

/// Added to the Hessian diagonal before factorization
const HESSIAN_JITTER: f64 = 1e-10;

/// Sufficient-decrease constant for the backtracking line search
const ARMIJO: f64 = 1e-4;

/// Columns whose standard deviation is below this are left unscaled
const MIN_SCALE: f64 = 1e-12;

/// Regularization type for logistic regression
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Regularization {
    /// No regularization
    None,
    /// L2 (ridge) penalty with inverse strength `C`
    L2(f64),
}

/// Logistic Regression classifier
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    /// Fitted coefficients (raw feature scale)
    coefficients: Option<Array1<f64>>,
    /// Intercept term
    intercept: Option<f64>,
    /// Maximum Newton iterations
    max_iter: usize,
    /// Convergence tolerance on half the squared Newton decrement
    tolerance: f64,
    regularization: Regularization,
    /// Mean loss per iteration during training
    pub cost_history: Vec<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(200, 1e-8, Regularization::L2(1.0))
    }
}

impl LogisticRegression {
    /// Create a new Logistic Regression model
    pub fn new(max_iter: usize, tolerance: f64, regularization: Regularization) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            max_iter,
            tolerance,
            regularization,
            cost_history: Vec::new(),
        }
    }

    /// Create with L2 regularization
    pub fn with_l2(c: f64) -> Self {
        Self::new(200, 1e-8, Regularization::L2(c))
    }

    pub fn regularization(&self) -> Regularization {
        self.regularization
    }

    /// Sigmoid activation function
    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let exp_z = z.exp();
            exp_z / (1.0 + exp_z)
        }
    }

    /// `ln(1 + e^z)` without overflow
    fn softplus(z: f64) -> f64 {
        if z > 0.0 {
            z + (-z).exp().ln_1p()
        } else {
            z.exp().ln_1p()
        }
    }

    /// Penalized negative log-likelihood on the augmented design
    fn objective(z: &Array2<f64>, y: &Array1<f64>, theta: &Array1<f64>, penalty: &Array1<f64>) -> f64 {
        let eta = z.dot(theta);
        let loss: f64 = eta
            .iter()
            .zip(y.iter())
            .map(|(&e, &yi)| Self::softplus(e) - yi * e)
            .sum();
        loss + 0.5 * (penalty * theta * theta).sum()
    }

    fn validate(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        if let Regularization::L2(c) = self.regularization {
            if !(c > 0.0) || !c.is_finite() {
                return Err(ModelError::InvalidParameter(format!(
                    "inverse regularization strength must be positive, got {}",
                    c
                )));
            }
        }
        if self.max_iter == 0 || !(self.tolerance > 0.0) {
            return Err(ModelError::InvalidParameter(
                "max_iter and tolerance must be positive".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }
        if x.nrows() < 2 {
            return Err(ModelError::InsufficientSamples {
                required: 2,
                got: x.nrows(),
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::DegenerateInput(
                "features contain non-finite values".to_string(),
            ));
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(ModelError::DegenerateInput(
                "labels must be 0 or 1".to_string(),
            ));
        }
        let positives = y.iter().filter(|&&v| v == 1.0).count();
        if positives == 0 || positives == y.len() {
            return Err(ModelError::DegenerateInput(
                "labels contain a single class".to_string(),
            ));
        }
        Ok(())
    }

    /// Fit using damped Newton-Raphson
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FitSummary, ModelError> {
        self.validate(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let k = n_features + 1;

        let mean = x.mean_axis(Axis(0)).ok_or(ModelError::InsufficientSamples {
            required: 2,
            got: 0,
        })?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s < MIN_SCALE { 1.0 } else { s });

        // Leading column of ones carries the intercept
        let mut z = Array2::<f64>::ones((n_samples, k));
        for j in 0..n_features {
            let column = x.column(j).mapv(|v| (v - mean[j]) / scale[j]);
            z.column_mut(j + 1).assign(&column);
        }

        // ||w||^2 / (2C) on raw coefficients, w_j = theta_j / scale_j
        let mut penalty = Array1::<f64>::zeros(k);
        if let Regularization::L2(c) = self.regularization {
            for j in 0..n_features {
                penalty[j + 1] = 1.0 / (c * scale[j] * scale[j]);
            }
        }

        let mut theta = Array1::<f64>::zeros(k);
        let mut converged = false;
        let mut iterations = 0;
        self.cost_history.clear();

        for iter in 0..self.max_iter {
            iterations = iter + 1;

            let p = z.dot(&theta).mapv(Self::sigmoid);
            let grad = z.t().dot(&(&p - y)) + &penalty * &theta;

            let w = p.mapv(|pi| pi * (1.0 - pi));
            let weighted = &z * &w.view().insert_axis(Axis(1));
            let mut hessian = z.t().dot(&weighted);
            for i in 0..k {
                hessian[[i, i]] += penalty[i] + HESSIAN_JITTER;
            }

            let chol = cholesky(&hessian).ok_or_else(|| {
                ModelError::NumericalInstability("Hessian is not positive definite".to_string())
            })?;
            let step = cholesky_solve(&chol, grad.view());
            let decrement = grad.dot(&step);

            let current = Self::objective(&z, y, &theta, &penalty);
            if !current.is_finite() || !decrement.is_finite() {
                return Err(ModelError::NumericalInstability(format!(
                    "objective became non-finite at iteration {}",
                    iterations
                )));
            }
            self.cost_history.push(current / n_samples as f64);
            tracing::debug!(
                "Newton iteration {}: loss = {:.6}, decrement = {:.3e}",
                iterations,
                current / n_samples as f64,
                decrement
            );

            if decrement / 2.0 < self.tolerance {
                theta = &theta - &step;
                converged = true;
                break;
            }

            // Backtracking line search
            let mut t = 1.0;
            loop {
                let candidate = &theta - &(&step * t);
                let value = Self::objective(&z, y, &candidate, &penalty);
                if value <= current - ARMIJO * t * decrement {
                    theta = candidate;
                    break;
                }
                t *= 0.5;
                if t < 1e-12 {
                    return Err(ModelError::NumericalInstability(
                        "line search failed to decrease the objective".to_string(),
                    ));
                }
            }
        }

        if !converged {
            return Err(ModelError::NotConverged { iterations });
        }

        let coefficients = Array1::from_shape_fn(n_features, |j| theta[j + 1] / scale[j]);
        let intercept = theta[0]
            - (0..n_features)
                .map(|j| theta[j + 1] * mean[j] / scale[j])
                .sum::<f64>();
        let log_likelihood = -Self::objective(&z, y, &theta, &penalty);

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);

        Ok(FitSummary {
            log_likelihood,
            iterations,
            converged,
        })
    }

    fn fitted(&self, x: &Array2<f64>) -> Result<(&Array1<f64>, f64), ModelError> {
        let weights = self.coefficients.as_ref().ok_or(ModelError::NotFitted)?;
        let bias = self.intercept.ok_or(ModelError::NotFitted)?;
        if x.ncols() != weights.len() {
            return Err(ModelError::DimensionMismatch {
                expected: weights.len(),
                got: x.ncols(),
            });
        }
        Ok((weights, bias))
    }

    /// Get decision function values (log-odds)
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let (weights, bias) = self.fitted(x)?;
        Ok(x.dot(weights) + bias)
    }

    /// Predict probabilities of class 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self.decision_function(x)?.mapv(Self::sigmoid))
    }

    /// Predict class labels (0 or 1)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    /// Get model summary
    pub fn summary(&self, feature_names: &[&str]) -> String {
        let mut s = String::new();
        s.push_str("Logistic Regression Summary\n");
        s.push_str("===========================\n\n");

        match (&self.coefficients, self.intercept) {
            (Some(coef), Some(intercept)) => {
                s.push_str(&format!("Intercept: {:.6}\n\n", intercept));
                s.push_str("Coefficients (log-odds):\n");
                for (i, &c) in coef.iter().enumerate() {
                    let name = feature_names.get(i).copied().unwrap_or("?");
                    s.push_str(&format!(
                        "  {:3}. {:12}: {:>12.6} (OR: {:.4})\n",
                        i + 1,
                        name,
                        c,
                        c.exp()
                    ));
                }
                if let Some(cost) = self.cost_history.last() {
                    s.push_str(&format!("\nFinal cost: {:.6}\n", cost));
                }
            }
            _ => s.push_str("Model not fitted yet.\n"),
        }

        s
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FitSummary, ModelError> {
        LogisticRegression::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        LogisticRegression::predict_proba(self, x)
    }

    fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    fn intercept(&self) -> Option<f64> {
        self.intercept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, array};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    /// Two features on different scales with known log-odds
    fn generate_data(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let a: f64 = rng.sample(StandardNormal);
            let b: f64 = 5.0 + 2.0 * rng.sample::<f64, _>(StandardNormal);
            x[[i, 0]] = a;
            x[[i, 1]] = b;
            let logit = 0.3 + 1.2 * a - 0.4 * (b - 5.0);
            let p = 1.0 / (1.0 + (-logit).exp());
            y[i] = if rng.gen::<f64>() < p { 1.0 } else { 0.0 };
        }
        (x, y)
    }

    #[test]
    fn test_sigmoid() {
        assert_abs_diff_eq!(LogisticRegression::sigmoid(0.0), 0.5, epsilon = 1e-12);
        assert!(LogisticRegression::sigmoid(800.0) <= 1.0);
        assert!(LogisticRegression::sigmoid(-800.0) >= 0.0);
        assert_abs_diff_eq!(LogisticRegression::softplus(-800.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(LogisticRegression::softplus(800.0), 800.0, epsilon = 1e-9);
    }

    #[test]
    fn test_recovers_coefficients_without_penalty() {
        let (x, y) = generate_data(8000, 1);
        let mut model = LogisticRegression::new(200, 1e-8, Regularization::None);
        let summary = model.fit(&x, &y).unwrap();
        assert!(summary.converged);
        assert!(summary.iterations < 20);

        let coef = Classifier::coefficients(&model).unwrap();
        assert_abs_diff_eq!(coef[0], 1.2, epsilon = 0.15);
        assert_abs_diff_eq!(coef[1], -0.4, epsilon = 0.1);
        // b = 0.3 + 0.4 * 5
        assert_abs_diff_eq!(model.intercept.unwrap(), 2.3, epsilon = 0.4);
    }

    #[test]
    fn test_l2_solution_is_stationary_on_raw_features() {
        let (x, y) = generate_data(500, 2);
        let c = 0.05;
        let mut model = LogisticRegression::with_l2(c);
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.clone().unwrap();
        let p = model.predict_proba(&x).unwrap();
        let residual = &p - &y;

        // d/dw [0.5 ||w||^2 + C * loss] = w + C * X^T (p - y)
        let grad_w = &coef + &(x.t().dot(&residual) * c);
        let grad_b = residual.sum();
        assert_abs_diff_eq!(grad_w[0], 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(grad_w[1], 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(grad_b, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_penalty_shrinks_coefficients() {
        let (x, y) = generate_data(500, 3);
        let mut loose = LogisticRegression::new(200, 1e-8, Regularization::None);
        let mut tight = LogisticRegression::with_l2(0.001);
        loose.fit(&x, &y).unwrap();
        tight.fit(&x, &y).unwrap();

        let norm = |m: &LogisticRegression| {
            m.coefficients
                .as_ref()
                .map(|c| c.dot(c).sqrt())
                .unwrap_or(0.0)
        };
        assert!(norm(&tight) < norm(&loose));
    }

    #[test]
    fn test_constant_column() {
        let x = arr2(&[[1.0, 3.0], [2.0, 3.0], [3.0, 3.0], [4.0, 3.0], [5.0, 3.0], [6.0, 3.0]]);
        let y = array![0.0, 0.0, 1.0, 0.0, 1.0, 1.0];
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!(coef[0] > 0.0);
        assert_abs_diff_eq!(coef[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_predictions() {
        let (x, y) = generate_data(1000, 4);
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));

        let labels = model.predict(&x).unwrap();
        let accuracy = labels
            .iter()
            .zip(y.iter())
            .filter(|(a, b)| a == b)
            .count() as f64
            / y.len() as f64;
        assert!(accuracy > 0.6);
        assert!(model.summary(&["a", "b"]).contains("Intercept"));
    }

    #[test]
    fn test_rejects_bad_input() {
        let x = arr2(&[[1.0], [2.0], [3.0]]);
        let mut model = LogisticRegression::default();

        assert!(matches!(
            model.fit(&x, &array![1.0, 1.0, 1.0]),
            Err(ModelError::DegenerateInput(_))
        ));
        assert!(matches!(
            model.fit(&x, &array![1.0, 0.0]),
            Err(ModelError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            model.fit(&arr2(&[[1.0]]), &array![1.0]),
            Err(ModelError::InsufficientSamples { .. })
        ));
        assert!(matches!(
            model.fit(&arr2(&[[1.0], [f64::NAN]]), &array![1.0, 0.0]),
            Err(ModelError::DegenerateInput(_))
        ));
        assert!(matches!(
            LogisticRegression::with_l2(0.0).fit(&x, &array![1.0, 0.0, 1.0]),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_not_fitted() {
        let model = LogisticRegression::default();
        assert!(matches!(
            model.predict_proba(&arr2(&[[1.0]])),
            Err(ModelError::NotFitted)
        ));
    }
}
