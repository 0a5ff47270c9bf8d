//! Gaussian Hidden Markov Model implementation

use super::algorithms::{baum_welch_step, forward_backward, viterbi};
use super::gaussian::MultivariateGaussian;
use super::{FitSummary, ModelError, SequenceModel};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Probability mass kept on the diagonal of the initial transition matrix
const INITIAL_PERSISTENCE: f64 = 0.9;

/// Columns with a variance below this carry no information
const MIN_VARIANCE: f64 = 1e-14;

/// Gaussian HMM with full covariance emissions
///
/// After fitting, states are ordered by ascending emission variance
/// (covariance trace), so state 0 is always the calmest regime.
#[derive(Debug, Clone)]
pub struct GaussianHmm {
    n_states: usize,
    n_iter: usize,
    tol: f64,
    min_covar: f64,
    seed: u64,
    initial_probs: Array1<f64>,
    transition_matrix: Array2<f64>,
    emissions: Vec<MultivariateGaussian>,
    /// Training log-likelihood history
    pub log_likelihood_history: Vec<f64>,
}

impl GaussianHmm {
    /// Create new untrained HMM with given number of states
    pub fn new(n_states: usize) -> Self {
        Self {
            n_states,
            n_iter: 100,
            tol: 1e-2,
            min_covar: 1e-6,
            seed: 42,
            initial_probs: Array1::zeros(0),
            transition_matrix: Array2::zeros((0, 0)),
            emissions: vec![],
            log_likelihood_history: vec![],
        }
    }

    /// Create a fitted model from known parameters
    pub fn with_params(
        initial_probs: Array1<f64>,
        transition_matrix: Array2<f64>,
        emissions: Vec<MultivariateGaussian>,
    ) -> Result<Self, ModelError> {
        let n = initial_probs.len();
        if n == 0 {
            return Err(ModelError::InvalidParameter(
                "an HMM needs at least one state".to_string(),
            ));
        }
        if transition_matrix.dim() != (n, n) {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                got: transition_matrix.nrows(),
            });
        }
        if emissions.len() != n {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                got: emissions.len(),
            });
        }
        let dim = emissions[0].dim();
        if let Some(bad) = emissions.iter().find(|e| e.dim() != dim) {
            return Err(ModelError::DimensionMismatch {
                expected: dim,
                got: bad.dim(),
            });
        }
        let rows = std::iter::once(initial_probs.view()).chain(transition_matrix.rows());
        for row in rows {
            if row.iter().any(|&p| !(0.0..=1.0).contains(&p)) || (row.sum() - 1.0).abs() > 1e-6 {
                return Err(ModelError::InvalidParameter(
                    "probability vectors must be non-negative and sum to 1".to_string(),
                ));
            }
        }

        let mut model = Self::new(n);
        model.initial_probs = initial_probs;
        model.transition_matrix = transition_matrix;
        model.emissions = emissions;
        Ok(model)
    }

    /// Set convergence tolerance on the log-likelihood gain
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the EM iteration cap
    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Set the covariance diagonal regularization
    pub fn with_min_covar(mut self, min_covar: f64) -> Self {
        self.min_covar = min_covar;
        self
    }

    /// Set the initialization seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of states
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn is_fitted(&self) -> bool {
        !self.emissions.is_empty()
    }

    /// Minimum number of observations needed to fit
    pub fn min_samples(&self) -> usize {
        (2 * self.n_states).max(10)
    }

    /// Fit the model using the Baum-Welch (EM) algorithm
    ///
    /// Fails with `NotConverged` if the log-likelihood gain is still above
    /// `tol` after `n_iter` iterations.
    pub fn fit(&mut self, observations: &Array2<f64>) -> Result<FitSummary, ModelError> {
        self.validate_settings()?;
        check_observations(observations, self.min_samples())?;

        self.initialize(observations)?;
        self.log_likelihood_history.clear();

        let mut prev_ll = f64::NEG_INFINITY;
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..self.n_iter {
            iterations = iter + 1;

            let (new_initial, new_transition, gamma, log_ll) = baum_welch_step(
                observations,
                &self.initial_probs,
                &self.transition_matrix,
                &self.emissions,
            );

            if !log_ll.is_finite() {
                return Err(ModelError::NumericalInstability(format!(
                    "log-likelihood became {} at iteration {}",
                    log_ll, iterations
                )));
            }

            self.initial_probs = new_initial;
            self.transition_matrix = new_transition;
            for (j, emission) in self.emissions.iter_mut().enumerate() {
                let weights = gamma.column(j).to_owned();
                emission.update_weighted(observations, &weights, self.min_covar)?;
            }

            self.log_likelihood_history.push(log_ll);
            tracing::debug!("EM iteration {}: log-likelihood = {:.4}", iterations, log_ll);

            if (log_ll - prev_ll).abs() < self.tol {
                converged = true;
                break;
            }
            prev_ll = log_ll;
        }

        if !converged {
            return Err(ModelError::NotConverged { iterations });
        }

        self.sort_states_by_variance();
        let log_likelihood = self.score(observations)?;
        tracing::debug!(
            "HMM converged after {} iterations (log-likelihood {:.4})",
            iterations,
            log_likelihood
        );

        Ok(FitSummary {
            log_likelihood,
            iterations,
            converged,
        })
    }

    fn validate_settings(&self) -> Result<(), ModelError> {
        if self.n_states == 0 {
            return Err(ModelError::InvalidParameter(
                "n_states must be at least 1".to_string(),
            ));
        }
        if self.n_iter == 0 {
            return Err(ModelError::InvalidParameter(
                "n_iter must be positive".to_string(),
            ));
        }
        if !(self.tol > 0.0) {
            return Err(ModelError::InvalidParameter(
                "tol must be positive".to_string(),
            ));
        }
        if !(self.min_covar >= 0.0) {
            return Err(ModelError::InvalidParameter(
                "min_covar must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Deterministic starting point: k-means means, pooled covariance,
    /// uniform start and a persistent transition matrix
    fn initialize(&mut self, observations: &Array2<f64>) -> Result<(), ModelError> {
        let k = self.n_states;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let centers = kmeans_centers(observations, k, &mut rng);
        let pooled = MultivariateGaussian::from_samples(observations, self.min_covar)?;

        self.emissions = centers
            .into_iter()
            .map(|c| MultivariateGaussian::new(c, pooled.covariance.clone()))
            .collect::<Result<_, _>>()?;

        self.initial_probs = Array1::from_elem(k, 1.0 / k as f64);
        self.transition_matrix = if k == 1 {
            Array2::ones((1, 1))
        } else {
            let off = (1.0 - INITIAL_PERSISTENCE) / (k - 1) as f64;
            Array2::from_shape_fn((k, k), |(i, j)| {
                if i == j {
                    INITIAL_PERSISTENCE
                } else {
                    off
                }
            })
        };
        Ok(())
    }

    /// Relabel states by ascending covariance trace
    fn sort_states_by_variance(&mut self) {
        let mut order: Vec<usize> = (0..self.n_states).collect();
        order.sort_by(|&a, &b| {
            let ta = self.emissions[a].covariance.diag().sum();
            let tb = self.emissions[b].covariance.diag().sum();
            ta.total_cmp(&tb)
        });

        let initial = Array1::from_shape_fn(self.n_states, |i| self.initial_probs[order[i]]);
        let transition = Array2::from_shape_fn((self.n_states, self.n_states), |(i, j)| {
            self.transition_matrix[[order[i], order[j]]]
        });
        let emissions = order.iter().map(|&i| self.emissions[i].clone()).collect();

        self.initial_probs = initial;
        self.transition_matrix = transition;
        self.emissions = emissions;
    }

    fn check_fitted(&self, observations: &Array2<f64>) -> Result<(), ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        let dim = self.emissions[0].dim();
        if observations.ncols() != dim {
            return Err(ModelError::DimensionMismatch {
                expected: dim,
                got: observations.ncols(),
            });
        }
        Ok(())
    }

    /// Predict most likely state sequence (Viterbi)
    pub fn predict(&self, observations: &Array2<f64>) -> Result<Vec<usize>, ModelError> {
        self.check_fitted(observations)?;
        let (path, _) = viterbi(
            observations,
            &self.initial_probs,
            &self.transition_matrix,
            &self.emissions,
        );
        Ok(path)
    }

    /// Posterior state probabilities, `T x N`
    pub fn predict_proba(&self, observations: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        self.check_fitted(observations)?;
        let (_, _, gamma, _) = forward_backward(
            observations,
            &self.initial_probs,
            &self.transition_matrix,
            &self.emissions,
        );
        Ok(gamma)
    }

    /// Log-likelihood of observations
    pub fn score(&self, observations: &Array2<f64>) -> Result<f64, ModelError> {
        self.check_fitted(observations)?;
        let (_, _, _, log_ll) = forward_backward(
            observations,
            &self.initial_probs,
            &self.transition_matrix,
            &self.emissions,
        );
        Ok(log_ll)
    }

    /// Sample a state sequence and its observations
    pub fn sample<R: Rng>(
        &self,
        length: usize,
        rng: &mut R,
    ) -> Result<(Vec<usize>, Array2<f64>), ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted);
        }

        let mut states = Vec::with_capacity(length);
        let mut observations = Array2::zeros((length, self.emissions[0].dim()));

        let mut current = sample_discrete(self.initial_probs.view(), rng);
        for t in 0..length {
            if t > 0 {
                current = sample_discrete(self.transition_matrix.row(current), rng);
            }
            states.push(current);
            let obs = self.emissions[current].sample(rng);
            observations.row_mut(t).assign(&obs);
        }

        Ok((states, observations))
    }

    /// Start probabilities
    pub fn initial_probs(&self) -> &Array1<f64> {
        &self.initial_probs
    }

    /// Get the transition matrix
    pub fn transition_matrix(&self) -> &Array2<f64> {
        &self.transition_matrix
    }

    /// Emission distributions in state order
    pub fn emissions(&self) -> &[MultivariateGaussian] {
        &self.emissions
    }
}

impl SequenceModel for GaussianHmm {
    fn fit(&mut self, observations: &Array2<f64>) -> Result<FitSummary, ModelError> {
        GaussianHmm::fit(self, observations)
    }

    fn decode(&self, observations: &Array2<f64>) -> Result<Vec<usize>, ModelError> {
        self.predict(observations)
    }

    fn n_states(&self) -> usize {
        self.n_states
    }
}

fn check_observations(observations: &Array2<f64>, required: usize) -> Result<(), ModelError> {
    let n = observations.nrows();
    if n < required {
        return Err(ModelError::InsufficientSamples { required, got: n });
    }
    if observations.ncols() == 0 {
        return Err(ModelError::DegenerateInput(
            "observations have no columns".to_string(),
        ));
    }
    if observations.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::DegenerateInput(
            "observations contain non-finite values".to_string(),
        ));
    }
    for (j, column) in observations.axis_iter(Axis(1)).enumerate() {
        let var = column.var(0.0);
        if var < MIN_VARIANCE {
            return Err(ModelError::DegenerateInput(format!(
                "observation column {} has zero variance",
                j
            )));
        }
    }
    Ok(())
}

/// k-means with farthest-point seeding
///
/// The first center is drawn with `rng`; each further center is the point
/// farthest from those already chosen.
fn kmeans_centers<R: Rng>(observations: &Array2<f64>, k: usize, rng: &mut R) -> Vec<Array1<f64>> {
    let n = observations.nrows();
    let d = observations.ncols();

    let sq_dist = |a: ArrayView1<f64>, b: &Array1<f64>| -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
    };

    let mut centers: Vec<Array1<f64>> = vec![observations.row(rng.gen_range(0..n)).to_owned()];
    while centers.len() < k {
        let mut best_idx = 0;
        let mut best_dist = f64::NEG_INFINITY;
        for (i, row) in observations.axis_iter(Axis(0)).enumerate() {
            let nearest = centers
                .iter()
                .map(|c| sq_dist(row, c))
                .fold(f64::INFINITY, f64::min);
            if nearest > best_dist {
                best_dist = nearest;
                best_idx = i;
            }
        }
        centers.push(observations.row(best_idx).to_owned());
    }

    for _ in 0..20 {
        let mut sums = vec![Array1::<f64>::zeros(d); k];
        let mut counts = vec![0usize; k];
        for row in observations.axis_iter(Axis(0)) {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (j, center) in centers.iter().enumerate() {
                let dist = sq_dist(row, center);
                if dist < best_dist {
                    best_dist = dist;
                    best = j;
                }
            }
            sums[best] += &row;
            counts[best] += 1;
        }

        let mut moved = false;
        for j in 0..k {
            if counts[j] > 0 {
                let center = &sums[j] / counts[j] as f64;
                if center != centers[j] {
                    moved = true;
                    centers[j] = center;
                }
            }
        }
        if !moved {
            break;
        }
    }

    centers
}

/// Sample from discrete distribution
fn sample_discrete<R: Rng>(probs: ArrayView1<f64>, rng: &mut R) -> usize {
    let u: f64 = rng.gen();
    let mut cumsum = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumsum += p;
        if u < cumsum {
            return i;
        }
    }
    probs.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, array};

    /// Calm and volatile regimes with persistent transitions
    fn reference_model() -> GaussianHmm {
        GaussianHmm::with_params(
            array![0.5, 0.5],
            arr2(&[[0.97, 0.03], [0.05, 0.95]]),
            vec![
                MultivariateGaussian::new(array![0.001], arr2(&[[0.005f64.powi(2)]])).unwrap(),
                MultivariateGaussian::new(array![-0.002], arr2(&[[0.025f64.powi(2)]])).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_hmm_creation() {
        let hmm = GaussianHmm::new(3);
        assert_eq!(hmm.n_states(), 3);
        assert!(!hmm.is_fitted());
        assert_eq!(hmm.min_samples(), 10);
        assert_eq!(GaussianHmm::new(8).min_samples(), 16);
    }

    #[test]
    fn test_with_params_validates_rows() {
        let result = GaussianHmm::with_params(
            array![0.5, 0.5],
            arr2(&[[0.9, 0.2], [0.5, 0.5]]),
            vec![
                MultivariateGaussian::new(array![0.0], Array2::eye(1)).unwrap(),
                MultivariateGaussian::new(array![1.0], Array2::eye(1)).unwrap(),
            ],
        );
        assert!(matches!(result, Err(ModelError::InvalidParameter(_))));
    }

    #[test]
    fn test_sample_shapes() {
        let model = reference_model();
        let mut rng = StdRng::seed_from_u64(1);
        let (states, obs) = model.sample(250, &mut rng).unwrap();
        assert_eq!(states.len(), 250);
        assert_eq!(obs.dim(), (250, 1));
        assert!(states.iter().all(|&s| s < 2));
    }

    #[test]
    fn test_fit_recovers_regimes() {
        let truth = reference_model();
        let mut rng = StdRng::seed_from_u64(11);
        let (states, obs) = truth.sample(1500, &mut rng).unwrap();

        let mut hmm = GaussianHmm::new(2).with_n_iter(500);
        let summary = hmm.fit(&obs).unwrap();
        assert!(summary.converged);
        assert!(summary.log_likelihood.is_finite());

        // State 0 is the low-variance regime
        let var0 = hmm.emissions()[0].covariance[[0, 0]];
        let var1 = hmm.emissions()[1].covariance[[0, 0]];
        assert!(var0 < var1);

        let decoded = hmm.predict(&obs).unwrap();
        let agreement = decoded
            .iter()
            .zip(states.iter())
            .filter(|(a, b)| a == b)
            .count() as f64
            / states.len() as f64;
        assert!(agreement > 0.8, "agreement {}", agreement);

        for row in hmm.transition_matrix().rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!((hmm.initial_probs().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(5);
        let (_, obs) = reference_model().sample(400, &mut rng).unwrap();

        let mut a = GaussianHmm::new(2).with_n_iter(500);
        let mut b = GaussianHmm::new(2).with_n_iter(500);
        let fa = a.fit(&obs).unwrap();
        let fb = b.fit(&obs).unwrap();
        assert_eq!(fa, fb);
        assert_eq!(a.predict(&obs).unwrap(), b.predict(&obs).unwrap());
    }

    #[test]
    fn test_posteriors_sum_to_one() {
        let model = reference_model();
        let mut rng = StdRng::seed_from_u64(3);
        let (_, obs) = model.sample(100, &mut rng).unwrap();

        let gamma = model.predict_proba(&obs).unwrap();
        assert_eq!(gamma.dim(), (100, 2));
        for row in gamma.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!(model.score(&obs).unwrap().is_finite());
    }

    #[test]
    fn test_single_state() {
        let mut rng = StdRng::seed_from_u64(9);
        let (_, obs) = reference_model().sample(200, &mut rng).unwrap();

        let mut hmm = GaussianHmm::new(1);
        hmm.fit(&obs).unwrap();
        assert!(hmm.predict(&obs).unwrap().iter().all(|&s| s == 0));
        assert_eq!(hmm.transition_matrix()[[0, 0]], 1.0);
    }

    #[test]
    fn test_insufficient_samples() {
        let obs = Array2::from_shape_fn((9, 1), |(i, _)| i as f64);
        let mut hmm = GaussianHmm::new(2);
        assert!(matches!(
            hmm.fit(&obs),
            Err(ModelError::InsufficientSamples {
                required: 10,
                got: 9
            })
        ));
    }

    #[test]
    fn test_degenerate_input() {
        let mut hmm = GaussianHmm::new(2);
        let flat = Array2::from_elem((50, 1), 0.01);
        assert!(matches!(hmm.fit(&flat), Err(ModelError::DegenerateInput(_))));

        let mut with_nan = Array2::from_shape_fn((50, 1), |(i, _)| i as f64);
        with_nan[[10, 0]] = f64::NAN;
        assert!(matches!(
            hmm.fit(&with_nan),
            Err(ModelError::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_iteration_cap_is_an_error() {
        let mut rng = StdRng::seed_from_u64(11);
        let (_, obs) = reference_model().sample(500, &mut rng).unwrap();
        let mut hmm = GaussianHmm::new(2).with_n_iter(1);
        assert!(matches!(
            hmm.fit(&obs),
            Err(ModelError::NotConverged { iterations: 1 })
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let hmm = GaussianHmm::new(2);
        let obs = Array2::zeros((5, 1));
        assert!(matches!(hmm.predict(&obs), Err(ModelError::NotFitted)));
    }
}
