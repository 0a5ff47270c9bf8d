//! Inference routines for Gaussian HMMs
//!
//! Emission densities are evaluated in log space and rescaled per time step
//! (subtracting the row maximum) before the scaled forward-backward
//! recursions, so extreme observations cannot underflow every state at once.

use super::gaussian::MultivariateGaussian;
use ndarray::{Array1, Array2, Axis};

/// Log emission densities, `T x N`
pub fn log_emission_matrix(
    observations: &Array2<f64>,
    emissions: &[MultivariateGaussian],
) -> Array2<f64> {
    let t = observations.nrows();
    let n = emissions.len();
    let mut log_probs = Array2::zeros((t, n));
    for (t_idx, obs) in observations.axis_iter(Axis(0)).enumerate() {
        for (j, emission) in emissions.iter().enumerate() {
            log_probs[[t_idx, j]] = emission.log_pdf(obs);
        }
    }
    log_probs
}

/// Emission densities divided by their per-step maximum, plus the log of
/// each maximum
fn scaled_emissions(log_probs: &Array2<f64>) -> (Array2<f64>, Array1<f64>) {
    let mut scaled = log_probs.clone();
    let mut offsets = Array1::zeros(log_probs.nrows());
    for (t_idx, mut row) in scaled.axis_iter_mut(Axis(0)).enumerate() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        offsets[t_idx] = max;
        row.mapv_inplace(|lp| (lp - max).exp());
    }
    (scaled, offsets)
}

/// Index and value of the largest entry, first index on ties
fn argmax<I: IntoIterator<Item = f64>>(values: I) -> (usize, f64) {
    values
        .into_iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}

/// Most likely state path (Viterbi) and its log probability
///
/// Works entirely in log space; zero transition probabilities become
/// `-inf` and are never chosen while a finite path exists.
pub fn viterbi(
    observations: &Array2<f64>,
    initial_probs: &Array1<f64>,
    transition_matrix: &Array2<f64>,
    emissions: &[MultivariateGaussian],
) -> (Vec<usize>, f64) {
    let steps = observations.nrows();
    let n = initial_probs.len();
    if steps == 0 || n == 0 {
        return (vec![], 0.0);
    }

    let log_start = initial_probs.mapv(f64::ln);
    let log_trans = transition_matrix.mapv(f64::ln);
    let log_emit = log_emission_matrix(observations, emissions);

    // score[j]: best log probability of a path ending in j at the current step
    let mut score = &log_start + &log_emit.row(0);
    let mut backpointers = Array2::<usize>::zeros((steps, n));

    for step in 1..steps {
        let mut next = Array1::from_elem(n, f64::NEG_INFINITY);
        for j in 0..n {
            let (from, best) = argmax((0..n).map(|i| score[i] + log_trans[[i, j]]));
            backpointers[[step, j]] = from;
            next[j] = best + log_emit[[step, j]];
        }
        score = next;
    }

    let (last, log_prob) = argmax(score.iter().copied());
    let mut path = Vec::with_capacity(steps);
    path.push(last);
    for step in (1..steps).rev() {
        let prev = backpointers[[step, path[path.len() - 1]]];
        path.push(prev);
    }
    path.reverse();

    (path, log_prob)
}

/// Scaled forward-backward pass over pre-scaled emissions
///
/// Returns (alpha, beta, gamma, scale) where `scale[t]` is the forward
/// normalizer at step t.
fn forward_backward_scaled(
    emission_probs: &Array2<f64>,
    initial_probs: &Array1<f64>,
    transition_matrix: &Array2<f64>,
) -> (Array2<f64>, Array2<f64>, Array2<f64>, Array1<f64>) {
    let t = emission_probs.nrows();
    let n = initial_probs.len();

    let mut alpha = Array2::zeros((t, n));
    let mut scale = Array1::zeros(t);

    for j in 0..n {
        alpha[[0, j]] = initial_probs[j] * emission_probs[[0, j]];
    }
    scale[0] = alpha.row(0).sum();
    if scale[0] > 0.0 {
        alpha.row_mut(0).mapv_inplace(|a| a / scale[0]);
    }

    for t_idx in 1..t {
        for j in 0..n {
            let mut sum = 0.0;
            for i in 0..n {
                sum += alpha[[t_idx - 1, i]] * transition_matrix[[i, j]];
            }
            alpha[[t_idx, j]] = sum * emission_probs[[t_idx, j]];
        }

        scale[t_idx] = alpha.row(t_idx).sum();
        if scale[t_idx] > 0.0 {
            let s = scale[t_idx];
            alpha.row_mut(t_idx).mapv_inplace(|a| a / s);
        }
    }

    let mut beta = Array2::zeros((t, n));
    beta.row_mut(t - 1).fill(1.0);

    for t_idx in (0..t - 1).rev() {
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..n {
                sum += transition_matrix[[i, j]]
                    * emission_probs[[t_idx + 1, j]]
                    * beta[[t_idx + 1, j]];
            }
            beta[[t_idx, i]] = sum;
        }

        if scale[t_idx + 1] > 0.0 {
            let s = scale[t_idx + 1];
            beta.row_mut(t_idx).mapv_inplace(|b| b / s);
        }
    }

    let mut gamma = &alpha * &beta;
    for mut row in gamma.axis_iter_mut(Axis(0)) {
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|g| g / sum);
        }
    }

    (alpha, beta, gamma, scale)
}

/// Forward-Backward algorithm - computes state posterior probabilities
///
/// # Returns
/// (alpha, beta, gamma, log_likelihood)
/// - alpha: scaled forward probabilities (T x N)
/// - beta: scaled backward probabilities (T x N)
/// - gamma: posterior state probabilities (T x N)
/// - log_likelihood: log P(observations | model)
pub fn forward_backward(
    observations: &Array2<f64>,
    initial_probs: &Array1<f64>,
    transition_matrix: &Array2<f64>,
    emissions: &[MultivariateGaussian],
) -> (Array2<f64>, Array2<f64>, Array2<f64>, f64) {
    let t = observations.nrows();
    let n = initial_probs.len();

    if t == 0 {
        return (
            Array2::zeros((0, n)),
            Array2::zeros((0, n)),
            Array2::zeros((0, n)),
            0.0,
        );
    }

    let log_emit = log_emission_matrix(observations, emissions);
    let (emission_probs, offsets) = scaled_emissions(&log_emit);
    let (alpha, beta, gamma, scale) =
        forward_backward_scaled(&emission_probs, initial_probs, transition_matrix);

    let log_likelihood = scale.iter().map(|s| s.ln()).sum::<f64>() + offsets.sum();

    (alpha, beta, gamma, log_likelihood)
}

/// Single Baum-Welch (EM) step
///
/// # Returns
/// (new_initial, new_transition, gamma, log_likelihood) where the
/// log-likelihood is that of the parameters passed in.
pub fn baum_welch_step(
    observations: &Array2<f64>,
    initial_probs: &Array1<f64>,
    transition_matrix: &Array2<f64>,
    emissions: &[MultivariateGaussian],
) -> (Array1<f64>, Array2<f64>, Array2<f64>, f64) {
    let t = observations.nrows();
    let n = initial_probs.len();

    // E-step
    let log_emit = log_emission_matrix(observations, emissions);
    let (emission_probs, offsets) = scaled_emissions(&log_emit);
    let (alpha, beta, gamma, scale) =
        forward_backward_scaled(&emission_probs, initial_probs, transition_matrix);
    let log_likelihood = scale.iter().map(|s| s.ln()).sum::<f64>() + offsets.sum();

    // Expected transition counts: sum over t of P(z_t = i, z_{t+1} = j | obs)
    let mut xi_sum = Array2::<f64>::zeros((n, n));
    let mut xi_t = Array2::<f64>::zeros((n, n));
    for t_idx in 0..t.saturating_sub(1) {
        let mut normalizer = 0.0;
        for i in 0..n {
            for j in 0..n {
                let xi_ij = alpha[[t_idx, i]]
                    * transition_matrix[[i, j]]
                    * emission_probs[[t_idx + 1, j]]
                    * beta[[t_idx + 1, j]];
                xi_t[[i, j]] = xi_ij;
                normalizer += xi_ij;
            }
        }
        if normalizer > 0.0 {
            xi_sum.scaled_add(1.0 / normalizer, &xi_t);
        }
    }

    // M-step
    let new_initial = gamma.row(0).to_owned();

    let mut new_transition = xi_sum;
    for mut row in new_transition.axis_iter_mut(Axis(0)) {
        let row_sum = row.sum();
        if row_sum > 0.0 {
            row.mapv_inplace(|x| x / row_sum);
        } else {
            // Keep uniform if no data
            row.fill(1.0 / n as f64);
        }
    }

    (new_initial, new_transition, gamma, log_likelihood)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, array};

    fn two_state_model() -> (Array1<f64>, Array2<f64>, Vec<MultivariateGaussian>) {
        let initial = array![0.6, 0.4];
        let transition = arr2(&[[0.7, 0.3], [0.4, 0.6]]);

        let emissions = vec![
            MultivariateGaussian::new(array![0.0], Array2::eye(1)).unwrap(),
            MultivariateGaussian::new(array![3.0], Array2::eye(1)).unwrap(),
        ];

        (initial, transition, emissions)
    }

    #[test]
    fn test_viterbi() {
        let (initial, transition, emissions) = two_state_model();
        let obs = arr2(&[[0.1], [0.2], [2.8], [3.1]]);

        let (path, log_prob) = viterbi(&obs, &initial, &transition, &emissions);

        assert_eq!(path, vec![0, 0, 1, 1]);
        assert!(log_prob.is_finite());
    }

    #[test]
    fn test_forward_backward() {
        let (initial, transition, emissions) = two_state_model();
        let obs = arr2(&[[0.1], [0.2], [2.8], [3.1]]);

        let (alpha, _beta, gamma, log_ll) =
            forward_backward(&obs, &initial, &transition, &emissions);

        assert_eq!(alpha.nrows(), 4);
        assert_eq!(gamma.nrows(), 4);

        for t in 0..4 {
            let sum: f64 = gamma.row(t).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
        assert!(gamma[[0, 0]] > 0.9);
        assert!(gamma[[3, 1]] > 0.9);
        assert!(log_ll.is_finite());
    }

    #[test]
    fn test_log_likelihood_single_step() {
        let (initial, transition, emissions) = two_state_model();
        let obs = arr2(&[[0.5]]);

        let (_, _, _, log_ll) = forward_backward(&obs, &initial, &transition, &emissions);
        let expected = (0.6 * emissions[0].pdf(array![0.5].view())
            + 0.4 * emissions[1].pdf(array![0.5].view()))
        .ln();
        assert!((log_ll - expected).abs() < 1e-12);
    }

    #[test]
    fn test_extreme_observation_stays_finite() {
        let (initial, transition, emissions) = two_state_model();
        let obs = arr2(&[[0.0], [1e4], [3.0]]);

        let (_, _, gamma, log_ll) = forward_backward(&obs, &initial, &transition, &emissions);
        assert!(log_ll.is_finite());
        assert!(gamma.iter().all(|g| g.is_finite()));
    }

    #[test]
    fn test_baum_welch_rows_normalized() {
        let (initial, transition, emissions) = two_state_model();
        let obs = arr2(&[[0.1], [0.2], [2.8], [3.1], [0.0], [2.9]]);

        let (new_initial, new_transition, _, _) =
            baum_welch_step(&obs, &initial, &transition, &emissions);

        assert!((new_initial.sum() - 1.0).abs() < 1e-9);
        for row in new_transition.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }
}
