//! Regime detector using a fitted sequence model

use super::summary::{summarize_regimes, RegimeSummary};
use crate::config::RegimeConfig;
use crate::data::BarSeries;
use crate::error::{PipelineError, Result};
use crate::models::{GaussianHmm, SequenceModel};
use chrono::NaiveDate;
use ndarray::Array2;
use serde::Serialize;

/// One regime label per bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeLabels {
    pub dates: Vec<NaiveDate>,
    pub labels: Vec<usize>,
}

impl RegimeLabels {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of the most recent bar
    pub fn current(&self) -> Option<usize> {
        self.labels.last().copied()
    }
}

/// Result of a regime fit over a bar series
#[derive(Debug, Clone, Serialize)]
pub struct RegimeDetection {
    pub labels: RegimeLabels,
    pub summaries: Vec<RegimeSummary>,
    /// Log-likelihood of the fitted model on the returns
    pub log_likelihood: f64,
    /// EM iterations used
    pub iterations: usize,
}

/// Regime detector combining a sequence model and regime statistics
pub struct RegimeDetector<M: SequenceModel = GaussianHmm> {
    model: M,
    /// Annualization factor for regime statistics
    periods_per_year: f64,
}

impl RegimeDetector<GaussianHmm> {
    /// Gaussian HMM detector from configuration
    pub fn new(config: &RegimeConfig) -> Self {
        let hmm = GaussianHmm::new(config.n_states)
            .with_n_iter(config.n_iter)
            .with_tol(config.tol)
            .with_min_covar(config.min_covar)
            .with_seed(config.seed);
        Self::with_model(hmm)
    }
}

impl<M: SequenceModel> RegimeDetector<M> {
    /// Detector around any sequence model
    pub fn with_model(model: M) -> Self {
        Self {
            model,
            periods_per_year: 252.0,
        }
    }

    /// Set annualization factor used in regime summaries
    pub fn with_periods_per_year(mut self, periods_per_year: f64) -> Self {
        self.periods_per_year = periods_per_year;
        self
    }

    /// The underlying model (fitted after `detect`)
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Fit the model on log returns and label every bar
    ///
    /// Returns are one shorter than the series; the first bar takes the
    /// label of the first decoded return.
    pub fn detect(&mut self, series: &BarSeries) -> Result<RegimeDetection> {
        let returns = series.log_returns();
        let observations = Array2::from_shape_vec((returns.len(), 1), returns.clone())
            .map_err(|e| PipelineError::InvalidParameter(e.to_string()))?;

        let fit = self.model.fit(&observations)?;
        let decoded = self.model.decode(&observations)?;

        let mut labels = Vec::with_capacity(series.len());
        labels.extend(decoded.first().copied());
        labels.extend(decoded.iter().copied());

        let summaries = summarize_regimes(
            &decoded,
            &returns,
            self.model.n_states(),
            self.periods_per_year,
        );

        tracing::info!(
            "Detected {} regimes over {} bars ({} EM iterations, log-likelihood {:.2})",
            self.model.n_states(),
            labels.len(),
            fit.iterations,
            fit.log_likelihood
        );

        Ok(RegimeDetection {
            labels: RegimeLabels {
                dates: series.dates(),
                labels,
            },
            summaries,
            log_likelihood: fit.log_likelihood,
            iterations: fit.iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Bar;
    use crate::models::{FitSummary, ModelError};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn series_from_returns(returns: &[f64]) -> BarSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut close = 100.0;
        let mut bars = Vec::with_capacity(returns.len() + 1);
        for i in 0..=returns.len() {
            if i > 0 {
                close *= returns[i - 1].exp();
            }
            bars.push(Bar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close * 1.005,
                low: close * 0.995,
                close,
                volume: 1.0,
            });
        }
        BarSeries::new("TEST", bars).unwrap()
    }

    /// Alternating calm and volatile blocks of 100 returns
    fn two_regime_returns(seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..600)
            .map(|i| {
                let z: f64 = rng.sample(StandardNormal);
                if (i / 100) % 2 == 0 {
                    0.0005 + 0.005 * z
                } else {
                    -0.001 + 0.025 * z
                }
            })
            .collect()
    }

    /// Labels a return 1 when positive
    struct SignModel;

    impl SequenceModel for SignModel {
        fn fit(&mut self, observations: &Array2<f64>) -> std::result::Result<FitSummary, ModelError> {
            Ok(FitSummary {
                log_likelihood: 0.0,
                iterations: observations.nrows(),
                converged: true,
            })
        }

        fn decode(&self, observations: &Array2<f64>) -> std::result::Result<Vec<usize>, ModelError> {
            Ok(observations.column(0).iter().map(|&r| usize::from(r > 0.0)).collect())
        }

        fn n_states(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_first_label_is_forward_filled() {
        let series = series_from_returns(&[-0.01, 0.02, 0.01, -0.03]);
        let detection = RegimeDetector::with_model(SignModel).detect(&series).unwrap();

        assert_eq!(detection.labels.labels, vec![0, 0, 1, 1, 0]);
        assert_eq!(detection.labels.dates, series.dates());
        assert_eq!(detection.labels.current(), Some(0));
        assert_eq!(detection.summaries[1].count, 2);
    }

    #[test]
    fn test_hmm_separates_volatility_regimes() {
        let returns = two_regime_returns(21);
        let series = series_from_returns(&returns);
        let config = RegimeConfig {
            n_iter: 500,
            ..Default::default()
        };

        let mut detector = RegimeDetector::new(&config);
        let detection = detector.detect(&series).unwrap();
        assert!(detector.model().is_fitted());
        let labels = &detection.labels.labels;

        assert_eq!(labels.len(), series.len());
        assert_eq!(labels[0], labels[1]);

        let summaries = &detection.summaries;
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].volatility < summaries[1].volatility);
        let occupancy: f64 = summaries.iter().map(|s| s.occupancy).sum();
        assert!((occupancy - 1.0).abs() < 1e-9);

        // Mostly calm during the first block
        let calm = labels[1..101].iter().filter(|&&l| l == 0).count();
        assert!(calm > 80, "calm bars in first block: {}", calm);
    }

    #[test]
    fn test_flat_prices_fail_to_fit() {
        let series = series_from_returns(&[0.0; 40]);
        let err = RegimeDetector::new(&RegimeConfig::default())
            .detect(&series)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ModelFitFailure(_)));
    }

    #[test]
    fn test_short_series() {
        let series = series_from_returns(&[0.01, -0.02, 0.01]);
        let err = RegimeDetector::new(&RegimeConfig::default())
            .detect(&series)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientHistory {
                required: 10,
                available: 3
            }
        ));
    }
}
