//! Directional classifier trained on the regime-augmented feature frame

use super::signal::{Signal, SignalSeries, Threshold};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureFrame, MODEL_FEATURES};
use crate::models::{Classifier, LogisticRegression};
use chrono::NaiveDate;
use ndarray::{s, Array1, Array2};
use serde::Serialize;

/// Coefficient of one input feature
#[derive(Debug, Clone, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub coefficient: f64,
}

/// In-sample diagnostics of a training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    /// Dates of the training rows (every frame row but the last)
    pub dates: Vec<NaiveDate>,
    /// Fitted probability of an up move per training row
    pub probabilities: Vec<f64>,
    /// Realized next-bar direction (1 = up)
    pub actual: Vec<u8>,
    /// Share of rows where `p > 0.5` matches the realized direction
    pub accuracy: f64,
    pub importances: Vec<FeatureImportance>,
    pub intercept: f64,
    pub iterations: usize,
}

impl TrainingReport {
    /// Importances ordered by absolute coefficient, largest first
    pub fn ranked(&self) -> Vec<&FeatureImportance> {
        let mut ranked: Vec<&FeatureImportance> = self.importances.iter().collect();
        ranked.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
        ranked
    }
}

/// A fitted classifier bound to the model feature set
#[derive(Debug, Clone)]
pub struct SignalModel<C: Classifier = LogisticRegression> {
    classifier: C,
}

impl<C: Classifier> SignalModel<C> {
    /// Fit `classifier` on next-bar direction
    ///
    /// Label `t` is 1 when `close[t + 1] > close[t]`; the last row has no
    /// successor and is left out of training.
    pub fn train(mut classifier: C, frame: &FeatureFrame) -> Result<(Self, TrainingReport)> {
        let x_all = model_inputs(frame)?;
        let n = frame.n_samples();
        if n < 3 {
            return Err(PipelineError::InsufficientHistory {
                required: 2,
                available: n.saturating_sub(1),
            });
        }

        let x = x_all.slice(s![..n - 1, ..]).to_owned();
        let actual: Vec<u8> = frame
            .closes
            .windows(2)
            .map(|w| u8::from(w[1] > w[0]))
            .collect();
        let y: Array1<f64> = actual.iter().map(|&v| f64::from(v)).collect();

        let fit = classifier.fit(&x, &y)?;
        let probabilities = classifier.predict_proba(&x)?;

        let hits = probabilities
            .iter()
            .zip(actual.iter())
            .filter(|(&p, &a)| u8::from(p > 0.5) == a)
            .count();
        let accuracy = hits as f64 / actual.len() as f64;

        let coefficients = classifier.coefficients().ok_or_else(|| {
            PipelineError::ModelFitFailure("classifier exposes no coefficients".to_string())
        })?;
        let importances = MODEL_FEATURES
            .iter()
            .zip(coefficients.iter())
            .map(|(name, &coefficient)| FeatureImportance {
                feature: name.to_string(),
                coefficient,
            })
            .collect();
        let intercept = classifier.intercept().ok_or_else(|| {
            PipelineError::ModelFitFailure("classifier exposes no intercept".to_string())
        })?;

        tracing::info!(
            "Trained direction model on {} rows: in-sample accuracy {:.1}% ({} iterations)",
            actual.len(),
            accuracy * 100.0,
            fit.iterations
        );

        let report = TrainingReport {
            dates: frame.dates[..n - 1].to_vec(),
            probabilities: probabilities.to_vec(),
            actual,
            accuracy,
            importances,
            intercept,
            iterations: fit.iterations,
        };

        Ok((Self { classifier }, report))
    }

    /// The fitted classifier
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Probability of an up move for every frame row
    pub fn predict_proba(&self, frame: &FeatureFrame) -> Result<Array1<f64>> {
        let x = model_inputs(frame)?;
        Ok(self.classifier.predict_proba(&x)?)
    }

    /// Thresholded signal for every frame row, the last included
    pub fn generate_signals(&self, frame: &FeatureFrame, threshold: Threshold) -> Result<SignalSeries> {
        let probabilities = self.predict_proba(frame)?;
        let signals: Vec<Signal> = probabilities
            .iter()
            .map(|&p| Signal::from_probability(p, threshold))
            .collect();

        let series = SignalSeries {
            dates: frame.dates.clone(),
            signals,
            probabilities: probabilities.to_vec(),
        };
        tracing::info!(
            "Generated {} signals ({} long, {} flat, {} short) at threshold {}",
            series.len(),
            series.count(Signal::Long),
            series.count(Signal::Flat),
            series.count(Signal::Short),
            threshold.value()
        );
        Ok(series)
    }
}

/// Model columns in order; the regime column must be attached
fn model_inputs(frame: &FeatureFrame) -> Result<Array2<f64>> {
    if !frame.has_regime() {
        return Err(PipelineError::InvalidParameter(
            "feature frame has no regime column".to_string(),
        ));
    }
    frame.select(&MODEL_FEATURES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{ATR, REGIME, RSI, SMA_FAST, SMA_SLOW};
    use crate::models::{FitSummary, ModelError};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Frame whose next-bar direction leans on the rsi column
    fn frame(n: usize, seed: u64) -> FeatureFrame {
        let mut rng = StdRng::seed_from_u64(seed);
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let mut data = Array2::zeros((n, 5));
        let mut closes = Vec::with_capacity(n);
        let mut close = 100.0;
        for i in 0..n {
            let rsi: f64 = rng.gen_range(0.0..100.0);
            data[[i, 0]] = close;
            data[[i, 1]] = close * (0.98 + 0.04 * rng.gen::<f64>());
            data[[i, 2]] = rsi;
            data[[i, 3]] = 1.0 + rng.gen::<f64>();
            data[[i, 4]] = (i / 25 % 2) as f64;
            closes.push(close);

            let p_up = if rsi > 50.0 { 0.75 } else { 0.25 };
            close *= if rng.gen::<f64>() < p_up { 1.01 } else { 0.99 };
        }
        FeatureFrame {
            dates: (0..n)
                .map(|i| start + chrono::Duration::days(i as i64))
                .collect(),
            closes,
            data,
            names: [SMA_FAST, SMA_SLOW, RSI, ATR, REGIME]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            offset: 0,
        }
    }

    /// Returns fixed probabilities
    struct FixedClassifier(Array1<f64>);

    impl Classifier for FixedClassifier {
        fn fit(
            &mut self,
            _x: &Array2<f64>,
            _y: &Array1<f64>,
        ) -> std::result::Result<FitSummary, ModelError> {
            Ok(FitSummary {
                log_likelihood: 0.0,
                iterations: 1,
                converged: true,
            })
        }

        fn predict_proba(&self, x: &Array2<f64>) -> std::result::Result<Array1<f64>, ModelError> {
            Ok(self.0.slice(s![..x.nrows()]).to_owned())
        }

        fn coefficients(&self) -> Option<&Array1<f64>> {
            None
        }

        fn intercept(&self) -> Option<f64> {
            Some(0.0)
        }
    }

    #[test]
    fn test_train_report() {
        let frame = frame(300, 1);
        let (model, report) = SignalModel::train(LogisticRegression::default(), &frame).unwrap();

        assert_eq!(report.dates.len(), 299);
        assert_eq!(report.probabilities.len(), 299);
        assert_eq!(report.actual.len(), 299);
        assert_eq!(report.dates.last(), frame.dates.get(298));
        assert!(report.accuracy > 0.6);
        assert_eq!(report.importances.len(), 5);
        assert_eq!(report.importances[2].feature, RSI);
        assert!(report.importances[2].coefficient > 0.0);
        let ranked = report.ranked();
        assert_eq!(ranked.len(), 5);
        assert!(ranked[0].coefficient.abs() >= ranked[4].coefficient.abs());

        let signals = model.generate_signals(&frame, Threshold::new(0.55).unwrap()).unwrap();
        assert_eq!(signals.len(), 300);
        assert_eq!(signals.dates, frame.dates);
    }

    #[test]
    fn test_signals_follow_threshold() {
        let frame = frame(5, 2);
        let probs = Array1::from(vec![0.7, 0.5, 0.3, 0.56, 0.44]);
        let model = SignalModel {
            classifier: FixedClassifier(probs),
        };

        let signals = model
            .generate_signals(&frame, Threshold::new(0.55).unwrap())
            .unwrap();
        assert_eq!(
            signals.signals,
            vec![
                Signal::Long,
                Signal::Flat,
                Signal::Short,
                Signal::Long,
                Signal::Short
            ]
        );
        for (&p, s) in signals.probabilities.iter().zip(&signals.signals) {
            assert!(!(p > 0.55 && p < 0.45));
            assert_eq!(*s == Signal::Long, p > 0.55);
        }
    }

    #[test]
    fn test_requires_regime_column() {
        let mut frame = frame(50, 3);
        frame.data = frame.data.slice(s![.., ..4]).to_owned();
        frame.names.truncate(4);

        let err = SignalModel::train(LogisticRegression::default(), &frame).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameter(_)));
    }

    #[test]
    fn test_single_class_fails() {
        let mut frame = frame(50, 4);
        frame.closes = (0..50).map(|i| 100.0 + i as f64).collect();

        let err = SignalModel::train(LogisticRegression::default(), &frame).unwrap_err();
        assert!(matches!(err, PipelineError::ModelFitFailure(_)));
    }

    #[test]
    fn test_too_few_rows() {
        let frame = frame(2, 5);
        let err = SignalModel::train(LogisticRegression::default(), &frame).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientHistory {
                required: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn test_missing_coefficients_is_fit_failure() {
        let frame = frame(20, 6);
        let result = SignalModel::train(FixedClassifier(Array1::from_elem(20, 0.5)), &frame);
        assert!(matches!(result, Err(PipelineError::ModelFitFailure(_))));
    }
}
