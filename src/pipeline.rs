//! End-to-end research run
//!
//! Features, regimes, classifier, signals and backtest, executed in order on
//! one bar series under one immutable configuration.

use crate::config::PipelineConfig;
use crate::data::BarSeries;
use crate::error::Result;
use crate::features::{FeatureEngine, FeatureFrame};
use crate::regime::{RegimeDetection, RegimeDetector};
use crate::signals::{SignalModel, SignalSeries, Threshold, TrainingReport};
use crate::trading::{BacktestEngine, BacktestReport};
use serde::Serialize;

/// Everything a presentation layer needs from one run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub symbol: String,
    /// Feature frame with the regime column attached
    pub features: FeatureFrame,
    pub regimes: RegimeDetection,
    pub training: TrainingReport,
    pub signals: SignalSeries,
    pub backtest: BacktestReport,
    /// Always-long benchmark over the same bars
    pub benchmark: BacktestReport,
}

/// Validated pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    threshold: Threshold,
    features: FeatureEngine,
}

impl Pipeline {
    /// Validate the configuration and build the stages
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let threshold = Threshold::new(config.run.threshold)?;
        let features = FeatureEngine::new(config.features.clone())?;
        Ok(Self {
            config,
            threshold,
            features,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage; the first error aborts the run
    pub fn run(&self, series: &BarSeries) -> Result<PipelineReport> {
        tracing::info!(
            "Running pipeline for {} on {} bars",
            series.symbol(),
            series.len()
        );

        let frame = self.features.compute(series)?;
        tracing::info!(
            "Computed {} feature rows (warm-up {} bars)",
            frame.n_samples(),
            frame.offset
        );

        // Regimes are fitted on the bars that survive the warm-up
        let warmed = series.slice(frame.offset, series.len())?;
        let regimes = RegimeDetector::new(&self.config.regime)
            .with_periods_per_year(self.config.backtest.periods_per_year)
            .detect(&warmed)?;
        let frame = frame.with_regime(&regimes.labels)?;

        let classifier = self.config.model.classifier();
        let (model, training) = SignalModel::train(classifier, &frame)?;
        let signals = model.generate_signals(&frame, self.threshold)?;

        let engine = BacktestEngine::new(self.config.backtest.clone());
        let backtest = engine.run_series(&frame.dates, &frame.closes, &signals)?;
        let benchmark = engine.run_buy_and_hold(&frame.closes)?;

        tracing::info!(
            "Strategy return {:.2}% vs buy-and-hold {:.2}%",
            backtest.stats.cumulative_return * 100.0,
            benchmark.stats.cumulative_return * 100.0
        );

        Ok(PipelineReport {
            symbol: series.symbol().to_string(),
            features: frame,
            regimes,
            training,
            signals,
            backtest,
            benchmark,
        })
    }
}
