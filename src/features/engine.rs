//! Feature engineering for the directional model
//!
//! Builds the feature frame: fast/slow moving averages, RSI and ATR, joined
//! on the bars where every indicator is defined.

use super::indicators::{atr, rsi, sma};
use crate::config::FeatureConfig;
use crate::data::BarSeries;
use crate::error::{PipelineError, Result};
use crate::regime::RegimeLabels;
use chrono::NaiveDate;
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

pub const SMA_FAST: &str = "sma_fast";
pub const SMA_SLOW: &str = "sma_slow";
pub const RSI: &str = "rsi";
pub const ATR: &str = "atr";
pub const REGIME: &str = "regime";

/// Columns consumed by the directional classifier, in order
pub const MODEL_FEATURES: [&str; 5] = [SMA_FAST, SMA_SLOW, RSI, ATR, REGIME];

/// Feature matrix with named columns
#[derive(Debug, Clone, Serialize)]
pub struct FeatureFrame {
    /// Session date of each row
    pub dates: Vec<NaiveDate>,
    /// Close of each row, kept for label construction and backtesting
    pub closes: Vec<f64>,
    /// Feature matrix (rows = sessions, cols = features)
    pub data: Array2<f64>,
    /// Feature names
    pub names: Vec<String>,
    /// Number of leading bars dropped during warm-up
    pub offset: usize,
}

impl FeatureFrame {
    /// Number of rows
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Number of feature columns
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// Get feature by name
    pub fn get_feature(&self, name: &str) -> Option<Array1<f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.data.column(idx).to_owned())
    }

    /// Whether the regime column has been attached
    pub fn has_regime(&self) -> bool {
        self.names.iter().any(|n| n == REGIME)
    }

    /// Columns in the requested order
    pub fn select(&self, names: &[&str]) -> Result<Array2<f64>> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| {
                    PipelineError::InvalidParameter(format!("feature frame has no column '{}'", name))
                })?;
            indices.push(idx);
        }
        Ok(self.data.select(Axis(1), &indices))
    }

    /// Attach regime labels as a numeric column
    ///
    /// Labels must cover exactly the frame's dates.
    pub fn with_regime(&self, regimes: &RegimeLabels) -> Result<FeatureFrame> {
        if self.has_regime() {
            return Err(PipelineError::InvalidParameter(
                "feature frame already has a regime column".to_string(),
            ));
        }
        if regimes.dates != self.dates {
            return Err(PipelineError::InvalidParameter(format!(
                "regime labels ({} rows) are not aligned with the feature frame ({} rows)",
                regimes.len(),
                self.n_samples()
            )));
        }

        let column: Array1<f64> = regimes.labels.iter().map(|&l| l as f64).collect();
        let mut data = self.data.clone();
        data.push_column(column.view()).map_err(|e| {
            PipelineError::InvalidParameter(format!("cannot append regime column: {}", e))
        })?;

        let mut names = self.names.clone();
        names.push(REGIME.to_string());

        Ok(FeatureFrame {
            dates: self.dates.clone(),
            closes: self.closes.clone(),
            data,
            names,
            offset: self.offset,
        })
    }
}

/// Computes the feature frame from a bar series
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    config: FeatureConfig,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self {
            config: FeatureConfig::default(),
        }
    }
}

impl FeatureEngine {
    /// Create an engine, rejecting zero-length windows
    pub fn new(config: FeatureConfig) -> Result<Self> {
        let windows = [
            config.fast_window,
            config.slow_window,
            config.rsi_window,
            config.atr_window,
        ];
        if windows.contains(&0) {
            return Err(PipelineError::InvalidParameter(
                "indicator windows must be positive".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Bars needed before the first complete row
    pub fn min_bars(&self) -> usize {
        self.config
            .fast_window
            .max(self.config.slow_window)
            .max(self.config.atr_window)
            .max(self.config.rsi_window + 1)
    }

    /// Build the feature frame
    pub fn compute(&self, series: &BarSeries) -> Result<FeatureFrame> {
        let n = series.len();
        let required = self.min_bars();
        if n < required {
            return Err(PipelineError::InsufficientHistory {
                required,
                available: n,
            });
        }

        let closes = series.closes();
        let dates = series.dates();

        // Each indicator is computed on the full series, then joined
        let columns = [
            sma(&closes, self.config.fast_window),
            sma(&closes, self.config.slow_window),
            rsi(&closes, self.config.rsi_window),
            atr(series.bars(), self.config.atr_window),
        ];
        let names: Vec<String> = [SMA_FAST, SMA_SLOW, RSI, ATR]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut row_dates = Vec::new();
        let mut row_closes = Vec::new();
        let mut values = Vec::new();
        let mut offset = None;

        for i in 0..n {
            let row: Option<Vec<f64>> = columns.iter().map(|c| c[i]).collect();
            if let Some(row) = row {
                offset.get_or_insert(i);
                row_dates.push(dates[i]);
                row_closes.push(closes[i]);
                values.extend(row);
            }
        }

        let n_rows = row_dates.len();
        let data = Array2::from_shape_vec((n_rows, names.len()), values).map_err(|e| {
            PipelineError::InvalidParameter(format!("feature matrix shape: {}", e))
        })?;

        tracing::debug!(
            "Built {} feature rows from {} bars (dropped {} warm-up bars)",
            n_rows,
            n,
            n - n_rows
        );

        Ok(FeatureFrame {
            dates: row_dates,
            closes: row_closes,
            data,
            names,
            offset: offset.unwrap_or(n),
        })
    }
}
