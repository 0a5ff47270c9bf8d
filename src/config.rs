//! Configuration management
//!
//! A run is described by one immutable [`PipelineConfig`] that is passed
//! through every stage. It can be loaded from and saved to TOML.

use crate::error::{PipelineError, Result};
use crate::models::{LogisticRegression, Regularization};
use crate::signals::Threshold;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to run on: ticker, date range and signal threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Symmetric signal threshold, 0.5 < threshold <= 1.0
    pub threshold: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ticker: "SPY".to_string(),
            start: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            threshold: 0.55,
        }
    }
}

/// Indicator windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub fast_window: usize,
    pub slow_window: usize,
    pub rsi_window: usize,
    pub atr_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            fast_window: 20,
            slow_window: 50,
            rsi_window: 14,
            atr_window: 14,
        }
    }
}

/// Gaussian HMM settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub n_states: usize,
    /// Maximum EM iterations
    pub n_iter: usize,
    /// Convergence tolerance on the log-likelihood gain
    pub tol: f64,
    /// Added to covariance diagonals
    pub min_covar: f64,
    pub seed: u64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            n_states: 2,
            n_iter: 100,
            tol: 1e-2,
            min_covar: 1e-6,
            seed: 42,
        }
    }
}

/// Coefficient penalty of the directional classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    None,
    L2,
}

/// Logistic regression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub penalty: Penalty,
    /// Inverse L2 strength
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            penalty: Penalty::L2,
            c: 1.0,
            max_iter: 200,
            tol: 1e-8,
        }
    }
}

impl ModelConfig {
    /// Logistic regression configured from these settings
    pub fn classifier(&self) -> LogisticRegression {
        let regularization = match self.penalty {
            Penalty::None => Regularization::None,
            Penalty::L2 => Regularization::L2(self.c),
        };
        LogisticRegression::new(self.max_iter, self.tol, regularization)
    }
}

/// Backtest and analytics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Annualization factor (trading sessions per year)
    pub periods_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
        }
    }
}

/// Market data retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub run: RunConfig,
    pub features: FeatureConfig,
    pub regime: RegimeConfig,
    pub model: ModelConfig,
    pub backtest: BacktestConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every parameter before a run starts
    pub fn validate(&self) -> Result<()> {
        Threshold::new(self.run.threshold)?;

        if self.run.start >= self.run.end {
            return Err(PipelineError::InvalidParameter(format!(
                "start date {} must precede end date {}",
                self.run.start, self.run.end
            )));
        }

        let windows = [
            ("fast_window", self.features.fast_window),
            ("slow_window", self.features.slow_window),
            ("rsi_window", self.features.rsi_window),
            ("atr_window", self.features.atr_window),
        ];
        for (name, window) in windows {
            if window == 0 {
                return Err(PipelineError::InvalidParameter(format!(
                    "{} must be positive",
                    name
                )));
            }
        }

        if self.regime.n_states == 0 {
            return Err(PipelineError::InvalidParameter(
                "n_states must be at least 1".to_string(),
            ));
        }
        if self.regime.n_iter == 0 || !(self.regime.tol > 0.0) {
            return Err(PipelineError::InvalidParameter(
                "regime n_iter and tol must be positive".to_string(),
            ));
        }
        if !(self.regime.min_covar >= 0.0) {
            return Err(PipelineError::InvalidParameter(
                "min_covar must be non-negative".to_string(),
            ));
        }

        if self.model.penalty == Penalty::L2 && !(self.model.c > 0.0 && self.model.c.is_finite()) {
            return Err(PipelineError::InvalidParameter(format!(
                "inverse regularization strength must be positive, got {}",
                self.model.c
            )));
        }
        if self.model.max_iter == 0 || !(self.model.tol > 0.0) {
            return Err(PipelineError::InvalidParameter(
                "model max_iter and tol must be positive".to_string(),
            ));
        }

        if !(self.backtest.periods_per_year > 0.0) {
            return Err(PipelineError::InvalidParameter(
                "periods_per_year must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
