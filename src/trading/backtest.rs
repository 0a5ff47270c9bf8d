//! Backtesting engine
//!
//! Vectorized: the signal observed at bar `t - 1` earns the return from
//! `t - 1` to `t`. No costs, no sizing beyond the -1/0/+1 position.

use super::metrics::{
    cumulative_return, drawdown_series, equity_curve, max_drawdown, sharpe_ratio, win_rate,
};
use crate::config::BacktestConfig;
use crate::error::{PipelineError, Result};
use crate::signals::{Signal, SignalSeries};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Summary statistics of a backtest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestStats {
    /// Final equity minus one
    pub cumulative_return: f64,
    /// Annualized Sharpe ratio; `None` when strategy returns have zero volatility
    pub sharpe_ratio: Option<f64>,
    /// Most negative drawdown (<= 0)
    pub max_drawdown: f64,
    /// Fraction of periods with a positive strategy return
    pub win_rate: f64,
    /// Number of periods
    pub periods: usize,
}

impl BacktestStats {
    /// Print summary
    pub fn print_summary(&self) {
        println!("{}", self);
    }
}

impl fmt::Display for BacktestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cumulative Return: {:>8.2}%", self.cumulative_return * 100.0)?;
        match self.sharpe_ratio {
            Some(sharpe) => writeln!(f, "Sharpe Ratio:      {:>8.2}", sharpe)?,
            None => writeln!(f, "Sharpe Ratio:           n/a")?,
        }
        writeln!(f, "Max Drawdown:      {:>8.2}%", self.max_drawdown * 100.0)?;
        writeln!(f, "Win Rate:          {:>8.1}%", self.win_rate * 100.0)?;
        write!(f, "Periods:           {:>8}", self.periods)
    }
}

/// Full backtest output, one entry per bar
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    /// Bar dates, when run through [`BacktestEngine::run_series`]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dates: Vec<NaiveDate>,
    /// Asset return per bar (first is 0)
    pub returns: Vec<f64>,
    /// Position held into each bar
    pub positions: Vec<f64>,
    /// `returns[t] * signal[t - 1]` (first is 0)
    pub strategy_returns: Vec<f64>,
    pub equity_curve: Vec<f64>,
    pub drawdown: Vec<f64>,
    pub stats: BacktestStats,
}

/// Backtesting engine
#[derive(Debug, Clone, Default)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    /// Create with custom config
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Backtest aligned prices and signals
    pub fn run(&self, prices: &[f64], signals: &[Signal]) -> Result<BacktestReport> {
        validate_prices(prices)?;
        if signals.len() != prices.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "{} signals for {} prices",
                signals.len(),
                prices.len()
            )));
        }

        let n = prices.len();
        let mut returns = vec![0.0; n];
        let mut positions = vec![0.0; n];
        let mut strategy_returns = vec![0.0; n];
        for t in 1..n {
            returns[t] = prices[t] / prices[t - 1] - 1.0;
            positions[t] = signals[t - 1].position();
            strategy_returns[t] = returns[t] * positions[t];
        }

        let equity = equity_curve(&strategy_returns);
        let drawdown = drawdown_series(&equity);

        let stats = BacktestStats {
            cumulative_return: cumulative_return(&equity),
            sharpe_ratio: sharpe_ratio(&strategy_returns, self.config.periods_per_year),
            max_drawdown: max_drawdown(&equity),
            win_rate: win_rate(&strategy_returns),
            periods: n,
        };

        tracing::info!(
            "Backtest over {} bars: cumulative return {:.2}%, max drawdown {:.2}%",
            n,
            stats.cumulative_return * 100.0,
            stats.max_drawdown * 100.0
        );

        Ok(BacktestReport {
            dates: Vec::new(),
            returns,
            positions,
            strategy_returns,
            equity_curve: equity,
            drawdown,
            stats,
        })
    }

    /// Backtest a dated signal series against dated prices
    ///
    /// Dates must match the signal series exactly.
    pub fn run_series(
        &self,
        dates: &[NaiveDate],
        prices: &[f64],
        signals: &SignalSeries,
    ) -> Result<BacktestReport> {
        if dates.len() != prices.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "{} dates for {} prices",
                dates.len(),
                prices.len()
            )));
        }
        if dates != signals.dates.as_slice() {
            return Err(PipelineError::InvalidParameter(
                "signal dates do not match price dates".to_string(),
            ));
        }

        let mut report = self.run(prices, &signals.signals)?;
        report.dates = dates.to_vec();
        Ok(report)
    }

    /// Benchmark: long on every bar
    pub fn run_buy_and_hold(&self, prices: &[f64]) -> Result<BacktestReport> {
        let signals = vec![Signal::Long; prices.len()];
        self.run(prices, &signals)
    }
}

fn validate_prices(prices: &[f64]) -> Result<()> {
    if prices.is_empty() {
        return Err(PipelineError::DataUnavailable(
            "no prices to backtest".to_string(),
        ));
    }
    if let Some((i, p)) = prices
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p <= 0.0)
    {
        return Err(PipelineError::DataUnavailable(format!(
            "invalid price {} at index {}",
            p, i
        )));
    }
    Ok(())
}
