//! Portfolio statistics

use super::series::ValueSeries;
use crate::trading::metrics::{
    annualized_return, cumulative_return, drawdown_series, equity_curve, max_drawdown, pct_change,
    sharpe_ratio,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Risk statistics of a value series
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    /// Dates of `returns`, `equity_curve` and `drawdown` (first date dropped)
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<f64>,
    pub equity_curve: Vec<f64>,
    pub drawdown: Vec<f64>,
    pub cumulative_return: f64,
    /// `None` with no returns
    pub annualized_return: Option<f64>,
    /// `None` with no returns or zero volatility
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: f64,
}

impl fmt::Display for PortfolioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = |v: Option<f64>| match v {
            Some(v) => format!("{:>8.2}%", v * 100.0),
            None => format!("{:>9}", "n/a"),
        };
        writeln!(f, "Cumulative Return: {:>8.2}%", self.cumulative_return * 100.0)?;
        writeln!(f, "Annualized Return: {}", pct(self.annualized_return))?;
        match self.sharpe_ratio {
            Some(sharpe) => writeln!(f, "Sharpe Ratio:      {:>8.2}", sharpe)?,
            None => writeln!(f, "Sharpe Ratio:      {:>8}", "n/a")?,
        }
        write!(f, "Max Drawdown:      {:>8.2}%", self.max_drawdown * 100.0)
    }
}

/// Returns, equity, drawdown and summary statistics of `series`
///
/// Returns are percent changes with the first (undefined) one dropped. Never
/// fails: fewer than two points give an empty curve and undefined ratios.
pub fn compute_stats(series: &ValueSeries, periods_per_year: f64) -> PortfolioReport {
    let returns = pct_change(&series.values());
    let equity = equity_curve(&returns);

    let report = PortfolioReport {
        dates: series.dates().into_iter().skip(1).collect(),
        drawdown: drawdown_series(&equity),
        cumulative_return: cumulative_return(&equity),
        annualized_return: annualized_return(&equity, periods_per_year),
        sharpe_ratio: sharpe_ratio(&returns, periods_per_year),
        max_drawdown: max_drawdown(&equity),
        returns,
        equity_curve: equity,
    };

    tracing::info!(
        "Portfolio over {} observations: cumulative return {:.2}%",
        series.len(),
        report.cumulative_return * 100.0
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::ValuePoint;
    use approx::assert_abs_diff_eq;

    fn series(values: &[f64]) -> ValueSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| ValuePoint {
                date: start + chrono::Duration::days(i as i64),
                value,
            })
            .collect();
        ValueSeries::new(points).unwrap()
    }

    #[test]
    fn test_stats() {
        let report = compute_stats(&series(&[100.0, 110.0, 99.0, 108.9]), 252.0);

        assert_eq!(report.returns.len(), 3);
        assert_eq!(report.dates.len(), 3);
        assert_abs_diff_eq!(report.equity_curve[2], 1.089, epsilon = 1e-12);
        assert_abs_diff_eq!(report.cumulative_return, 0.089, epsilon = 1e-12);
        assert_abs_diff_eq!(report.max_drawdown, -0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(
            report.annualized_return.unwrap(),
            1.089f64.powf(252.0 / 3.0) - 1.0,
            epsilon = 1e-6
        );
        assert!(report.sharpe_ratio.is_some());
    }

    #[test]
    fn test_single_observation() {
        let report = compute_stats(&series(&[100.0]), 252.0);
        assert!(report.returns.is_empty());
        assert!(report.equity_curve.is_empty());
        assert_eq!(report.cumulative_return, 0.0);
        assert_eq!(report.max_drawdown, 0.0);
        assert_eq!(report.annualized_return, None);
        assert_eq!(report.sharpe_ratio, None);
    }

    #[test]
    fn test_empty_series() {
        let report = compute_stats(&ValueSeries::default(), 252.0);
        assert!(report.dates.is_empty());
        assert_eq!(report.annualized_return, None);
        assert!(report.to_string().contains("n/a"));
    }
}
