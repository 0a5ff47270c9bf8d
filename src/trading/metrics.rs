//! Trading performance metrics
//!
//! Pure functions of a return series. Undefined statistics come back as
//! `None` rather than a sentinel number.

use statrs::statistics::Statistics;

/// Standard deviations below this count as zero volatility
const MIN_STD: f64 = 1e-12;

/// Percent change between consecutive values, one shorter than the input
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Compounded growth of one unit: `cumprod(1 + r)`
pub fn equity_curve(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |equity, r| {
            *equity *= 1.0 + r;
            Some(*equity)
        })
        .collect()
}

/// Relative distance below the running peak (always <= 0)
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&e| {
            peak = peak.max(e);
            e / peak - 1.0
        })
        .collect()
}

/// Deepest drawdown, 0 for an empty curve
pub fn max_drawdown(equity: &[f64]) -> f64 {
    drawdown_series(equity)
        .into_iter()
        .fold(0.0, f64::min)
}

/// Final equity minus one, 0 for an empty curve
pub fn cumulative_return(equity: &[f64]) -> f64 {
    equity.last().map(|e| e - 1.0).unwrap_or(0.0)
}

/// Annualized Sharpe ratio with population standard deviation
///
/// `None` when there are no returns or their volatility is zero.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }

    let mean = returns.iter().mean();
    let std = returns.iter().population_std_dev();
    if !(std >= MIN_STD) {
        return None;
    }

    Some(periods_per_year.sqrt() * mean / std)
}

/// Fraction of periods with a strictly positive return
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
}

/// Geometric annualized return: `equity[last]^(P / len) - 1`
pub fn annualized_return(equity: &[f64], periods_per_year: f64) -> Option<f64> {
    let last = *equity.last()?;
    Some(last.powf(periods_per_year / equity.len() as f64) - 1.0)
}
