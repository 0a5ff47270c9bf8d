//! Per-regime statistics

use serde::Serialize;
use statrs::statistics::Statistics;
use std::fmt;

/// Statistical profile of one hidden state
#[derive(Debug, Clone, Serialize)]
pub struct RegimeSummary {
    /// HMM state index
    pub state: usize,
    /// Number of returns assigned to the state
    pub count: usize,
    /// Fraction of returns assigned to the state
    pub occupancy: f64,
    /// Mean log return per period
    pub mean_return: f64,
    /// Standard deviation of log returns per period
    pub volatility: f64,
    /// Mean return scaled by the annualization factor
    pub annualized_return: f64,
    /// Volatility scaled by the square root of the annualization factor
    pub annualized_volatility: f64,
    /// Average run length in bars
    pub avg_duration: f64,
}

impl fmt::Display for RegimeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State {} ({} bars)", self.state, self.count)?;
        writeln!(f, "  Occupancy: {:.1}%", self.occupancy * 100.0)?;
        writeln!(f, "  Avg Return: {:.1}%", self.annualized_return * 100.0)?;
        writeln!(
            f,
            "  Avg Volatility: {:.1}%",
            self.annualized_volatility * 100.0
        )?;
        write!(f, "  Avg Duration: {:.1} periods", self.avg_duration)
    }
}

/// Summarize each of `n_states` regimes from per-period labels and returns
///
/// States that never occur get zero statistics.
pub fn summarize_regimes(
    labels: &[usize],
    returns: &[f64],
    n_states: usize,
    periods_per_year: f64,
) -> Vec<RegimeSummary> {
    let total = labels.len().min(returns.len());

    let mut runs = vec![0usize; n_states];
    let mut previous = None;
    for &label in &labels[..total] {
        if previous != Some(label) && label < n_states {
            runs[label] += 1;
        }
        previous = Some(label);
    }

    (0..n_states)
        .map(|state| {
            let values: Vec<f64> = labels[..total]
                .iter()
                .zip(returns.iter())
                .filter(|(&l, _)| l == state)
                .map(|(_, &r)| r)
                .collect();
            let count = values.len();

            let (mean_return, volatility) = if count == 0 {
                (0.0, 0.0)
            } else {
                (values.iter().mean(), values.iter().population_std_dev())
            };

            RegimeSummary {
                state,
                count,
                occupancy: if total > 0 {
                    count as f64 / total as f64
                } else {
                    0.0
                },
                mean_return,
                volatility,
                annualized_return: mean_return * periods_per_year,
                annualized_volatility: volatility * periods_per_year.sqrt(),
                avg_duration: if runs[state] > 0 {
                    count as f64 / runs[state] as f64
                } else {
                    0.0
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_summary_statistics() {
        let labels = [0, 0, 1, 1, 1, 0];
        let returns = [0.01, -0.01, 0.03, -0.05, 0.02, 0.0];
        let summaries = summarize_regimes(&labels, &returns, 2, 252.0);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].count, 3);
        assert_abs_diff_eq!(summaries[0].occupancy, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(summaries[0].mean_return, 0.0, epsilon = 1e-12);
        // runs: [0, 0], [0]
        assert_abs_diff_eq!(summaries[0].avg_duration, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(summaries[1].avg_duration, 3.0, epsilon = 1e-12);

        let expected_vol = ((0.03f64 + 0.0).powi(2) + 0.05f64.powi(2) + 0.02f64.powi(2)) / 3.0;
        assert_abs_diff_eq!(summaries[1].volatility, expected_vol.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(
            summaries[1].annualized_volatility,
            expected_vol.sqrt() * 252f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_unused_state() {
        let summaries = summarize_regimes(&[0, 0, 0], &[0.01, 0.02, 0.03], 3, 252.0);
        assert_eq!(summaries[2].count, 0);
        assert_eq!(summaries[2].occupancy, 0.0);
        assert_eq!(summaries[2].avg_duration, 0.0);
        assert!(summaries[2].to_string().contains("State 2"));
    }
}
