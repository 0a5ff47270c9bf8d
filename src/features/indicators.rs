//! Technical indicators
//!
//! Every indicator returns one value per input bar; `None` marks bars whose
//! rolling window is not yet fully populated.

use crate::data::Bar;

/// Trailing simple moving average over `window` values
pub fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return result;
    }

    for (i, w) in values.windows(window).enumerate() {
        result[i + window - 1] = Some(w.iter().sum::<f64>() / window as f64);
    }

    result
}

/// Relative strength index from trailing mean gains and losses
///
/// Defined from bar `window` onward (it needs `window` close-to-close
/// changes). An average loss of exactly zero yields 100.
pub fn rsi(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; closes.len()];
    if window == 0 || closes.len() < window + 1 {
        return result;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    for (i, w) in changes.windows(window).enumerate() {
        let gains: f64 = w.iter().filter(|&&x| x > 0.0).sum();
        let losses: f64 = w.iter().filter(|&&x| x < 0.0).map(|x| x.abs()).sum();

        let avg_gain = gains / window as f64;
        let avg_loss = losses / window as f64;

        let value = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };

        // changes[i] is the move into bar i + 1
        result[i + window] = Some(value);
    }

    result
}

/// True range per bar
///
/// The first bar has no previous close and uses its high-low range.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let high_low = bar.high - bar.low;
            if i == 0 {
                return high_low;
            }
            let prev_close = bars[i - 1].close;
            high_low
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .collect()
}

/// Average true range: trailing mean of the true range
pub fn atr(bars: &[Bar], window: usize) -> Vec<Option<f64>> {
    sma(&true_range(bars), window)
}
