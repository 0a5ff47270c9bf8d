//! Data types for market data

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// One OHLCV record for a single trading session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Session date
    #[serde(alias = "Date")]
    pub date: NaiveDate,
    /// Opening price
    #[serde(alias = "Open")]
    pub open: f64,
    /// High price
    #[serde(alias = "High")]
    pub high: f64,
    /// Low price
    #[serde(alias = "Low")]
    pub low: f64,
    /// Closing price
    #[serde(alias = "Close")]
    pub close: f64,
    /// Traded volume
    #[serde(alias = "Volume")]
    pub volume: f64,
}

/// Ordered bar series for a single symbol
///
/// Dates are strictly increasing and every price is finite with a positive
/// close. The series is immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validate and wrap bars
    pub fn new(symbol: &str, bars: Vec<Bar>) -> Result<Self> {
        if bars.is_empty() {
            return Err(PipelineError::DataUnavailable(format!(
                "no bars for {}",
                symbol
            )));
        }

        for (i, bar) in bars.iter().enumerate() {
            let prices = [bar.open, bar.high, bar.low, bar.close];
            if prices.iter().any(|p| !p.is_finite()) || !bar.volume.is_finite() {
                return Err(PipelineError::DataUnavailable(format!(
                    "non-finite value in bar {} ({})",
                    i, bar.date
                )));
            }
            if bar.close <= 0.0 {
                return Err(PipelineError::DataUnavailable(format!(
                    "non-positive close in bar {} ({})",
                    i, bar.date
                )));
            }
        }

        if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(PipelineError::DataUnavailable(format!(
                "dates not strictly increasing: {} followed by {}",
                w[0].date, w[1].date
            )));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            bars,
        })
    }

    /// Symbol name
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Raw bars
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Number of bars
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Get closing prices
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Get session dates
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// Simple returns, one shorter than the series
    pub fn returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| w[1].close / w[0].close - 1.0)
            .collect()
    }

    /// Log returns, one shorter than the series
    pub fn log_returns(&self) -> Vec<f64> {
        self.bars
            .windows(2)
            .map(|w| (w[1].close / w[0].close).ln())
            .collect()
    }

    /// Sub-series of bars `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Result<BarSeries> {
        if start >= end || end > self.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "invalid slice {}..{} of {} bars",
                start,
                end,
                self.len()
            )));
        }
        Ok(BarSeries {
            symbol: self.symbol.clone(),
            bars: self.bars[start..end].to_vec(),
        })
    }

    /// Load bars from CSV
    ///
    /// Accepts `date,open,high,low,close,volume` headers in either lower or
    /// capitalized form; other columns are ignored. Rows are sorted by date.
    pub fn from_csv<P: AsRef<Path>>(path: P, symbol: &str) -> Result<Self> {
        let file = File::open(&path).map_err(|e| {
            PipelineError::DataUnavailable(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut reader = csv::Reader::from_reader(file);
        let mut bars = Vec::new();
        for result in reader.deserialize() {
            let bar: Bar = result?;
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.date);
        Self::new(symbol, bars)
    }

    /// Save bars to CSV
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(&path).map_err(|e| {
            PipelineError::DataUnavailable(format!(
                "failed to create {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut writer = csv::Writer::from_writer(file);
        for bar in &self.bars {
            writer.serialize(bar)?;
        }
        writer
            .flush()
            .map_err(|e| PipelineError::DataUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_empty_series_rejected() {
        let err = BarSeries::new("SPY", vec![]).unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable(_)));
    }

    #[test]
    fn test_unordered_dates_rejected() {
        let bars = vec![bar(2, 100.0), bar(2, 101.0)];
        assert!(BarSeries::new("SPY", bars).is_err());

        let bars = vec![bar(3, 100.0), bar(2, 101.0)];
        assert!(BarSeries::new("SPY", bars).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut bad = bar(3, 100.0);
        bad.high = f64::NAN;
        assert!(BarSeries::new("SPY", vec![bar(2, 100.0), bad]).is_err());
    }

    #[test]
    fn test_returns() {
        let series = BarSeries::new("SPY", vec![bar(2, 100.0), bar(3, 110.0), bar(4, 99.0)]).unwrap();

        let returns = series.returns();
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.1).abs() < 1e-12);
        assert!((returns[1] + 0.1).abs() < 1e-12);

        let log_returns = series.log_returns();
        assert!((log_returns[0] - 1.1f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_slice() {
        let series = BarSeries::new("SPY", (1..=5).map(|d| bar(d, 100.0 + d as f64)).collect()).unwrap();
        let tail = series.slice(2, 5).unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail.bars()[0].close, 103.0);
        assert!(series.slice(3, 3).is_err());
        assert!(series.slice(0, 6).is_err());
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        let series = BarSeries::new("SPY", vec![bar(2, 100.0), bar(3, 101.5)]).unwrap();

        series.to_csv(&path).unwrap();
        let loaded = BarSeries::from_csv(&path, "SPY").unwrap();

        assert_eq!(loaded.bars(), series.bars());
    }

    #[test]
    fn test_csv_with_capitalized_headers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("yahoo.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Date,Open,High,Low,Close,Adj Close,Volume").unwrap();
        writeln!(file, "2024-01-03,101,102,100,101.5,101.2,2000").unwrap();
        writeln!(file, "2024-01-02,100,101,99,100.5,100.2,1000").unwrap();
        drop(file);

        let loaded = BarSeries::from_csv(&path, "SPY").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.bars()[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(loaded.bars()[1].close, 101.5);
    }

    #[test]
    fn test_missing_file_is_data_unavailable() {
        let err = BarSeries::from_csv("/nonexistent/bars.csv", "SPY").unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable(_)));
    }
}
