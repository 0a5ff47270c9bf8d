//! Dated portfolio value series

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Portfolio value on one date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Date-ordered portfolio values
///
/// May be empty; analytics on fewer than two points report undefined
/// statistics instead of failing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValueSeries {
    points: Vec<ValuePoint>,
}

impl ValueSeries {
    /// Sort by date and validate
    pub fn new(mut points: Vec<ValuePoint>) -> Result<Self> {
        points.sort_by_key(|p| p.date);

        if let Some(w) = points.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(PipelineError::DataUnavailable(format!(
                "duplicate portfolio date {}",
                w[0].date
            )));
        }
        if let Some(p) = points.iter().find(|p| !p.value.is_finite() || p.value <= 0.0) {
            return Err(PipelineError::DataUnavailable(format!(
                "invalid portfolio value {} on {}",
                p.value, p.date
            )));
        }

        Ok(Self { points })
    }

    /// Load a `Date,Value` table; header case is ignored
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path).map_err(|e| {
            PipelineError::DataUnavailable(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
        let headers: csv::StringRecord = reader
            .headers()?
            .iter()
            .map(|h| h.to_lowercase())
            .collect();
        reader.set_headers(headers);

        let mut points = Vec::new();
        for result in reader.deserialize() {
            let point: ValuePoint = result?;
            points.push(point);
        }

        Self::new(points)
    }

    pub fn points(&self) -> &[ValuePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}
