//! Trading signals and the probability threshold that produces them

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Symmetric decision threshold, `0.5 < value <= 1.0`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Threshold(f64);

impl Threshold {
    /// Validate a threshold; values outside (0.5, 1.0] are rejected
    pub fn new(value: f64) -> Result<Self> {
        if value > 0.5 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(PipelineError::InvalidParameter(format!(
                "signal threshold must lie in (0.5, 1.0], got {}",
                value
            )))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Position for the next bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i8")]
pub enum Signal {
    Short = -1,
    Flat = 0,
    Long = 1,
}

impl Signal {
    /// Long above the threshold, short below its complement, flat otherwise
    pub fn from_probability(probability: f64, threshold: Threshold) -> Self {
        if probability > threshold.value() {
            Signal::Long
        } else if probability < 1.0 - threshold.value() {
            Signal::Short
        } else {
            Signal::Flat
        }
    }

    /// Position size (-1, 0 or +1)
    pub fn position(self) -> f64 {
        f64::from(i8::from(self))
    }
}

impl From<Signal> for i8 {
    fn from(signal: Signal) -> Self {
        signal as i8
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Short => write!(f, "SHORT"),
            Signal::Flat => write!(f, "FLAT"),
            Signal::Long => write!(f, "LONG"),
        }
    }
}

/// Signal per feature row
#[derive(Debug, Clone, Serialize)]
pub struct SignalSeries {
    pub dates: Vec<NaiveDate>,
    pub signals: Vec<Signal>,
    /// Predicted probability of an up move
    pub probabilities: Vec<f64>,
}

impl SignalSeries {
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Number of rows holding `signal`
    pub fn count(&self, signal: Signal) -> usize {
        self.signals.iter().filter(|&&s| s == signal).count()
    }

    /// Most recent signal
    pub fn latest(&self) -> Option<Signal> {
        self.signals.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_domain() {
        assert!(Threshold::new(0.5).is_err());
        assert!(Threshold::new(0.50001).is_ok());
        assert!(Threshold::new(1.0).is_ok());
        assert!(Threshold::new(1.01).is_err());
        assert!(Threshold::new(f64::NAN).is_err());
        assert_eq!(Threshold::new(0.55).unwrap().value(), 0.55);
    }

    #[test]
    fn test_from_probability() {
        let threshold = Threshold::new(0.55).unwrap();
        let signals: Vec<Signal> = [0.7, 0.5, 0.3, 0.56, 0.44, 0.55, 0.45]
            .iter()
            .map(|&p| Signal::from_probability(p, threshold))
            .collect();
        assert_eq!(
            signals,
            vec![
                Signal::Long,
                Signal::Flat,
                Signal::Short,
                Signal::Long,
                Signal::Short,
                Signal::Flat,
                Signal::Flat,
            ]
        );
    }

    #[test]
    fn test_threshold_of_one_is_always_flat() {
        let threshold = Threshold::new(1.0).unwrap();
        for p in [0.0, 0.3, 0.5, 0.99, 1.0] {
            assert_eq!(Signal::from_probability(p, threshold), Signal::Flat);
        }
    }

    #[test]
    fn test_position_and_serialization() {
        assert_eq!(Signal::Short.position(), -1.0);
        assert_eq!(Signal::Long.position(), 1.0);
        assert_eq!(serde_json::to_string(&Signal::Short).unwrap(), "-1");
        assert_eq!(Signal::Long.to_string(), "LONG");
    }
}
