//! Regime detection module
//!
//! Fits a sequence model to log returns and labels every bar with a hidden
//! market regime, plus per-regime statistics.

mod detector;
mod summary;

pub use detector::{RegimeDetection, RegimeDetector, RegimeLabels};
pub use summary::{summarize_regimes, RegimeSummary};
