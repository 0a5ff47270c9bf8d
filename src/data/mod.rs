//! Market data types
//!
//! Provides the validated OHLCV bar series consumed by every pipeline stage.

mod types;

pub use types::{Bar, BarSeries};
