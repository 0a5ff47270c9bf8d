//! Portfolio analytics
//!
//! Risk statistics for an externally supplied (date, value) series, such as
//! an account equity export.

mod analytics;
mod series;

pub use analytics::{compute_stats, PortfolioReport};
pub use series::{ValuePoint, ValueSeries};
