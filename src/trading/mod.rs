//! Trading module
//!
//! Vectorized backtest of a signal series and the performance metrics shared
//! with portfolio analytics.

mod backtest;
pub mod metrics;

pub use backtest::{BacktestEngine, BacktestReport, BacktestStats};
