//! # Quant Pipeline
//!
//! Regime-aware directional signal research on daily bars.
//!
//! ## Modules
//!
//! - `api` - Yahoo Finance chart client
//! - `data` - Validated OHLCV bar series and CSV import/export
//! - `features` - SMA, RSI and ATR feature frame
//! - `models` - Gaussian HMM and logistic regression
//! - `regime` - Market regime detection and statistics
//! - `signals` - Direction classifier and thresholded signals
//! - `trading` - Vectorized backtest and performance metrics
//! - `portfolio` - Analytics for an external value series
//! - `pipeline` - End-to-end run from one configuration

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod portfolio;
pub mod regime;
pub mod signals;
pub mod trading;

pub use config::PipelineConfig;
pub use data::{Bar, BarSeries};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineReport};
