//! Feature engineering module
//!
//! Technical indicators and the feature frame consumed by the signal model.

mod engine;
pub mod indicators;

pub use engine::{
    FeatureEngine, FeatureFrame, ATR, MODEL_FEATURES, REGIME, RSI, SMA_FAST, SMA_SLOW,
};
