//! Directional signal generation
//!
//! Trains a classifier on the feature frame (with regime labels attached)
//! and maps its probabilities to long, flat or short positions.

mod model;
mod signal;

pub use model::{FeatureImportance, SignalModel, TrainingReport};
pub use signal::{Signal, SignalSeries, Threshold};
