//! Streaming statistics for the infobar system.
//!
//! This crate handles:
//! - Exponentially weighted mean / standard deviation
//! - Expected signed order flow (buy/sell probabilities, per-side log-dollars)
//! - Lagged daily dollar volume for adaptive dollar thresholds

pub mod daily_volume;
pub mod ewma;
pub mod flow;

pub use daily_volume::{DailyVolume, DailyVolumeEstimator};
pub use ewma::EwmaEstimator;
pub use flow::{FlowEstimator, FlowSnapshot};
