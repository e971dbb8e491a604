//! Information-driven bar sampling.
//!
//! This crate handles:
//! - Dollar bars (fixed or per-day adaptive threshold)
//! - Imbalance bars with an online-adapting expected bar length
//! - Reducing labelled ticks into OHLCV bars with dispersion statistics
//! - Batch and incremental tick-to-bar pipelines

pub mod aggregator;
pub mod emitter;
pub mod engine;

pub use aggregator::{
    Assignment, BarAggregator, DollarBarAggregator, DollarThreshold, DollarThresholdState,
    ImbalanceBarAggregator, ImbalanceThresholdState,
};
pub use emitter::BarEmitter;
pub use engine::{dollar_bars, imbalance_bars, BarEngine, BarStream, PassStats};
