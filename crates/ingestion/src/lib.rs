//! Tick ingestion for the infobar system.
//!
//! This crate handles:
//! - Input precondition checks (ordering, finite prices and sizes)
//! - Trade side inference (tick rule with zero-tick continuation)
//! - Calendar-day partitioning

pub mod calendar;
pub mod classifier;
pub mod validate;

pub use calendar::{day_of, split_by_day};
pub use classifier::{sign_prices, ClassificationStats, SignClassifier};
pub use validate::{validate_ticks, TickValidator};
