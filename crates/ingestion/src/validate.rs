//! Input precondition checks.
//!
//! The sampler never repairs input: ticks must arrive time-sorted with a
//! finite positive price, a finite non-negative size, and a finite dollar
//! value.

use infobar_core::{Error, Result, Tick, TimestampNs};
use tracing::warn;

/// Streaming validator that remembers the previous timestamp.
#[derive(Debug, Clone, Default)]
pub struct TickValidator {
    /// Index of the next tick to be checked.
    index: usize,
    /// Timestamp of the last accepted tick.
    prev_ts: Option<TimestampNs>,
}

impl TickValidator {
    /// Create a new validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check one tick and advance.
    pub fn check(&mut self, tick: &Tick) -> Result<()> {
        let index = self.index;

        if !tick.price.is_finite() || tick.price <= 0.0 {
            warn!(index, price = tick.price, "rejecting tick with invalid price");
            return Err(Error::invalid_tick(
                index,
                format!("price must be finite and > 0, got {}", tick.price),
            ));
        }
        if !tick.size.is_finite() || tick.size < 0.0 {
            warn!(index, size = tick.size, "rejecting tick with invalid size");
            return Err(Error::invalid_tick(
                index,
                format!("size must be finite and >= 0, got {}", tick.size),
            ));
        }
        if !tick.dollars().is_finite() {
            warn!(index, price = tick.price, size = tick.size, "rejecting tick whose dollar value overflows");
            return Err(Error::invalid_tick(
                index,
                format!("price * size must be finite, got {}", tick.dollars()),
            ));
        }
        if let Some(prev_ts) = self.prev_ts {
            if tick.ts_ns < prev_ts {
                warn!(index, prev_ts, curr_ts = tick.ts_ns, "ticks out of order");
                return Err(Error::UnsortedInput {
                    index,
                    prev_ts,
                    curr_ts: tick.ts_ns,
                });
            }
        }

        self.prev_ts = Some(tick.ts_ns);
        self.index += 1;
        Ok(())
    }

    /// Number of ticks accepted so far.
    pub fn count(&self) -> usize {
        self.index
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Check a whole tick slice, failing on the first violation.
pub fn validate_ticks(ticks: &[Tick]) -> Result<()> {
    let mut validator = TickValidator::new();
    ticks.iter().try_for_each(|t| validator.check(t))
}
