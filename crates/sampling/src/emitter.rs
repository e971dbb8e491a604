//! Bar emission from group-labelled ticks.
//!
//! Ticks are accumulated per group id; a group is turned into a [`Bar`] when it
//! is finalized. Bar-level volatility is an EWMA of per-bar price standard
//! deviation, applied in the order bars are finalized.

use infobar_core::{config::EmitterConfig, Bar, Error, Result, Tick, TimestampNs};
use infobar_features::EwmaEstimator;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// A bar that's currently being built.
#[derive(Debug, Clone)]
struct BarInProgress {
    group_id: u64,
    open_ts: TimestampNs,
    open: f64,
    close_ts: TimestampNs,
    close: f64,
    high: f64,
    low: f64,
    volume: f64,
    dollar_volume: f64,
    prices: Vec<f64>,
}

impl BarInProgress {
    fn new(group_id: u64, tick: &Tick) -> Self {
        Self {
            group_id,
            open_ts: tick.ts_ns,
            open: tick.price,
            close_ts: tick.ts_ns,
            close: tick.price,
            high: f64::NEG_INFINITY,
            low: f64::INFINITY,
            volume: 0.0,
            dollar_volume: 0.0,
            prices: Vec::new(),
        }
    }

    fn add_tick(&mut self, tick: &Tick) {
        if tick.ts_ns < self.open_ts {
            self.open_ts = tick.ts_ns;
            self.open = tick.price;
        }
        if tick.ts_ns >= self.close_ts {
            self.close_ts = tick.ts_ns;
            self.close = tick.price;
        }
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.volume += tick.size;
        self.dollar_volume += tick.dollars();
        self.prices.push(tick.price);
    }

    /// Sample standard deviation (n - 1) of prices.
    fn price_std(&self) -> Option<f64> {
        if self.prices.len() < 2 {
            return None;
        }
        Some(self.prices.iter().std_dev())
    }

    fn to_bar(&self) -> Bar {
        Bar {
            group_id: self.group_id,
            ts_ns: self.close_ts,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            dollar_volume: self.dollar_volume,
            count: self.prices.len() as u64,
            price_std: self.price_std(),
            log_range: (self.high / self.low).ln(),
            volatility: None,
        }
    }
}

/// Builds bars from ticks labelled with group ids.
#[derive(Debug, Clone)]
pub struct BarEmitter {
    /// Open bars keyed by group id.
    bars: BTreeMap<u64, BarInProgress>,
    /// EWMA of per-bar price std.
    volatility: EwmaEstimator,
}

impl BarEmitter {
    /// Create a new emitter from configuration.
    pub fn new(config: &EmitterConfig) -> Result<Self> {
        Ok(Self {
            bars: BTreeMap::new(),
            volatility: EwmaEstimator::with_span(config.volatility_span)?,
        })
    }

    /// Add a tick to a group.
    pub fn add_tick(&mut self, group_id: u64, tick: &Tick) {
        self.bars
            .entry(group_id)
            .or_insert_with(|| BarInProgress::new(group_id, tick))
            .add_tick(tick);
    }

    /// Add a batch of ticks with their group ids.
    pub fn add_ticks(&mut self, ticks: &[Tick], group_ids: &[u64]) -> Result<()> {
        if ticks.len() != group_ids.len() {
            return Err(Error::config(format!(
                "{} ticks but {} group ids",
                ticks.len(),
                group_ids.len()
            )));
        }
        for (tick, &group_id) in ticks.iter().zip(group_ids) {
            self.add_tick(group_id, tick);
        }
        Ok(())
    }

    /// Finalize one group and return its bar.
    pub fn finalize(&mut self, group_id: u64) -> Option<Bar> {
        let bar = self.bars.remove(&group_id)?.to_bar();
        Some(self.smooth(bar))
    }

    /// Finalize every remaining group, ordered by bar timestamp.
    pub fn finish(&mut self) -> Vec<Bar> {
        let mut bars: Vec<Bar> = std::mem::take(&mut self.bars)
            .into_values()
            .map(|b| b.to_bar())
            .collect();
        // Stable: bars with equal timestamps keep group order
        bars.sort_by_key(|b| b.ts_ns);
        bars.into_iter().map(|b| self.smooth(b)).collect()
    }

    /// Attach the running bar-level volatility.
    fn smooth(&mut self, mut bar: Bar) -> Bar {
        bar.volatility = match bar.price_std {
            Some(std) => Some(self.volatility.update(std)),
            // Single-tick bars carry the previous estimate
            None => self.volatility.mean(),
        };
        bar
    }

    /// Number of groups still open.
    pub fn pending_count(&self) -> usize {
        self.bars.len()
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        self.bars.clear();
        self.volatility.clear();
    }
}
