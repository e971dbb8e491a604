//! Trade side inference using the tick rule.
//!
//! Classifies each tick as buy-like or sell-like from the sign of its price
//! change. Zero ticks continue the previous direction, and the very first
//! tick takes a seed direction, so every output is either +1 or -1.

use infobar_core::{config::SignConfig, Side, SignedTick, Tick};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

/// Statistics about tick-rule classification.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationStats {
    /// Total ticks classified.
    pub total_ticks: u64,
    /// Ticks classified as buy.
    pub buy_ticks: u64,
    /// Ticks classified as sell.
    pub sell_ticks: u64,
    /// Ticks whose side came from the previous tick or the seed (zero price change).
    pub carried_ticks: u64,
    /// Buy volume.
    pub buy_volume: f64,
    /// Sell volume.
    pub sell_volume: f64,
}

impl ClassificationStats {
    /// Fraction of ticks that needed the tie-break.
    pub fn carried_frac(&self) -> f64 {
        if self.total_ticks > 0 {
            self.carried_ticks as f64 / self.total_ticks as f64
        } else {
            0.0
        }
    }

    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Tick-rule classifier.
pub struct SignClassifier {
    /// Side given to the first tick (and to zero ticks before any move).
    seed: Side,
    /// Last trade price.
    last_price: Option<f64>,
    /// Last non-zero direction (starts at the seed).
    last_side: Side,
    /// Classification statistics.
    stats: ClassificationStats,
}

impl SignClassifier {
    /// Create a classifier with an explicit first-tick direction.
    pub fn new(seed: Side) -> Self {
        Self {
            seed,
            last_price: None,
            last_side: seed,
            stats: ClassificationStats::default(),
        }
    }

    /// Create a classifier whose seed is drawn from a fresh, per-instance RNG.
    pub fn from_entropy() -> Self {
        Self::new(draw_side(&mut SmallRng::from_entropy()))
    }

    /// Create a classifier whose seed is drawn from an RNG seeded with `rng_seed`.
    pub fn with_rng_seed(rng_seed: u64) -> Self {
        Self::new(draw_side(&mut SmallRng::seed_from_u64(rng_seed)))
    }

    /// Use the configured seed, or draw one.
    pub fn from_config(config: &SignConfig) -> Self {
        match config.sign_seed {
            Some(seed) => Self::new(seed),
            None => {
                let classifier = Self::from_entropy();
                debug!(seed = ?classifier.seed, "no sign_seed configured, drew first-tick side");
                classifier
            }
        }
    }

    /// The first-tick direction in use.
    pub fn seed(&self) -> Side {
        self.seed
    }

    /// Classify a single tick.
    pub fn classify(&mut self, tick: Tick) -> SignedTick {
        let side = match self.last_price {
            Some(last_price) => Side::from_change(tick.price - last_price),
            None => None,
        };

        let side = match side {
            Some(side) => {
                self.last_side = side;
                side
            }
            None => {
                self.stats.carried_ticks += 1;
                self.last_side
            }
        };

        self.stats.total_ticks += 1;
        match side {
            Side::Buy => {
                self.stats.buy_ticks += 1;
                self.stats.buy_volume += tick.size;
            }
            Side::Sell => {
                self.stats.sell_ticks += 1;
                self.stats.sell_volume += tick.size;
            }
        }

        self.last_price = Some(tick.price);
        SignedTick { tick, side }
    }

    /// Classify multiple ticks in order.
    pub fn classify_batch(&mut self, ticks: &[Tick]) -> Vec<SignedTick> {
        ticks.iter().map(|&t| self.classify(t)).collect()
    }

    /// Get classification statistics.
    pub fn stats(&self) -> &ClassificationStats {
        &self.stats
    }

    /// Reset statistics.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Clear all state except the seed.
    pub fn clear(&mut self) {
        self.last_price = None;
        self.last_side = self.seed;
        self.stats.reset();
    }
}

fn draw_side(rng: &mut SmallRng) -> Side {
    if rng.gen_bool(0.5) {
        Side::Buy
    } else {
        Side::Sell
    }
}

/// Tick-rule signs for a price sequence.
pub fn sign_prices(prices: &[f64], seed: Side) -> Vec<Side> {
    let mut last_side = seed;
    let mut out = Vec::with_capacity(prices.len());
    for (i, &price) in prices.iter().enumerate() {
        if i > 0 {
            if let Some(side) = Side::from_change(price - prices[i - 1]) {
                last_side = side;
            }
        }
        out.push(last_side);
    }
    out
}
