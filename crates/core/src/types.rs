//! Core data types for the infobar system.

use serde::{Deserialize, Serialize};

/// Timestamp in nanoseconds since Unix epoch, already shifted to exchange-local time.
pub type TimestampNs = i64;

/// Size/quantity type.
pub type Size = f64;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A single executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Timestamp in nanoseconds.
    pub ts_ns: TimestampNs,
    /// Trade price.
    pub price: f64,
    /// Trade size.
    pub size: Size,
}

impl Tick {
    pub fn new(ts_ns: TimestampNs, price: f64, size: Size) -> Self {
        Self { ts_ns, price, size }
    }

    /// Traded dollar value (price * size).
    #[inline]
    pub fn dollars(&self) -> f64 {
        self.price * self.size
    }

    /// Natural log of the traded dollar value, or `None` for a zero-size print.
    #[inline]
    pub fn log_dollars(&self) -> Option<f64> {
        let dollars = self.dollars();
        if dollars > 0.0 {
            Some(dollars.ln())
        } else {
            None
        }
    }
}

/// Trade direction inferred by the tick rule. There is no neutral side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i8)]
pub enum Side {
    /// Uptick (buy-like).
    Buy = 1,
    /// Downtick (sell-like).
    Sell = -1,
}

impl Side {
    /// Get the sign as i8.
    #[inline]
    pub fn sign(self) -> i8 {
        self as i8
    }

    /// Get the sign as f64.
    #[inline]
    pub fn sign_f64(self) -> f64 {
        self.sign() as f64
    }

    /// Direction of a price change; `None` for a zero tick.
    #[inline]
    pub fn from_change(delta: f64) -> Option<Side> {
        if delta > 0.0 {
            Some(Side::Buy)
        } else if delta < 0.0 {
            Some(Side::Sell)
        } else {
            None
        }
    }

    /// Build from a raw +1/-1 sign.
    pub fn from_sign(sign: i8) -> Option<Side> {
        match sign {
            1 => Some(Side::Buy),
            -1 => Some(Side::Sell),
            _ => None,
        }
    }

    /// 1.0 for a buy, 0.0 for a sell: `(sign + 1) / 2`.
    #[inline]
    pub fn buy_indicator(self) -> f64 {
        (self.sign_f64() + 1.0) / 2.0
    }

    /// 1.0 for a sell, 0.0 for a buy: `(-sign + 1) / 2`.
    #[inline]
    pub fn sell_indicator(self) -> f64 {
        (-self.sign_f64() + 1.0) / 2.0
    }
}

/// A tick with its inferred direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignedTick {
    /// Underlying tick.
    pub tick: Tick,
    /// Inferred side.
    pub side: Side,
}

impl SignedTick {
    /// Signed log-dollar flow: `sign * ln(price * size)`.
    ///
    /// Zero-size prints carry no flow.
    #[inline]
    pub fn log_dollar_flow(&self) -> f64 {
        self.tick
            .log_dollars()
            .map(|l| self.side.sign_f64() * l)
            .unwrap_or(0.0)
    }
}

/// Sampling rule used to close bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarMode {
    /// Close when cumulative traded dollars reach a threshold.
    Dollar,
    /// Close when signed log-dollar flow leaves the expected-imbalance envelope.
    Imbalance,
}

impl std::str::FromStr for BarMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dollar" => Ok(BarMode::Dollar),
            "imbalance" => Ok(BarMode::Imbalance),
            other => Err(crate::Error::config(format!("unknown bar mode: {other}"))),
        }
    }
}

/// An information-driven OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Monotonic 0-based bar index within the pass.
    pub group_id: u64,
    /// Timestamp of the last tick in the bar.
    pub ts_ns: TimestampNs,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Sum of tick sizes.
    pub volume: Size,
    /// Sum of price * size.
    pub dollar_volume: f64,
    /// Number of ticks.
    pub count: u64,
    /// Sample standard deviation of prices (`None` for a single-tick bar).
    pub price_std: Option<f64>,
    /// `ln(high / low)`.
    pub log_range: f64,
    /// EWMA of `price_std` across bars.
    pub volatility: Option<f64>,
}

impl Bar {
    /// Volume-weighted average price.
    #[inline]
    pub fn vwap(&self) -> Option<f64> {
        if self.volume > 0.0 {
            Some(self.dollar_volume / self.volume)
        } else {
            None
        }
    }

    /// `low <= min(open, close) <= max(open, close) <= high`.
    pub fn is_ohlc_consistent(&self) -> bool {
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
        assert_eq!(Side::from_sign(1), Some(Side::Buy));
        assert_eq!(Side::from_sign(0), None);
    }

    #[test]
    fn test_side_from_change() {
        assert_eq!(Side::from_change(0.5), Some(Side::Buy));
        assert_eq!(Side::from_change(-0.01), Some(Side::Sell));
        assert_eq!(Side::from_change(0.0), None);
    }

    #[test]
    fn test_indicators_sum_to_one() {
        for side in [Side::Buy, Side::Sell] {
            assert_eq!(side.buy_indicator() + side.sell_indicator(), 1.0);
        }
        assert_eq!(Side::Buy.buy_indicator(), 1.0);
        assert_eq!(Side::Sell.buy_indicator(), 0.0);
    }

    #[test]
    fn test_log_dollar_flow() {
        let tick = Tick::new(0, 100.0, 10.0);
        let buy = SignedTick { tick, side: Side::Buy };
        let sell = SignedTick { tick, side: Side::Sell };
        assert_relative_eq!(buy.log_dollar_flow(), 1000.0_f64.ln());
        assert_relative_eq!(sell.log_dollar_flow(), -(1000.0_f64.ln()));

        let empty = SignedTick {
            tick: Tick::new(0, 100.0, 0.0),
            side: Side::Buy,
        };
        assert_eq!(empty.log_dollar_flow(), 0.0);
    }

    #[test]
    fn test_bar_mode_parse() {
        assert_eq!("dollar".parse::<BarMode>().unwrap(), BarMode::Dollar);
        assert_eq!("Imbalance".parse::<BarMode>().unwrap(), BarMode::Imbalance);
        assert!("tick".parse::<BarMode>().is_err());
    }

    #[test]
    fn test_side_serde() {
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"sell\"");
        let side: Side = serde_json::from_str("\"buy\"").unwrap();
        assert_eq!(side, Side::Buy);
    }
}
