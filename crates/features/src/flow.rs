//! Expected signed order flow.
//!
//! Tracks the probability of buy and sell ticks and the expected log-dollar
//! size of each side, and combines them into an expected signed flow per tick.
//! Flow is signed by direction: a sell tick contributes `-ln(price * size)`,
//! so the sell-side expectation is negative and
//! `expected_flow = p_buy * E[flow | buy] + p_sell * E[flow | sell]`.

use infobar_core::{config::FlowConfig, Result, Side, SignedTick};
use serde::Serialize;

use crate::ewma::EwmaEstimator;

/// Flow state as of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowSnapshot {
    /// Signed log-dollar flow of this tick.
    pub log_dollar_flow: f64,
    /// Smoothed buy probability.
    pub p_buy: f64,
    /// Smoothed sell probability.
    pub p_sell: f64,
    /// Expected flow of a buy tick (0 before the first buy).
    pub expected_buy: f64,
    /// Expected flow of a sell tick (0 before the first sell, otherwise negative).
    pub expected_sell: f64,
    /// `p_buy * expected_buy + p_sell * expected_sell`.
    pub expected_flow: f64,
    /// EWMA standard deviation of the signed flow (None before two ticks).
    pub volatility: Option<f64>,
}

/// Streaming expected-flow estimator.
#[derive(Debug, Clone)]
pub struct FlowEstimator {
    /// Buy indicator EWMA.
    p_buy: EwmaEstimator,
    /// Sell indicator EWMA.
    p_sell: EwmaEstimator,
    /// Flow EWMA over buy ticks only.
    buy_flow: EwmaEstimator,
    /// Flow EWMA over sell ticks only.
    sell_flow: EwmaEstimator,
    /// EWMA over all signed flow, for its standard deviation.
    volatility: EwmaEstimator,
}

impl FlowEstimator {
    /// Create a new estimator from configuration.
    pub fn new(config: &FlowConfig) -> Result<Self> {
        Ok(Self {
            p_buy: EwmaEstimator::with_span(config.sign_span)?,
            p_sell: EwmaEstimator::with_span(config.sign_span)?,
            buy_flow: EwmaEstimator::with_span(config.flow_span)?,
            sell_flow: EwmaEstimator::with_span(config.flow_span)?,
            volatility: EwmaEstimator::with_alpha(config.volatility_decay)?,
        })
    }

    /// Process a signed tick.
    pub fn update(&mut self, tick: &SignedTick) -> FlowSnapshot {
        let flow = tick.log_dollar_flow();

        let p_buy = self.p_buy.update(tick.side.buy_indicator());
        let p_sell = self.p_sell.update(tick.side.sell_indicator());

        // Zero-size prints have no log-dollar size to learn from
        if tick.tick.log_dollars().is_some() {
            match tick.side {
                Side::Buy => self.buy_flow.update(flow),
                Side::Sell => self.sell_flow.update(flow),
            };
        }

        let expected_buy = self.buy_flow.mean().unwrap_or(0.0);
        let expected_sell = self.sell_flow.mean().unwrap_or(0.0);

        self.volatility.update(flow);

        FlowSnapshot {
            log_dollar_flow: flow,
            p_buy,
            p_sell,
            expected_buy,
            expected_sell,
            expected_flow: p_buy * expected_buy + p_sell * expected_sell,
            volatility: self.volatility.std().ok(),
        }
    }

    /// Number of ticks seen.
    pub fn count(&self) -> u64 {
        self.volatility.count()
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        self.p_buy.clear();
        self.p_sell.clear();
        self.buy_flow.clear();
        self.sell_flow.clear();
        self.volatility.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use infobar_core::Tick;

    fn signed(ts_ns: i64, price: f64, size: f64, side: Side) -> SignedTick {
        SignedTick {
            tick: Tick::new(ts_ns, price, size),
            side,
        }
    }

    fn estimator() -> FlowEstimator {
        FlowEstimator::new(&FlowConfig::default()).unwrap()
    }

    #[test]
    fn test_first_tick() {
        let mut flow = estimator();
        let snap = flow.update(&signed(1, 100.0, 10.0, Side::Buy));

        let l = 1000.0_f64.ln();
        assert_relative_eq!(snap.log_dollar_flow, l);
        assert_eq!(snap.p_buy, 1.0);
        assert_eq!(snap.p_sell, 0.0);
        assert_relative_eq!(snap.expected_buy, l);
        assert_eq!(snap.expected_sell, 0.0);
        assert_relative_eq!(snap.expected_flow, l);
        assert!(snap.volatility.is_none());
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let mut flow = estimator();
        let sides = [Side::Buy, Side::Sell, Side::Sell, Side::Buy, Side::Sell];
        for (i, side) in sides.iter().enumerate() {
            let snap = flow.update(&signed(i as i64, 50.0, 2.0, *side));
            assert!((snap.p_buy + snap.p_sell - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sell_side_is_negative() {
        let mut flow = estimator();
        flow.update(&signed(1, 100.0, 10.0, Side::Buy));
        let snap = flow.update(&signed(2, 99.0, 10.0, Side::Sell));

        assert!(snap.log_dollar_flow < 0.0);
        assert!(snap.expected_sell < 0.0);
        assert_relative_eq!(snap.expected_sell, -(990.0_f64.ln()));
        // Buy side keeps its last estimate
        assert_relative_eq!(snap.expected_buy, 1000.0_f64.ln());
        assert!(snap.volatility.is_some());
    }

    #[test]
    fn test_balanced_flow_has_small_expectation() {
        let mut flow = estimator();
        let mut last = None;
        for i in 0..20_000 {
            let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
            last = Some(flow.update(&signed(i, 100.0, 10.0, side)));
        }
        let snap = last.unwrap();
        let l = 1000.0_f64.ln();

        assert!(snap.expected_flow.abs() < 0.01 * l);
        // Flow alternates between +l and -l
        assert!((snap.volatility.unwrap() - l).abs() < 0.05 * l);
    }

    #[test]
    fn test_one_sided_flow() {
        let mut flow = estimator();
        let mut last = None;
        for i in 0..100 {
            last = Some(flow.update(&signed(i, 100.0, 10.0, Side::Buy)));
        }
        let snap = last.unwrap();
        assert_relative_eq!(snap.p_buy, 1.0, epsilon = 1e-12);
        assert_relative_eq!(snap.expected_flow, 1000.0_f64.ln(), epsilon = 1e-9);
        assert!(snap.volatility.unwrap() < 1e-4);
    }

    #[test]
    fn test_zero_size_tick() {
        let mut flow = estimator();
        let snap = flow.update(&signed(1, 100.0, 0.0, Side::Buy));
        assert_eq!(snap.log_dollar_flow, 0.0);
        assert_eq!(snap.expected_buy, 0.0);
        assert_eq!(snap.expected_flow, 0.0);
        assert_eq!(flow.count(), 1);
    }

    #[test]
    fn test_invalid_config() {
        let config = FlowConfig {
            volatility_decay: 2.0,
            ..FlowConfig::default()
        };
        assert!(FlowEstimator::new(&config).is_err());
    }
}
