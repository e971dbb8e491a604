//! Bar boundary decisions.
//!
//! Each aggregator is a left-to-right fold with one piece of carried threshold
//! state. Every tick is assigned to the current group first; if the tick
//! completes the bar, the group id advances afterwards, so the closing tick
//! always belongs to the bar it closes.

use chrono::NaiveDate;
use infobar_core::{BarMode, Config, Error, Result, SignedTick, Tick};
use infobar_features::{DailyVolumeEstimator, FlowEstimator, FlowSnapshot};
use infobar_ingestion::day_of;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Group assignment for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Bar the tick belongs to.
    pub group_id: u64,
    /// Whether this tick closed the bar.
    pub closed: bool,
}

// ============================================================================
// Dollar bars
// ============================================================================

/// Where the dollar threshold comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DollarThreshold {
    /// One threshold for the whole pass.
    Fixed(f64),
    /// One threshold per calendar day.
    Daily(BTreeMap<NaiveDate, f64>),
}

impl DollarThreshold {
    /// Derive per-day thresholds from the ticks' own daily volume history.
    pub fn from_daily_volume(estimator: &DailyVolumeEstimator, ticks: &[Tick]) -> Result<Self> {
        Ok(DollarThreshold::Daily(estimator.thresholds(ticks)?))
    }

    fn validate(&self) -> Result<()> {
        match self {
            DollarThreshold::Fixed(threshold) => Error::check_threshold(*threshold).map(|_| ()),
            DollarThreshold::Daily(days) => days
                .values()
                .try_for_each(|t| Error::check_threshold(*t).map(|_| ())),
        }
    }
}

/// Carried state of a dollar-bar pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DollarThresholdState {
    /// Dollars traded in the open bar.
    pub cumulative_dollars: f64,
    /// Threshold in force for the current tick's day.
    pub threshold: f64,
}

/// Closes a bar once cumulative traded dollars reach the threshold.
#[derive(Debug, Clone)]
pub struct DollarBarAggregator {
    policy: DollarThreshold,
    state: DollarThresholdState,
    /// Day whose threshold is cached in `state`.
    current_day: Option<NaiveDate>,
    group_id: u64,
}

impl DollarBarAggregator {
    /// Create an aggregator with a threshold policy.
    pub fn new(policy: DollarThreshold) -> Result<Self> {
        policy.validate()?;
        let threshold = match &policy {
            DollarThreshold::Fixed(t) => *t,
            DollarThreshold::Daily(_) => f64::NAN,
        };
        Ok(Self {
            policy,
            state: DollarThresholdState {
                cumulative_dollars: 0.0,
                threshold,
            },
            current_day: None,
            group_id: 0,
        })
    }

    /// Create with one fixed threshold.
    pub fn fixed(threshold: f64) -> Result<Self> {
        Self::new(DollarThreshold::Fixed(threshold))
    }

    fn refresh_threshold(&mut self, tick: &Tick) -> Result<()> {
        if let DollarThreshold::Daily(days) = &self.policy {
            let day = day_of(tick.ts_ns);
            if self.current_day != Some(day) {
                let threshold = days.get(&day).copied().ok_or_else(|| {
                    Error::insufficient_data(format!("no dollar threshold for {day}"))
                })?;
                debug!(%day, threshold, "switching dollar threshold");
                self.state.threshold = threshold;
                self.current_day = Some(day);
            }
        }
        Ok(())
    }

    /// Assign one tick to a bar.
    pub fn push(&mut self, tick: &Tick) -> Result<Assignment> {
        self.refresh_threshold(tick)?;

        let group_id = self.group_id;
        self.state.cumulative_dollars += tick.dollars();

        let closed = self.state.cumulative_dollars >= self.state.threshold;
        if closed {
            trace!(
                group_id,
                dollars = self.state.cumulative_dollars,
                threshold = self.state.threshold,
                "dollar bar closed"
            );
            self.group_id += 1;
            self.state.cumulative_dollars = 0.0;
        }

        Ok(Assignment { group_id, closed })
    }

    /// Current threshold state.
    pub fn state(&self) -> &DollarThresholdState {
        &self.state
    }

    /// Id of the open bar.
    pub fn group_id(&self) -> u64 {
        self.group_id
    }
}

// ============================================================================
// Imbalance bars
// ============================================================================

/// Carried state of an imbalance-bar pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ImbalanceThresholdState {
    /// Signed log-dollar flow in the open bar.
    pub cumulative_flow: f64,
    /// Ticks in the open bar.
    pub ticks_in_bar: u64,
    /// Expected ticks per bar, adapted at every close.
    pub bar_length: f64,
}

/// Closes a bar once accumulated signed flow leaves the expected-imbalance envelope.
///
/// `envelope = (|expected_flow| + slack * sigma) * bar_length`. On close the
/// bar length moves toward the realized size:
/// `bar_length = memory * bar_length + (1 - memory) * ticks_in_bar`.
#[derive(Debug, Clone)]
pub struct ImbalanceBarAggregator {
    state: ImbalanceThresholdState,
    /// Minimum ticks before a bar may close.
    min_ticks: u64,
    /// Weight kept on the previous bar length.
    memory: f64,
    /// Multiplier on flow volatility in the envelope.
    slack: f64,
    group_id: u64,
}

impl ImbalanceBarAggregator {
    /// Create an aggregator.
    pub fn new(starting_bar_length: f64, min_ticks: u64, memory: f64, slack: f64) -> Result<Self> {
        if !(starting_bar_length.is_finite() && starting_bar_length > 0.0) {
            return Err(Error::InvalidThreshold {
                threshold: starting_bar_length,
            });
        }
        if !(0.0..1.0).contains(&memory) {
            return Err(Error::config(format!(
                "bar length memory must be in [0, 1), got {memory}"
            )));
        }
        Ok(Self {
            state: ImbalanceThresholdState {
                cumulative_flow: 0.0,
                ticks_in_bar: 0,
                bar_length: starting_bar_length,
            },
            min_ticks: min_ticks.max(1),
            memory,
            slack,
            group_id: 0,
        })
    }

    /// Create from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.bars.starting_bar_length,
            config.bars.min_ticks_per_bar,
            config.bars.bar_length_memory,
            config.flow.volatility_slack,
        )
    }

    /// Envelope the cumulative flow must reach, given this tick's flow state.
    #[inline]
    pub fn envelope(&self, flow: &FlowSnapshot) -> f64 {
        // Before two ticks there is no volatility estimate; the min-size guard
        // keeps such bars open anyway.
        let sigma = flow.volatility.unwrap_or(0.0);
        (flow.expected_flow.abs() + self.slack * sigma) * self.state.bar_length
    }

    /// Assign one tick (represented by its flow state) to a bar.
    pub fn push(&mut self, flow: &FlowSnapshot) -> Assignment {
        let group_id = self.group_id;
        self.state.cumulative_flow += flow.log_dollar_flow;
        self.state.ticks_in_bar += 1;

        let envelope = self.envelope(flow);
        let closed = self.state.ticks_in_bar >= self.min_ticks
            && self.state.cumulative_flow.abs() >= envelope;

        if closed {
            let realized = self.state.ticks_in_bar as f64;
            let bar_length = self.memory * self.state.bar_length + (1.0 - self.memory) * realized;
            trace!(
                group_id,
                ticks = self.state.ticks_in_bar,
                flow = self.state.cumulative_flow,
                envelope,
                bar_length,
                "imbalance bar closed"
            );
            self.state.bar_length = bar_length;
            self.state.cumulative_flow = 0.0;
            self.state.ticks_in_bar = 0;
            self.group_id += 1;
        }

        Assignment { group_id, closed }
    }

    /// Current threshold state.
    pub fn state(&self) -> &ImbalanceThresholdState {
        &self.state
    }

    /// Id of the open bar.
    pub fn group_id(&self) -> u64 {
        self.group_id
    }
}

// ============================================================================
// Mode dispatch
// ============================================================================

/// Bar boundary state machine for either sampling mode.
///
/// The imbalance variant owns the flow estimator that feeds it, so both modes
/// consume the same stream of signed ticks.
#[derive(Debug, Clone)]
pub enum BarAggregator {
    Dollar(DollarBarAggregator),
    Imbalance {
        flow: FlowEstimator,
        bars: ImbalanceBarAggregator,
    },
}

impl BarAggregator {
    /// Build the aggregator for a pass over `ticks`.
    ///
    /// Dollar mode without a fixed threshold derives per-day thresholds from
    /// the ticks' daily volume, which needs the whole input up front.
    pub fn for_pass(config: &Config, ticks: &[Tick]) -> Result<Self> {
        match config.bars.mode {
            BarMode::Dollar => {
                let policy = match config.bars.threshold {
                    Some(threshold) => DollarThreshold::Fixed(threshold),
                    None => {
                        let estimator = DailyVolumeEstimator::new(&config.daily_volume)?;
                        DollarThreshold::from_daily_volume(&estimator, ticks)?
                    }
                };
                Ok(BarAggregator::Dollar(DollarBarAggregator::new(policy)?))
            }
            BarMode::Imbalance => Self::imbalance(config),
        }
    }

    /// Build an aggregator that needs no look at the input.
    ///
    /// Fails for dollar mode without a fixed threshold.
    pub fn streaming(config: &Config) -> Result<Self> {
        match (config.bars.mode, config.bars.threshold) {
            (BarMode::Dollar, Some(threshold)) => {
                Ok(BarAggregator::Dollar(DollarBarAggregator::fixed(threshold)?))
            }
            (BarMode::Dollar, None) => Err(Error::config(
                "streaming dollar bars need a fixed threshold",
            )),
            (BarMode::Imbalance, _) => Self::imbalance(config),
        }
    }

    fn imbalance(config: &Config) -> Result<Self> {
        Ok(BarAggregator::Imbalance {
            flow: FlowEstimator::new(&config.flow)?,
            bars: ImbalanceBarAggregator::from_config(config)?,
        })
    }

    /// Assign one signed tick to a bar.
    pub fn push(&mut self, tick: &SignedTick) -> Result<Assignment> {
        match self {
            BarAggregator::Dollar(bars) => bars.push(&tick.tick),
            BarAggregator::Imbalance { flow, bars } => {
                let snapshot = flow.update(tick);
                Ok(bars.push(&snapshot))
            }
        }
    }

    /// Id of the open bar.
    pub fn group_id(&self) -> u64 {
        match self {
            BarAggregator::Dollar(bars) => bars.group_id(),
            BarAggregator::Imbalance { bars, .. } => bars.group_id(),
        }
    }

    /// Sampling mode.
    pub fn mode(&self) -> BarMode {
        match self {
            BarAggregator::Dollar(_) => BarMode::Dollar,
            BarAggregator::Imbalance { .. } => BarMode::Imbalance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infobar_core::{Side, NANOS_PER_SEC};

    const DAY_NS: i64 = 86_400 * NANOS_PER_SEC;

    fn snapshot(flow: f64, expected: f64, volatility: Option<f64>) -> FlowSnapshot {
        FlowSnapshot {
            log_dollar_flow: flow,
            p_buy: 0.5,
            p_sell: 0.5,
            expected_buy: 0.0,
            expected_sell: 0.0,
            expected_flow: expected,
            volatility,
        }
    }

    #[test]
    fn test_dollar_scenario() {
        let mut agg = DollarBarAggregator::fixed(2000.0).unwrap();

        let a1 = agg.push(&Tick::new(1, 100.0, 10.0)).unwrap();
        assert_eq!(a1, Assignment { group_id: 0, closed: false });
        assert!((agg.state().cumulative_dollars - 1000.0).abs() < 1e-10);

        let a2 = agg.push(&Tick::new(2, 101.0, 5.0)).unwrap();
        assert_eq!(a2, Assignment { group_id: 0, closed: false });
        assert!((agg.state().cumulative_dollars - 1505.0).abs() < 1e-10);

        // Crosses the threshold: still assigned to the closing bar
        let a3 = agg.push(&Tick::new(3, 99.0, 20.0)).unwrap();
        assert_eq!(a3, Assignment { group_id: 0, closed: true });
        assert_eq!(agg.state().cumulative_dollars, 0.0);
        assert_eq!(agg.group_id(), 1);
    }

    #[test]
    fn test_dollar_exact_threshold_closes() {
        let mut agg = DollarBarAggregator::fixed(1000.0).unwrap();
        assert!(agg.push(&Tick::new(1, 100.0, 10.0)).unwrap().closed);
        assert_eq!(agg.push(&Tick::new(2, 100.0, 1.0)).unwrap().group_id, 1);
    }

    #[test]
    fn test_dollar_invalid_threshold() {
        assert!(matches!(
            DollarBarAggregator::fixed(0.0),
            Err(Error::InvalidThreshold { .. })
        ));
        assert!(DollarBarAggregator::fixed(-10.0).is_err());
        let mut days = BTreeMap::new();
        days.insert(NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(), -1.0);
        assert!(DollarBarAggregator::new(DollarThreshold::Daily(days)).is_err());
    }

    #[test]
    fn test_dollar_daily_threshold_switch() {
        let day0 = day_of(3 * DAY_NS);
        let day1 = day_of(4 * DAY_NS);
        let mut days = BTreeMap::new();
        days.insert(day0, 1000.0);
        days.insert(day1, 100.0);

        let mut agg = DollarBarAggregator::new(DollarThreshold::Daily(days)).unwrap();
        assert!(!agg.push(&Tick::new(3 * DAY_NS, 10.0, 50.0)).unwrap().closed);
        assert_eq!(agg.state().threshold, 1000.0);

        // Next day: the open bar continues, judged against the new threshold
        let a = agg.push(&Tick::new(4 * DAY_NS, 10.0, 6.0)).unwrap();
        assert_eq!(agg.state().threshold, 100.0);
        assert!(a.closed);
        assert_eq!(a.group_id, 0);
    }

    #[test]
    fn test_dollar_daily_missing_day() {
        let mut days = BTreeMap::new();
        days.insert(day_of(3 * DAY_NS), 1000.0);
        let mut agg = DollarBarAggregator::new(DollarThreshold::Daily(days)).unwrap();
        assert!(matches!(
            agg.push(&Tick::new(9 * DAY_NS, 10.0, 1.0)),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_imbalance_min_ticks_guard() {
        let mut agg = ImbalanceBarAggregator::new(1.0, 3, 0.1, 0.1).unwrap();

        // Flow far outside the envelope, but the bar needs 3 ticks
        assert!(!agg.push(&snapshot(10.0, 0.1, None)).closed);
        assert!(!agg.push(&snapshot(10.0, 0.1, Some(0.0))).closed);
        let third = agg.push(&snapshot(10.0, 0.1, Some(0.0)));
        assert!(third.closed);
        assert_eq!(third.group_id, 0);
        assert_eq!(agg.group_id(), 1);
    }

    #[test]
    fn test_imbalance_bar_length_adapts() {
        let mut agg = ImbalanceBarAggregator::new(5.0, 3, 0.1, 0.1).unwrap();

        // Envelope = (1 + 0.1 * 0) * 5 = 5; flow of 1 per tick closes at tick 5
        for i in 0..5 {
            let a = agg.push(&snapshot(1.0, 1.0, Some(0.0)));
            assert_eq!(a.closed, i == 4);
        }
        assert!((agg.state().bar_length - 5.0).abs() < 1e-10);

        // Flow of 2 per tick: envelope 5 crossed at tick 3
        for i in 0..3 {
            let a = agg.push(&snapshot(2.0, 1.0, Some(0.0)));
            assert_eq!(a.closed, i == 2);
        }
        // 0.1 * 5 + 0.9 * 3
        assert!((agg.state().bar_length - 3.2).abs() < 1e-10);
        assert_eq!(agg.state().ticks_in_bar, 0);
        assert_eq!(agg.state().cumulative_flow, 0.0);
    }

    #[test]
    fn test_imbalance_volatility_widens_envelope() {
        let agg = ImbalanceBarAggregator::new(10.0, 3, 0.1, 0.1).unwrap();
        let calm = agg.envelope(&snapshot(0.0, -2.0, Some(0.0)));
        let noisy = agg.envelope(&snapshot(0.0, -2.0, Some(5.0)));
        assert!((calm - 20.0).abs() < 1e-10);
        assert!((noisy - 25.0).abs() < 1e-10);
    }

    #[test]
    fn test_imbalance_negative_flow_closes() {
        let mut agg = ImbalanceBarAggregator::new(3.0, 3, 0.1, 0.1).unwrap();
        agg.push(&snapshot(-1.0, 1.0, Some(0.0)));
        agg.push(&snapshot(-1.0, 1.0, Some(0.0)));
        assert!(agg.push(&snapshot(-1.0, 1.0, Some(0.0))).closed);
    }

    #[test]
    fn test_imbalance_invalid_params() {
        assert!(ImbalanceBarAggregator::new(0.0, 3, 0.1, 0.1).is_err());
        assert!(ImbalanceBarAggregator::new(f64::NAN, 3, 0.1, 0.1).is_err());
        assert!(ImbalanceBarAggregator::new(5.0, 3, 1.0, 0.1).is_err());
    }

    #[test]
    fn test_streaming_requires_fixed_dollar_threshold() {
        assert!(matches!(
            BarAggregator::streaming(&Config::adaptive_dollar()),
            Err(Error::Config(_))
        ));
        assert_eq!(
            BarAggregator::streaming(&Config::dollar(10.0)).unwrap().mode(),
            BarMode::Dollar
        );
        assert_eq!(
            BarAggregator::streaming(&Config::imbalance(5.0)).unwrap().mode(),
            BarMode::Imbalance
        );
    }

    #[test]
    fn test_for_pass_adaptive_dollar() {
        let ticks = vec![
            Tick::new(3 * DAY_NS, 10.0, 100.0),
            Tick::new(3 * DAY_NS + 1, 10.0, 100.0),
        ];
        let mut agg = BarAggregator::for_pass(&Config::adaptive_dollar(), &ticks).unwrap();
        // Daily volume 2000 -> threshold 2
        let signed = SignedTick {
            tick: ticks[0],
            side: Side::Buy,
        };
        assert!(agg.push(&signed).unwrap().closed);
        assert_eq!(agg.group_id(), 1);
    }
}
