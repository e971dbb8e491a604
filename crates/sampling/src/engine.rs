//! Tick-to-bar pipeline.
//!
//! Wires validation, tick-rule classification, flow estimation, bar boundary
//! decisions and bar emission into a single left-to-right pass.

use infobar_core::{Bar, Config, Result, Side, Tick};
use infobar_ingestion::{validate_ticks, ClassificationStats, SignClassifier, TickValidator};
use serde::Serialize;
use tracing::info;

use crate::aggregator::BarAggregator;
use crate::emitter::BarEmitter;

/// Summary of one pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassStats {
    /// Ticks consumed.
    pub ticks: u64,
    /// Bars emitted, including a trailing partial bar.
    pub bars: u64,
    /// Whether the last bar closed before the input ran out.
    pub last_bar_partial: bool,
    /// Tick-rule classification statistics.
    pub classification: ClassificationStats,
}

/// Incremental tick-to-bar pipeline.
///
/// Bars are returned as soon as they close; [`BarStream::finish`] flushes the
/// trailing partial bar.
pub struct BarStream {
    validator: TickValidator,
    classifier: SignClassifier,
    aggregator: BarAggregator,
    emitter: BarEmitter,
    bars: u64,
}

impl BarStream {
    /// Create a stream for an unbounded source.
    ///
    /// Dollar mode needs a fixed threshold here, since per-day thresholds are
    /// derived from the whole input.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Self::with_aggregator(config, BarAggregator::streaming(config)?)
    }

    /// Create a stream around a prepared aggregator.
    pub fn with_aggregator(config: &Config, aggregator: BarAggregator) -> Result<Self> {
        Ok(Self {
            validator: TickValidator::new(),
            classifier: SignClassifier::from_config(&config.sign),
            aggregator,
            emitter: BarEmitter::new(&config.emitter)?,
            bars: 0,
        })
    }

    /// Push one tick; returns the bar it closed, if any.
    pub fn push(&mut self, tick: &Tick) -> Result<Option<Bar>> {
        self.validator.check(tick)?;
        let signed = self.classifier.classify(*tick);
        let assignment = self.aggregator.push(&signed)?;
        self.emitter.add_tick(assignment.group_id, tick);

        if !assignment.closed {
            return Ok(None);
        }
        let bar = self.emitter.finalize(assignment.group_id);
        if bar.is_some() {
            self.bars += 1;
        }
        Ok(bar)
    }

    /// Flush the trailing partial bar, if any ticks are pending.
    pub fn finish(&mut self) -> Vec<Bar> {
        let rest = self.emitter.finish();
        self.bars += rest.len() as u64;
        rest
    }

    /// Side drawn or configured for the first tick.
    pub fn sign_seed(&self) -> Side {
        self.classifier.seed()
    }

    /// Statistics so far.
    pub fn stats(&self) -> PassStats {
        PassStats {
            ticks: self.validator.count() as u64,
            bars: self.bars,
            last_bar_partial: self.emitter.pending_count() > 0,
            classification: self.classifier.stats().clone(),
        }
    }
}

/// Batch tick-to-bar engine.
#[derive(Debug, Clone)]
pub struct BarEngine {
    config: Config,
}

impl BarEngine {
    /// Create a new engine from configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Aggregate time-sorted ticks into bars.
    ///
    /// Either every tick lands in a bar or the call fails and emits nothing.
    pub fn run(&self, ticks: &[Tick]) -> Result<Vec<Bar>> {
        self.run_with_stats(ticks).map(|(bars, _)| bars)
    }

    /// Aggregate ticks and report pass statistics.
    pub fn run_with_stats(&self, ticks: &[Tick]) -> Result<(Vec<Bar>, PassStats)> {
        info!(ticks = ticks.len(), mode = ?self.config.bars.mode, "starting bar pass");

        // Fail before deriving thresholds from bad input
        validate_ticks(ticks)?;
        if ticks.is_empty() {
            return Ok((Vec::new(), PassStats::default()));
        }

        let aggregator = BarAggregator::for_pass(&self.config, ticks)?;
        let mut stream = BarStream::with_aggregator(&self.config, aggregator)?;

        let mut bars = Vec::new();
        for tick in ticks {
            if let Some(bar) = stream.push(tick)? {
                bars.push(bar);
            }
        }
        let partial = stream.emitter.pending_count() > 0;
        bars.extend(stream.finish());
        bars.sort_by_key(|b| b.ts_ns);

        let mut stats = stream.stats();
        stats.last_bar_partial = partial;
        info!(
            ticks = stats.ticks,
            bars = stats.bars,
            partial,
            carried = stats.classification.carried_ticks,
            "bar pass complete"
        );
        Ok((bars, stats))
    }
}

/// Dollar bars with a fixed threshold, or per-day thresholds when `None`.
pub fn dollar_bars(ticks: &[Tick], threshold: Option<f64>, sign_seed: Option<Side>) -> Result<Vec<Bar>> {
    let mut config = match threshold {
        Some(threshold) => Config::dollar(threshold),
        None => Config::adaptive_dollar(),
    };
    config.sign.sign_seed = sign_seed;
    BarEngine::new(config)?.run(ticks)
}

/// Imbalance bars starting from an expected bar length in ticks.
pub fn imbalance_bars(
    ticks: &[Tick],
    starting_bar_length: f64,
    sign_seed: Option<Side>,
) -> Result<Vec<Bar>> {
    let mut config = Config::imbalance(starting_bar_length);
    config.sign.sign_seed = sign_seed;
    BarEngine::new(config)?.run(ticks)
}
