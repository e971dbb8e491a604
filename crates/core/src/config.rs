//! Configuration structures for the infobar system.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{BarMode, Side};

/// Main configuration for a bar-sampling pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bar boundary configuration.
    pub bars: BarConfig,
    /// Tick-rule configuration.
    pub sign: SignConfig,
    /// Expected-flow estimator configuration.
    pub flow: FlowConfig,
    /// Daily dollar-volume estimator configuration.
    pub daily_volume: DailyVolumeConfig,
    /// Bar emission configuration.
    pub emitter: EmitterConfig,
}

impl Config {
    /// Parse a JSON document. Missing sections fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Dollar-bar config with a fixed threshold.
    pub fn dollar(threshold: f64) -> Self {
        let mut config = Self::default();
        config.bars.mode = BarMode::Dollar;
        config.bars.threshold = Some(threshold);
        config
    }

    /// Dollar-bar config with the threshold derived from daily volume.
    pub fn adaptive_dollar() -> Self {
        let mut config = Self::default();
        config.bars.mode = BarMode::Dollar;
        config.bars.threshold = None;
        config
    }

    /// Imbalance-bar config with the given starting bar length.
    pub fn imbalance(starting_bar_length: f64) -> Self {
        let mut config = Self::default();
        config.bars.mode = BarMode::Imbalance;
        config.bars.starting_bar_length = starting_bar_length;
        config
    }

    /// Fix the first tick's direction.
    pub fn with_sign_seed(mut self, seed: Side) -> Self {
        self.sign.sign_seed = Some(seed);
        self
    }

    /// Check every tunable for a usable value.
    pub fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.bars.threshold {
            Error::check_threshold(threshold)?;
        }
        if !(self.bars.starting_bar_length.is_finite() && self.bars.starting_bar_length > 0.0) {
            return Err(Error::config(format!(
                "starting_bar_length must be > 0, got {}",
                self.bars.starting_bar_length
            )));
        }
        if self.bars.min_ticks_per_bar == 0 {
            return Err(Error::config("min_ticks_per_bar must be >= 1"));
        }
        if !(0.0..1.0).contains(&self.bars.bar_length_memory) {
            return Err(Error::config(format!(
                "bar_length_memory must be in [0, 1), got {}",
                self.bars.bar_length_memory
            )));
        }
        check_span("flow.sign_span", self.flow.sign_span)?;
        check_span("flow.flow_span", self.flow.flow_span)?;
        check_span("daily_volume.span", self.daily_volume.span)?;
        check_span("emitter.volatility_span", self.emitter.volatility_span)?;
        if !(self.flow.volatility_decay > 0.0 && self.flow.volatility_decay <= 1.0) {
            return Err(Error::config(format!(
                "flow.volatility_decay must be in (0, 1], got {}",
                self.flow.volatility_decay
            )));
        }
        if !(self.flow.volatility_slack.is_finite() && self.flow.volatility_slack >= 0.0) {
            return Err(Error::config("flow.volatility_slack must be >= 0"));
        }
        if !(self.daily_volume.bars_per_day.is_finite() && self.daily_volume.bars_per_day > 0.0) {
            return Err(Error::config("daily_volume.bars_per_day must be > 0"));
        }
        Ok(())
    }
}

fn check_span(name: &str, span: f64) -> Result<()> {
    // span >= 1 keeps alpha = 2 / (span + 1) inside (0, 1]
    if span.is_finite() && span >= 1.0 {
        Ok(())
    } else {
        Err(Error::config(format!("{name} must be >= 1, got {span}")))
    }
}

/// Bar boundary configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BarConfig {
    /// Sampling rule.
    pub mode: BarMode,
    /// Fixed dollar threshold; `None` derives one per day from daily volume.
    pub threshold: Option<f64>,
    /// Initial expected ticks per imbalance bar.
    pub starting_bar_length: f64,
    /// An imbalance bar needs at least this many ticks before it may close.
    pub min_ticks_per_bar: u64,
    /// Weight kept on the previous bar length when an imbalance bar closes.
    pub bar_length_memory: f64,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            mode: BarMode::Dollar,
            threshold: None,
            starting_bar_length: 100.0,
            min_ticks_per_bar: 3,
            bar_length_memory: 0.1,
        }
    }
}

/// Tick-rule configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignConfig {
    /// Direction of the very first tick. `None` draws one at random per pass.
    pub sign_seed: Option<Side>,
}

/// Expected-flow estimator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// EWMA span (ticks) for buy/sell probabilities.
    pub sign_span: f64,
    /// EWMA span (ticks) for per-side expected log-dollars.
    pub flow_span: f64,
    /// EWMA decay for the signed-flow volatility.
    pub volatility_decay: f64,
    /// Multiplier on the flow volatility added to the imbalance envelope.
    pub volatility_slack: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            sign_span: 1000.0,
            flow_span: 500.0,
            volatility_decay: 0.01,
            volatility_slack: 0.1,
        }
    }
}

/// Daily dollar-volume estimator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyVolumeConfig {
    /// EWMA span (days) over daily dollar volume.
    pub span: f64,
    /// Target number of dollar bars per day; threshold = smoothed volume / this.
    pub bars_per_day: f64,
}

impl Default for DailyVolumeConfig {
    fn default() -> Self {
        Self {
            span: 4.0,
            bars_per_day: 1000.0,
        }
    }
}

/// Bar emission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// EWMA span (bars) for bar-level volatility.
    pub volatility_span: f64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            volatility_span: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bars.mode, BarMode::Dollar);
        assert_eq!(config.flow.sign_span, 1000.0);
        assert_eq!(config.flow.flow_span, 500.0);
        assert_eq!(config.flow.volatility_decay, 0.01);
        assert_eq!(config.daily_volume.span, 4.0);
        assert_eq!(config.emitter.volatility_span, 10.0);
        assert!(config.sign.sign_seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json_str(
            r#"{"bars": {"mode": "imbalance", "starting_bar_length": 5.0}, "sign": {"sign_seed": "sell"}}"#,
        )
        .unwrap();
        assert_eq!(config.bars.mode, BarMode::Imbalance);
        assert_eq!(config.bars.starting_bar_length, 5.0);
        assert_eq!(config.bars.min_ticks_per_bar, 3);
        assert_eq!(config.sign.sign_seed, Some(Side::Sell));
        assert_eq!(config.flow.flow_span, 500.0);
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let err = Config::from_json_str(r#"{"bars": {"threshold": 0.0}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidThreshold { .. }));
        assert!(Config::dollar(-5.0).validate().is_err());
    }

    #[test]
    fn test_rejects_bad_tuning() {
        let mut config = Config::imbalance(5.0);
        config.flow.volatility_decay = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::imbalance(0.0);
        assert!(config.validate().is_err());
        config.bars.starting_bar_length = 5.0;
        config.flow.sign_span = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Config::from_json_str("{not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_json_file("/nonexistent/infobar.json"),
            Err(Error::Io(_))
        ));
    }
}
