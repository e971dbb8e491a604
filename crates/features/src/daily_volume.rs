//! Daily dollar-volume estimate for adaptive dollar-bar thresholds.
//!
//! Each day's threshold comes from the EWMA of *previous* days' dollar volume,
//! so a day never sizes its bars from its own traffic. The first day has no
//! history and borrows the first smoothed value (its own volume).

use chrono::NaiveDate;
use infobar_core::{config::DailyVolumeConfig, Error, Result, Tick};
use infobar_ingestion::split_by_day;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::ewma::EwmaEstimator;

/// Per-day volume and the dollar threshold derived for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyVolume {
    /// Calendar day.
    pub day: NaiveDate,
    /// Sum of price * size over the day.
    pub dollar_volume: f64,
    /// Lagged EWMA of daily dollar volume used for this day.
    pub smoothed: f64,
    /// Dollar-bar threshold for this day.
    pub threshold: f64,
}

/// Estimator of lagged, smoothed daily dollar volume.
#[derive(Debug, Clone)]
pub struct DailyVolumeEstimator {
    /// EWMA span in days.
    span: f64,
    /// Divisor turning daily volume into a per-bar threshold.
    bars_per_day: f64,
}

impl DailyVolumeEstimator {
    /// Create a new estimator from configuration.
    pub fn new(config: &DailyVolumeConfig) -> Result<Self> {
        if !(config.bars_per_day.is_finite() && config.bars_per_day > 0.0) {
            return Err(Error::config(format!(
                "bars_per_day must be > 0, got {}",
                config.bars_per_day
            )));
        }
        // Validates the span
        EwmaEstimator::with_span(config.span)?;
        Ok(Self {
            span: config.span,
            bars_per_day: config.bars_per_day,
        })
    }

    /// Compute per-day volumes and thresholds for time-sorted ticks.
    pub fn estimate(&self, ticks: &[Tick]) -> Result<Vec<DailyVolume>> {
        let days = split_by_day(ticks);
        let mut ewma = EwmaEstimator::with_span(self.span)?;
        let mut out: Vec<DailyVolume> = Vec::with_capacity(days.len());

        // Smoothed value available before each day (lagged by one day)
        let mut prior: Option<f64> = None;

        for (day, day_ticks) in days {
            let dollar_volume: f64 = day_ticks.iter().map(Tick::dollars).sum();
            let smoothed_today = ewma.update(dollar_volume);
            let smoothed = prior.unwrap_or(smoothed_today);
            prior = Some(smoothed_today);

            let threshold = smoothed / self.bars_per_day;
            debug!(%day, dollar_volume, smoothed, threshold, "daily dollar threshold");
            Error::check_threshold(threshold)?;

            out.push(DailyVolume {
                day,
                dollar_volume,
                smoothed,
                threshold,
            });
        }

        Ok(out)
    }

    /// Dollar-bar threshold per calendar day.
    pub fn thresholds(&self, ticks: &[Tick]) -> Result<BTreeMap<NaiveDate, f64>> {
        Ok(self
            .estimate(ticks)?
            .into_iter()
            .map(|d| (d.day, d.threshold))
            .collect())
    }
}
