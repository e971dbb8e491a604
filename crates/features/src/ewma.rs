//! Exponentially weighted running mean and standard deviation.
//!
//! `mean_t = alpha * x_t + (1 - alpha) * mean_{t-1}`, seeded by the first
//! observation. The second moment uses the same recursion, and the variance is
//! `E[x^2] - E[x]^2` clamped at zero.

use infobar_core::{Error, Result};

/// Running EWMA over a scalar stream.
#[derive(Debug, Clone)]
pub struct EwmaEstimator {
    /// Weight of the newest observation.
    alpha: f64,
    /// Smoothed mean (None before the first observation).
    mean: Option<f64>,
    /// Smoothed second moment.
    second_moment: f64,
    /// Number of observations.
    count: u64,
}

impl EwmaEstimator {
    /// Create from a span `N`, using `alpha = 2 / (N + 1)`.
    pub fn with_span(span: f64) -> Result<Self> {
        if !(span.is_finite() && span >= 1.0) {
            return Err(Error::config(format!("EWMA span must be >= 1, got {span}")));
        }
        Self::with_alpha(2.0 / (span + 1.0))
    }

    /// Create from a decay factor `alpha` in (0, 1].
    pub fn with_alpha(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::config(format!(
                "EWMA alpha must be in (0, 1], got {alpha}"
            )));
        }
        Ok(Self {
            alpha,
            mean: None,
            second_moment: 0.0,
            count: 0,
        })
    }

    /// Add an observation and return the current mean.
    pub fn update(&mut self, x: f64) -> f64 {
        let mean = match self.mean {
            None => {
                self.second_moment = x * x;
                x
            }
            Some(prev) => {
                self.second_moment = self.alpha * x * x + (1.0 - self.alpha) * self.second_moment;
                self.alpha * x + (1.0 - self.alpha) * prev
            }
        };
        self.mean = Some(mean);
        self.count += 1;
        mean
    }

    /// Current mean, if any observation has been seen.
    #[inline]
    pub fn mean(&self) -> Option<f64> {
        self.mean
    }

    /// Smoothed variance. Needs at least two observations.
    pub fn variance(&self) -> Result<f64> {
        match self.mean {
            Some(mean) if self.count >= 2 => {
                // Rounding can push E[x^2] - E[x]^2 slightly below zero
                Ok((self.second_moment - mean * mean).max(0.0))
            }
            _ => Err(Error::insufficient_data(format!(
                "EWMA std needs at least 2 observations, have {}",
                self.count
            ))),
        }
    }

    /// Smoothed standard deviation. Needs at least two observations.
    pub fn std(&self) -> Result<f64> {
        self.variance().map(f64::sqrt)
    }

    /// Decay factor.
    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Get the number of observations.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Clear all data.
    pub fn clear(&mut self) {
        self.mean = None;
        self.second_moment = 0.0;
        self.count = 0;
    }
}
