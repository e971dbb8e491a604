//! PyO3 bindings for infobar Rust components.
//!
//! Exposes the Rust implementations to Python:
//! - Tick-rule classification
//! - Dollar and imbalance bar sampling (batch and incremental)

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use infobar_core::{
    Bar as RustBar, BarMode, Config as RustConfig, Error as RustError, Side as RustSide,
    Tick as RustTick,
};
use infobar_ingestion::{sign_prices, SignClassifier};
use infobar_sampling::{dollar_bars, imbalance_bars, BarEngine, BarStream};

fn to_py_err(e: RustError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn side_from_sign(sign: Option<i8>) -> PyResult<Option<RustSide>> {
    sign.map(|s| {
        RustSide::from_sign(s)
            .ok_or_else(|| PyValueError::new_err(format!("sign_seed must be 1 or -1, got {s}")))
    })
    .transpose()
}

fn build_config(
    mode: &str,
    threshold: Option<f64>,
    starting_bar_length: f64,
    sign_seed: Option<i8>,
) -> PyResult<RustConfig> {
    let mut config = RustConfig::default();
    config.bars.mode = mode.parse::<BarMode>().map_err(to_py_err)?;
    config.bars.threshold = threshold;
    config.bars.starting_bar_length = starting_bar_length;
    config.sign.sign_seed = side_from_sign(sign_seed)?;
    Ok(config)
}

fn ticks_to_rust(ticks: Vec<Tick>) -> Vec<RustTick> {
    ticks.into_iter().map(|t| t.into()).collect()
}

fn bars_to_py(bars: Vec<RustBar>) -> Vec<Bar> {
    bars.into_iter().map(|b| b.into()).collect()
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// A single executed trade.
#[pyclass]
#[derive(Clone)]
pub struct Tick {
    #[pyo3(get, set)]
    pub ts_ns: i64,
    #[pyo3(get, set)]
    pub price: f64,
    #[pyo3(get, set)]
    pub size: f64,
}

#[pymethods]
impl Tick {
    #[new]
    fn new(ts_ns: i64, price: f64, size: f64) -> Self {
        Tick { ts_ns, price, size }
    }

    #[getter]
    fn dollars(&self) -> f64 {
        self.price * self.size
    }

    fn __repr__(&self) -> String {
        format!("Tick(ts_ns={}, price={}, size={})", self.ts_ns, self.price, self.size)
    }
}

impl From<Tick> for RustTick {
    fn from(t: Tick) -> Self {
        RustTick::new(t.ts_ns, t.price, t.size)
    }
}

/// An information-driven OHLCV bar.
#[pyclass]
#[derive(Clone)]
pub struct Bar {
    #[pyo3(get)]
    pub group_id: u64,
    #[pyo3(get)]
    pub ts_ns: i64,
    #[pyo3(get)]
    pub open: f64,
    #[pyo3(get)]
    pub high: f64,
    #[pyo3(get)]
    pub low: f64,
    #[pyo3(get)]
    pub close: f64,
    #[pyo3(get)]
    pub volume: f64,
    #[pyo3(get)]
    pub dollar_volume: f64,
    #[pyo3(get)]
    pub count: u64,
    #[pyo3(get)]
    pub price_std: Option<f64>,
    #[pyo3(get)]
    pub log_range: f64,
    #[pyo3(get)]
    pub volatility: Option<f64>,
}

#[pymethods]
impl Bar {
    #[getter]
    fn vwap(&self) -> Option<f64> {
        if self.volume > 0.0 {
            Some(self.dollar_volume / self.volume)
        } else {
            None
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Bar(group_id={}, ts_ns={}, o={}, h={}, l={}, c={}, v={}, n={})",
            self.group_id, self.ts_ns, self.open, self.high, self.low, self.close, self.volume,
            self.count
        )
    }
}

impl From<RustBar> for Bar {
    fn from(b: RustBar) -> Self {
        Bar {
            group_id: b.group_id,
            ts_ns: b.ts_ns,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
            dollar_volume: b.dollar_volume,
            count: b.count,
            price_std: b.price_std,
            log_range: b.log_range,
            volatility: b.volatility,
        }
    }
}

// ============================================================================
// Python-exposed Engine Classes
// ============================================================================

/// Tick-rule classifier.
#[pyclass]
pub struct PySignClassifier {
    inner: SignClassifier,
}

#[pymethods]
impl PySignClassifier {
    #[new]
    #[pyo3(signature = (sign_seed=None))]
    fn new(sign_seed: Option<i8>) -> PyResult<Self> {
        let inner = match side_from_sign(sign_seed)? {
            Some(seed) => SignClassifier::new(seed),
            None => SignClassifier::from_entropy(),
        };
        Ok(PySignClassifier { inner })
    }

    /// Classify a single tick; returns +1 or -1.
    fn classify(&mut self, tick: Tick) -> i8 {
        self.inner.classify(tick.into()).side.sign()
    }

    /// Classify a batch of ticks.
    fn classify_batch(&mut self, ticks: Vec<Tick>) -> Vec<i8> {
        self.inner
            .classify_batch(&ticks_to_rust(ticks))
            .iter()
            .map(|t| t.side.sign())
            .collect()
    }

    /// Get classification statistics (total, buys, sells, carried).
    fn stats(&self) -> (u64, u64, u64, u64) {
        let s = self.inner.stats();
        (s.total_ticks, s.buy_ticks, s.sell_ticks, s.carried_ticks)
    }

    /// Reset statistics.
    fn reset_stats(&mut self) {
        self.inner.reset_stats();
    }

    /// Clear all state.
    fn clear(&mut self) {
        self.inner.clear();
    }
}

/// Batch bar engine.
#[pyclass]
pub struct PyBarEngine {
    inner: BarEngine,
}

#[pymethods]
impl PyBarEngine {
    #[new]
    #[pyo3(signature = (mode="dollar", threshold=None, starting_bar_length=100.0, sign_seed=None))]
    fn new(
        mode: &str,
        threshold: Option<f64>,
        starting_bar_length: f64,
        sign_seed: Option<i8>,
    ) -> PyResult<Self> {
        let config = build_config(mode, threshold, starting_bar_length, sign_seed)?;
        Ok(PyBarEngine {
            inner: BarEngine::new(config).map_err(to_py_err)?,
        })
    }

    /// Build an engine from a JSON configuration document.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = RustConfig::from_json_str(json).map_err(to_py_err)?;
        Ok(PyBarEngine {
            inner: BarEngine::new(config).map_err(to_py_err)?,
        })
    }

    /// Aggregate time-sorted ticks into bars.
    fn run(&self, ticks: Vec<Tick>) -> PyResult<Vec<Bar>> {
        self.inner
            .run(&ticks_to_rust(ticks))
            .map(bars_to_py)
            .map_err(to_py_err)
    }

    /// Dollar bars; `threshold=None` derives one per day from daily volume.
    #[staticmethod]
    #[pyo3(signature = (ticks, threshold=None, sign_seed=None))]
    fn dollar_bars(ticks: Vec<Tick>, threshold: Option<f64>, sign_seed: Option<i8>) -> PyResult<Vec<Bar>> {
        dollar_bars(&ticks_to_rust(ticks), threshold, side_from_sign(sign_seed)?)
            .map(bars_to_py)
            .map_err(to_py_err)
    }

    /// Imbalance bars from a starting expected bar length.
    #[staticmethod]
    #[pyo3(signature = (ticks, starting_bar_length, sign_seed=None))]
    fn imbalance_bars(
        ticks: Vec<Tick>,
        starting_bar_length: f64,
        sign_seed: Option<i8>,
    ) -> PyResult<Vec<Bar>> {
        imbalance_bars(&ticks_to_rust(ticks), starting_bar_length, side_from_sign(sign_seed)?)
            .map(bars_to_py)
            .map_err(to_py_err)
    }

    /// Configuration as JSON.
    fn config_json(&self) -> PyResult<String> {
        serde_json::to_string(self.inner.config())
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }
}

/// Incremental bar builder for unbounded tick sources.
#[pyclass]
pub struct PyBarStream {
    inner: BarStream,
}

#[pymethods]
impl PyBarStream {
    #[new]
    #[pyo3(signature = (mode="dollar", threshold=None, starting_bar_length=100.0, sign_seed=None))]
    fn new(
        mode: &str,
        threshold: Option<f64>,
        starting_bar_length: f64,
        sign_seed: Option<i8>,
    ) -> PyResult<Self> {
        let config = build_config(mode, threshold, starting_bar_length, sign_seed)?;
        Ok(PyBarStream {
            inner: BarStream::new(&config).map_err(to_py_err)?,
        })
    }

    /// Push one tick; returns the bar it closed, if any.
    fn push(&mut self, tick: Tick) -> PyResult<Option<Bar>> {
        self.inner
            .push(&tick.into())
            .map(|bar| bar.map(Bar::from))
            .map_err(to_py_err)
    }

    /// Flush the trailing partial bar.
    fn finish(&mut self) -> Vec<Bar> {
        bars_to_py(self.inner.finish())
    }

    /// Pass statistics as (ticks, bars, last_bar_partial).
    fn stats(&self) -> (u64, u64, bool) {
        let s = self.inner.stats();
        (s.ticks, s.bars, s.last_bar_partial)
    }
}

/// Tick-rule signs (+1 / -1) for a price sequence.
#[pyfunction]
#[pyo3(signature = (prices, sign_seed=None))]
fn sign_ticks(prices: Vec<f64>, sign_seed: Option<i8>) -> PyResult<Vec<i8>> {
    let seed = match side_from_sign(sign_seed)? {
        Some(seed) => seed,
        None => SignClassifier::from_entropy().seed(),
    };
    Ok(sign_prices(&prices, seed).into_iter().map(RustSide::sign).collect())
}

// ============================================================================
// Module Definition
// ============================================================================

/// Information-driven bar sampling for tick data.
#[pymodule]
fn infobar(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<Tick>()?;
    m.add_class::<Bar>()?;

    // Engine classes
    m.add_class::<PySignClassifier>()?;
    m.add_class::<PyBarEngine>()?;
    m.add_class::<PyBarStream>()?;

    // Functions
    m.add_function(wrap_pyfunction!(sign_ticks, m)?)?;

    Ok(())
}
