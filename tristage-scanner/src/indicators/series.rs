//! Per-bar derived fields for a price series.
//!
//! - True range: `max(high - low, |high - prev_close|, |low - prev_close|)`
//! - ATR: exponential smoothing of true range. With [`AtrSmoothing::SingleBar`]
//!   the newest value gets weight 1, so ATR equals the bar's own true range.
//!   [`AtrSmoothing::Wilder`] is the traditional average with weight
//!   `1 / period`.
//! - SMA: mean close over a trailing window
//! - EMA: `EMA[0] = close[0]`, `EMA[i] = a * close[i] + (1 - a) * EMA[i-1]`

use serde::Serialize;
use tristage_common::config::{AtrSmoothing, EmaSmoothing, ScannerConfig};

use crate::data::{DailySeries, PriceBar};

/// Anything with high, low and close prices.
pub trait Ohlc {
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
}

impl Ohlc for PriceBar {
    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }
}

/// Window lengths and smoothing modes for the preprocessing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    pub sma_window: usize,
    pub ema_span: usize,
    pub ema_smoothing: EmaSmoothing,
    pub atr_smoothing: AtrSmoothing,
    pub atr_period: usize,
}

impl IndicatorParams {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            sma_window: config.sma_window,
            ema_span: config.ema_span,
            ema_smoothing: config.ema_smoothing,
            atr_smoothing: config.atr_smoothing,
            atr_period: config.atr_period,
        }
    }
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self::from_config(&ScannerConfig::default())
    }
}

// ============================================================================
// Indicator Functions
// ============================================================================

/// True range per bar. The first bar has no previous close and is `None`.
pub fn true_range<B: Ohlc>(bars: &[B]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            out.push(None);
            continue;
        }
        let prev_close = bars[i - 1].close();
        let range = (bar.high() - bar.low())
            .max((bar.high() - prev_close).abs())
            .max((bar.low() - prev_close).abs());
        out.push(Some(range));
    }
    out
}

/// Exponentially smoothed true range.
///
/// The first defined true range seeds the average; an undefined input keeps
/// the previous average.
pub fn average_true_range(
    true_ranges: &[Option<f64>],
    smoothing: AtrSmoothing,
    period: usize,
) -> Vec<Option<f64>> {
    let alpha = match smoothing {
        AtrSmoothing::SingleBar => 1.0,
        AtrSmoothing::Wilder => 1.0 / period.max(1) as f64,
    };

    let mut prev: Option<f64> = None;
    true_ranges
        .iter()
        .map(|tr| {
            prev = match (*tr, prev) {
                (Some(tr), Some(p)) => Some(alpha * tr + (1.0 - alpha) * p),
                (Some(tr), None) => Some(tr),
                (None, p) => p,
            };
            prev
        })
        .collect()
}

/// Simple moving average; `None` until `window` values exist.
///
/// Each window is averaged on its own, relative to its first value, so a
/// run of identical closes yields exactly that close.
pub fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    let mut out = vec![None; (window - 1).min(values.len())];
    out.extend(values.windows(window).map(|w| {
        let base = w[0];
        let offset: f64 = w.iter().map(|v| v - base).sum();
        Some(base + offset / window as f64)
    }));
    out
}

/// Exponential moving average seeded with the first value.
pub fn ema(values: &[f64], span: usize, smoothing: EmaSmoothing) -> Vec<f64> {
    let span = span.max(1) as f64;
    let alpha = match smoothing {
        EmaSmoothing::Span => 2.0 / (span + 1.0),
        EmaSmoothing::Wilder => 1.0 / span,
    };

    let mut out: Vec<f64> = Vec::with_capacity(values.len());
    for &v in values {
        let next = match out.last() {
            Some(&prev) => alpha * v + (1.0 - alpha) * prev,
            None => v,
        };
        out.push(next);
    }
    out
}

// ============================================================================
// Prepared Series
// ============================================================================

/// A daily series with its derived per-bar fields.
///
/// All vectors are index-aligned with `bars`.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedSeries {
    pub bars: Vec<PriceBar>,
    pub true_range: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
    pub sma: Vec<Option<f64>>,
    pub ema: Vec<f64>,
}

/// Compute true range, ATR, SMA and EMA for every bar.
pub fn preprocess(series: &DailySeries, params: &IndicatorParams) -> PreparedSeries {
    let closes = series.closes();
    let tr = true_range(series.bars());
    let atr = average_true_range(&tr, params.atr_smoothing, params.atr_period);

    PreparedSeries {
        bars: series.bars().to_vec(),
        sma: sma(&closes, params.sma_window),
        ema: ema(&closes, params.ema_span, params.ema_smoothing),
        true_range: tr,
        atr,
    }
}
