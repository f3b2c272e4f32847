//! Market data module.
//!
//! Defines the daily price series consumed by the evaluation pipeline and the
//! retrieval collaborators that produce it.
//!
//! # Data Sources
//! - **Yahoo** (default): chart API over HTTP, daily bars
//! - **Snapshot**: frozen JSON files on disk, one per symbol
//!
//! Any source can be wrapped in [`CachedProvider`] for TTL caching with at
//! most one fetch in flight per symbol.

mod cache;
mod provider;
mod rate_limiter;
mod snapshot;
mod yahoo;

pub use cache::CachedProvider;
pub use provider::{DataProvider, ProviderError};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};
pub use snapshot::SnapshotProvider;
pub use yahoo::YahooProvider;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use thiserror::Error;

// ============================================================================
// Core Data Types
// ============================================================================

/// One daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Trading date
    pub timestamp: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Create a new bar.
    pub fn new(
        timestamp: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Whether every price field is a finite number.
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
    }
}

/// Reasons a bar sequence cannot form a [`DailySeries`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series is empty")]
    Empty,

    #[error("timestamps not strictly increasing at index {index} ({date})")]
    NotIncreasing { index: usize, date: NaiveDate },

    #[error("non-finite price at index {index} ({date})")]
    NonFinite { index: usize, date: NaiveDate },
}

/// Ordered daily bars for one symbol.
///
/// Timestamps are strictly increasing and every price is finite. The series
/// is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl DailySeries {
    /// Build a series, checking ordering and price sanity.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }

        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_finite() {
                return Err(SeriesError::NonFinite {
                    index,
                    date: bar.timestamp,
                });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(SeriesError::NotIncreasing {
                    index,
                    date: bar.timestamp,
                });
            }
        }

        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    /// Build a series from bars in arbitrary order.
    ///
    /// Bars are sorted by date; for duplicate dates the last occurrence wins.
    pub fn from_unsorted(
        symbol: impl Into<String>,
        mut bars: Vec<PriceBar>,
    ) -> Result<Self, SeriesError> {
        bars.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self::new(symbol, deduped)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    /// Most recent bar.
    pub fn last(&self) -> &PriceBar {
        // Non-empty by construction.
        &self.bars[self.bars.len() - 1]
    }

    /// Closing prices in series order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

impl Deref for DailySeries {
    type Target = [PriceBar];

    fn deref(&self) -> &Self::Target {
        &self.bars
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_series_accepts_increasing_dates() {
        let bars = test_support::bars_from_closes(&[10.0, 11.0, 12.0]);
        let series = DailySeries::new("AAPL", bars).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.symbol(), "AAPL");
        assert!((series.last().close - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_series_rejects_empty() {
        assert_eq!(DailySeries::new("X", vec![]), Err(SeriesError::Empty));
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let d = date(2024, 3, 4);
        let bars = vec![
            PriceBar::new(d, 1.0, 1.0, 1.0, 1.0, 1),
            PriceBar::new(d, 2.0, 2.0, 2.0, 2.0, 1),
        ];
        assert!(matches!(
            DailySeries::new("X", bars),
            Err(SeriesError::NotIncreasing { index: 1, .. })
        ));
    }

    #[test]
    fn test_series_rejects_nan() {
        let bars = vec![PriceBar::new(date(2024, 3, 4), 1.0, f64::NAN, 1.0, 1.0, 1)];
        assert!(matches!(
            DailySeries::new("X", bars),
            Err(SeriesError::NonFinite { index: 0, .. })
        ));
    }

    #[test]
    fn test_from_unsorted_sorts_and_dedupes() {
        let bars = vec![
            PriceBar::new(date(2024, 3, 6), 3.0, 3.0, 3.0, 3.0, 1),
            PriceBar::new(date(2024, 3, 4), 1.0, 1.0, 1.0, 1.0, 1),
            PriceBar::new(date(2024, 3, 6), 4.0, 4.0, 4.0, 4.0, 1),
        ];
        let series = DailySeries::from_unsorted("X", bars).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].timestamp, date(2024, 3, 4));
        assert!((series[1].close - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_price_bar_serde() {
        let json = r#"{"timestamp":"2024-03-04","open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":100}"#;
        let bar: PriceBar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.timestamp, date(2024, 3, 4));
        assert_eq!(bar.volume, 100);
    }
}
