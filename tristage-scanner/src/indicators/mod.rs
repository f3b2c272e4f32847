//! Technical indicator computations.
//!
//! Pure functions over price bars with no I/O. Values that are not yet
//! defined (the first bar's true range, a moving average before its window
//! fills) are `None`, never zero.
//!
//! # Modules
//! - `series`: true range, ATR, SMA and EMA over daily bars
//! - `weekly`: calendar-week resampling and weekly volatility snapshots

mod series;
mod weekly;

pub use series::{
    average_true_range, ema, preprocess, sma, true_range, IndicatorParams, Ohlc, PreparedSeries,
};
pub use weekly::{aggregate_weekly, weekly_snapshots, WeeklyBar};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Volatility and volume of one period (a day or a week).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilitySnapshot {
    /// Last calendar date covered by the period
    pub period_end: NaiveDate,
    /// True range of the period, undefined for the first period
    pub true_range: Option<f64>,
    /// Average true range at the end of the period
    pub atr: Option<f64>,
    /// Total traded volume of the period
    pub volume: u64,
}
