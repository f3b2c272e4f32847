//! Calendar-week resampling.
//!
//! Daily bars are grouped into Monday..Sunday weeks. The newest week is kept
//! even when it holds fewer than five sessions, since it represents the week
//! so far.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::series::{average_true_range, true_range, IndicatorParams, Ohlc};
use super::VolatilitySnapshot;
use crate::data::PriceBar;

/// One calendar week of trading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBar {
    /// Sunday closing the calendar week
    pub week_end: NaiveDate,
    /// Date of the last session in the week
    pub last_session: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Number of daily bars merged into this week
    pub sessions: u32,
}

impl WeeklyBar {
    fn open_with(bar: &PriceBar) -> Self {
        Self {
            week_end: week_end(bar.timestamp),
            last_session: bar.timestamp,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            sessions: 1,
        }
    }

    fn merge(&mut self, bar: &PriceBar) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.volume = self.volume.saturating_add(bar.volume);
        self.last_session = bar.timestamp;
        self.sessions += 1;
    }
}

impl Ohlc for WeeklyBar {
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

/// Sunday ending the Monday-based week containing `date`.
fn week_end(date: NaiveDate) -> NaiveDate {
    let days_to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
    date + Duration::days(days_to_sunday)
}

/// Resample ascending daily bars into weekly bars.
///
/// Weeks without sessions produce no bar.
pub fn aggregate_weekly(bars: &[PriceBar]) -> Vec<WeeklyBar> {
    let mut weeks: Vec<WeeklyBar> = Vec::with_capacity(bars.len() / 5 + 1);

    for bar in bars {
        match weeks.last_mut() {
            Some(week) if week.week_end == week_end(bar.timestamp) => week.merge(bar),
            _ => weeks.push(WeeklyBar::open_with(bar)),
        }
    }

    weeks
}

/// Weekly bars with true range and ATR attached.
pub fn weekly_snapshots(bars: &[PriceBar], params: &IndicatorParams) -> Vec<VolatilitySnapshot> {
    let weeks = aggregate_weekly(bars);
    let tr = true_range(&weeks);
    let atr = average_true_range(&tr, params.atr_smoothing, params.atr_period);

    weeks
        .iter()
        .zip(tr)
        .zip(atr)
        .map(|((week, true_range), atr)| VolatilitySnapshot {
            period_end: week.week_end,
            true_range,
            atr,
            volume: week.volume,
        })
        .collect()
}
