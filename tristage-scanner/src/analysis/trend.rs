//! Long-term trend and pullback measurement.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::PriceBar;

/// Long-term trend direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
}

impl TrendDirection {
    /// Trade side implied by the trend.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Up => "LONG",
            Self::Down => "SHORT",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "Up"),
            Self::Down => write!(f, "Down"),
        }
    }
}

/// Trend classification with the retracement from the recent extreme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    pub direction: TrendDirection,
    pub current_close: f64,
    /// Close used as the long-term anchor
    pub anchor_close: f64,
    /// Highest high (uptrend) or lowest low (downtrend) in the short window
    pub extreme: f64,
    /// `(current / extreme - 1) * 100`; negative for an uptrend pullback,
    /// positive for a downtrend bounce
    pub move_pct: f64,
}

impl TrendReading {
    /// Whether the move is a pullback/bounce of at least `threshold_pct`
    /// against the trend.
    pub fn is_pullback(&self, threshold_pct: f64) -> bool {
        match self.direction {
            TrendDirection::Up => self.move_pct <= -threshold_pct,
            TrendDirection::Down => self.move_pct >= threshold_pct,
        }
    }
}

/// Classify the trend and measure the move from the recent extreme.
///
/// The anchor is the close `lag` bars back (counting the newest bar as 1),
/// or the first bar when the series is shorter. The extreme is taken over
/// the last `window` bars. Returns `None` for an empty slice or a
/// non-positive extreme.
pub fn analyze(bars: &[PriceBar], lag: usize, window: usize) -> Option<TrendReading> {
    let current = bars.last()?;
    let len = bars.len();

    let anchor = if lag > 0 && len >= lag {
        &bars[len - lag]
    } else {
        &bars[0]
    };

    let direction = if current.close > anchor.close {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    let recent = &bars[len.saturating_sub(window.max(1))..];
    let extreme = match direction {
        TrendDirection::Up => recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        TrendDirection::Down => recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
    };

    if !extreme.is_finite() || extreme <= 0.0 {
        return None;
    }

    Some(TrendReading {
        direction,
        current_close: current.close,
        anchor_close: anchor.close,
        extreme,
        move_pct: (current.close / extreme - 1.0) * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::bars_from_closes;

    #[test]
    fn test_uptrend_pullback() {
        // 600 bars: close 60 at the anchor, a 100 high inside the last 126 bars,
        // and a current close of 80.
        let mut closes = vec![60.0; 600];
        closes[550] = 99.0; // high = 100
        closes[599] = 80.0;
        let mut bars = bars_from_closes(&closes);
        for bar in bars.iter_mut() {
            bar.high = bar.close;
            bar.low = bar.close;
        }
        bars[550].high = 100.0;

        let reading = analyze(&bars, 500, 126).unwrap();
        assert_eq!(reading.direction, TrendDirection::Up);
        assert!((reading.anchor_close - 60.0).abs() < 1e-9);
        assert!((reading.extreme - 100.0).abs() < 1e-9);
        assert!((reading.move_pct - (-20.0)).abs() < 1e-9);
        assert!(reading.is_pullback(15.0));
    }

    #[test]
    fn test_downtrend_bounce_is_positive() {
        let mut closes = vec![100.0; 300];
        closes[250] = 50.0;
        closes[299] = 60.0;
        let mut bars = bars_from_closes(&closes);
        for bar in bars.iter_mut() {
            bar.high = bar.close;
            bar.low = bar.close;
        }

        let reading = analyze(&bars, 500, 126).unwrap();
        assert_eq!(reading.direction, TrendDirection::Down);
        // short series: anchor falls back to the first bar
        assert!((reading.anchor_close - 100.0).abs() < 1e-9);
        assert!((reading.move_pct - 20.0).abs() < 1e-9);
        assert!(reading.is_pullback(15.0));
        assert!(!reading.is_pullback(25.0));
    }

    #[test]
    fn test_flat_series_is_down() {
        let bars = bars_from_closes(&[50.0; 10]);
        assert_eq!(analyze(&bars, 5, 5).unwrap().direction, TrendDirection::Down);
    }

    #[test]
    fn test_uptrend_without_pullback_fails_filter() {
        let closes: Vec<f64> = (1..=200).map(|c| c as f64).collect();
        let reading = analyze(&bars_from_closes(&closes), 500, 126).unwrap();
        assert_eq!(reading.direction, TrendDirection::Up);
        assert!(!reading.is_pullback(15.0));
    }

    #[test]
    fn test_non_positive_extreme_is_undefined() {
        let mut bars = bars_from_closes(&[5.0, 4.0, 3.0]);
        bars[1].low = 0.0;
        assert!(analyze(&bars, 500, 126).is_none());
        assert!(analyze(&[], 500, 126).is_none());
    }
}
