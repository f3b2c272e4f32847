//! Short-term momentum confirmation.
//!
//! A bar confirms an uptrend when its close and EMA both sit above the SMA,
//! and a downtrend when both sit below. The momentum streak counts
//! consecutive bars, newest first, whose EMA sits on the trend side of the
//! SMA; the count stops at the first bar that breaks the relationship.

use serde::{Deserialize, Serialize};

use super::trend::TrendDirection;
use crate::indicators::PreparedSeries;

/// Momentum state of the newest bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumReading {
    pub confirmed: bool,
    /// Consecutive confirming bars ending at the newest bar
    pub streak: usize,
    pub close: f64,
    pub sma: Option<f64>,
    pub ema: f64,
}

/// Relative gap under which two prices count as equal.
const PRICE_TOLERANCE: f64 = 1e-9;

fn above(value: f64, reference: f64) -> bool {
    value - reference > PRICE_TOLERANCE * reference.abs()
}

fn below(value: f64, reference: f64) -> bool {
    reference - value > PRICE_TOLERANCE * reference.abs()
}

/// Whether a bar's close and averages confirm `direction`.
///
/// An undefined SMA never confirms, and neither does a close or EMA sitting
/// on the SMA.
pub fn is_confirmed(direction: TrendDirection, close: f64, sma: Option<f64>, ema: f64) -> bool {
    let Some(sma) = sma else {
        return false;
    };
    match direction {
        TrendDirection::Up => above(close, sma) && above(ema, sma),
        TrendDirection::Down => below(close, sma) && below(ema, sma),
    }
}

fn ema_on_trend_side(direction: TrendDirection, sma: Option<f64>, ema: f64) -> bool {
    match (direction, sma) {
        (TrendDirection::Up, Some(sma)) => above(ema, sma),
        (TrendDirection::Down, Some(sma)) => below(ema, sma),
        (_, None) => false,
    }
}

/// Count consecutive trend-side EMA bars among the newest `lookback` bars.
pub fn momentum_streak(
    sma: &[Option<f64>],
    ema: &[f64],
    direction: TrendDirection,
    lookback: usize,
) -> usize {
    sma.iter()
        .zip(ema)
        .rev()
        .take(lookback)
        .take_while(|(s, e)| ema_on_trend_side(direction, **s, **e))
        .count()
}

/// Evaluate the newest bar of a prepared series.
pub fn confirm(
    prepared: &PreparedSeries,
    direction: TrendDirection,
    lookback: usize,
) -> Option<MomentumReading> {
    let last = prepared.bars.last()?;
    let sma = *prepared.sma.last()?;
    let ema = *prepared.ema.last()?;

    Some(MomentumReading {
        confirmed: is_confirmed(direction, last.close, sma, ema),
        streak: momentum_streak(&prepared.sma, &prepared.ema, direction, lookback),
        close: last.close,
        sma,
        ema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{test_support::bars_from_closes, DailySeries};
    use crate::indicators::{preprocess, IndicatorParams};

    #[test]
    fn test_confirmation_rules() {
        assert!(is_confirmed(TrendDirection::Up, 11.0, Some(10.0), 10.5));
        assert!(!is_confirmed(TrendDirection::Up, 11.0, Some(10.0), 9.5));
        assert!(!is_confirmed(TrendDirection::Up, 9.0, Some(10.0), 10.5));
        assert!(is_confirmed(TrendDirection::Down, 9.0, Some(10.0), 9.5));
        assert!(!is_confirmed(TrendDirection::Down, 11.0, Some(10.0), 9.5));
        assert!(!is_confirmed(TrendDirection::Up, 11.0, None, 10.5));
    }

    #[test]
    fn test_streak_stops_at_first_break() {
        // Oldest to newest: 7 confirming, 1 break, 4 confirming.
        let sma = vec![Some(10.0); 12];
        let mut ema = vec![11.0; 12];
        ema[7] = 9.0;

        assert_eq!(momentum_streak(&sma, &ema, TrendDirection::Up, 12), 4);
    }

    #[test]
    fn test_streak_capped_by_lookback() {
        let sma = vec![Some(10.0); 20];
        let ema = vec![9.0; 20];
        assert_eq!(momentum_streak(&sma, &ema, TrendDirection::Down, 12), 12);
    }

    #[test]
    fn test_streak_zero_when_newest_breaks() {
        let sma = vec![Some(10.0); 5];
        let ema = vec![11.0, 11.0, 11.0, 11.0, 10.0];
        assert_eq!(momentum_streak(&sma, &ema, TrendDirection::Up, 12), 0);
    }

    #[test]
    fn test_streak_stops_at_undefined_sma() {
        let sma = vec![None, None, Some(10.0), Some(10.0)];
        let ema = vec![11.0; 4];
        assert_eq!(momentum_streak(&sma, &ema, TrendDirection::Up, 12), 2);
    }

    #[test]
    fn test_confirm_on_rising_series() {
        let closes: Vec<f64> = (1..=30).map(|c| c as f64).collect();
        let series = DailySeries::new("UP", bars_from_closes(&closes)).unwrap();
        let prepared = preprocess(&series, &IndicatorParams::default());

        let reading = confirm(&prepared, TrendDirection::Up, 12).unwrap();
        assert!(reading.confirmed);
        assert_eq!(reading.streak, 12);

        let down = confirm(&prepared, TrendDirection::Down, 12).unwrap();
        assert!(!down.confirmed);
        assert_eq!(down.streak, 0);
    }

    fn prepared_from(closes: &[f64]) -> PreparedSeries {
        let series = DailySeries::new("FLAT", bars_from_closes(closes)).unwrap();
        preprocess(&series, &IndicatorParams::default())
    }

    #[test]
    fn test_flat_tail_after_rally_does_not_confirm() {
        let mut closes: Vec<f64> = (0..260).map(|i| 50.0 + i as f64 * 0.11).collect();
        closes.extend(std::iter::repeat(78.9).take(200));
        let prepared = prepared_from(&closes);

        let up = confirm(&prepared, TrendDirection::Up, 12).unwrap();
        assert_eq!(up.sma, Some(78.9));
        assert!(!up.confirmed);
        assert_eq!(up.streak, 0);

        let down = confirm(&prepared, TrendDirection::Down, 12).unwrap();
        assert!(!down.confirmed);
        assert_eq!(down.streak, 0);
    }

    #[test]
    fn test_flat_tail_after_decline_does_not_confirm() {
        let mut closes: Vec<f64> = (0..260).map(|i| 120.0 - i as f64 * 0.13).collect();
        closes.extend(std::iter::repeat(78.9).take(200));
        let prepared = prepared_from(&closes);

        for direction in [TrendDirection::Up, TrendDirection::Down] {
            let reading = confirm(&prepared, direction, 12).unwrap();
            assert!(!reading.confirmed);
            assert_eq!(reading.streak, 0);
        }
    }

    #[test]
    fn test_values_on_the_sma_do_not_confirm() {
        assert!(!is_confirmed(TrendDirection::Up, 10.0, Some(10.0), 10.5));
        assert!(!is_confirmed(TrendDirection::Down, 9.0, Some(10.0), 10.0 - 1e-13));
    }
}
