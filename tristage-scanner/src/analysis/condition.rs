//! Weekly volatility/volume condition classifier.
//!
//! Compares the current period against the previous one. Checks run in a
//! fixed order and the first match wins:
//!
//! 1. **Compression**: volume up while ATR contracts
//! 2. **Quiet breakout**: volume up sharply while ATR stays roughly flat
//! 3. **Exhaustion**: volume holding while ATR collapses

use serde::{Deserialize, Serialize};
use std::fmt;
use tristage_common::config::ConditionThresholds;

use crate::indicators::VolatilitySnapshot;

/// Outcome of a current-vs-previous period comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLabel {
    Compression,
    QuietBreakout,
    Exhaustion,
    #[default]
    None,
}

impl ConditionLabel {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Compact description of what moved.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Compression => "Vol↑ ATR↓",
            Self::QuietBreakout => "Vol↑↑ ATR~",
            Self::Exhaustion => "ATR↓↓ Vol~",
            Self::None => "",
        }
    }
}

impl fmt::Display for ConditionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compression => "Compression",
            Self::QuietBreakout => "Quiet Breakout",
            Self::Exhaustion => "Exhaustion",
            Self::None => "None",
        };
        write!(f, "{}", name)
    }
}

/// A classified comparison with the percentage changes behind it.
///
/// The percentages are `None` when the previous value is zero or undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionReading {
    pub label: ConditionLabel,
    pub volume_change_pct: Option<f64>,
    pub atr_change_pct: Option<f64>,
}

impl ConditionReading {
    fn none() -> Self {
        Self {
            label: ConditionLabel::None,
            volume_change_pct: None,
            atr_change_pct: None,
        }
    }
}

/// Classify raw volume and ATR values.
pub fn classify(
    vol_now: f64,
    vol_prev: f64,
    atr_now: Option<f64>,
    atr_prev: Option<f64>,
    thresholds: &ConditionThresholds,
) -> ConditionReading {
    let (Some(atr_now), Some(atr_prev)) = (atr_now, atr_prev) else {
        return ConditionReading::none();
    };

    let all_finite = [vol_now, vol_prev, atr_now, atr_prev]
        .iter()
        .all(|v| v.is_finite());
    if !all_finite || vol_prev == 0.0 || atr_prev == 0.0 {
        return ConditionReading::none();
    }

    let vol_pct = (vol_now / vol_prev - 1.0) * 100.0;
    let atr_pct = (atr_now / atr_prev - 1.0) * 100.0;

    let label = if vol_now > vol_prev && atr_now < atr_prev {
        ConditionLabel::Compression
    } else if vol_pct > thresholds.quiet_breakout_min_volume_pct
        && atr_pct < thresholds.quiet_breakout_max_atr_pct
    {
        ConditionLabel::QuietBreakout
    } else if vol_pct > thresholds.exhaustion_min_volume_pct
        && atr_pct < thresholds.exhaustion_max_atr_pct
    {
        ConditionLabel::Exhaustion
    } else {
        ConditionLabel::None
    };

    ConditionReading {
        label,
        volume_change_pct: Some(vol_pct),
        atr_change_pct: Some(atr_pct),
    }
}

/// Classify two adjacent snapshots.
pub fn evaluate(
    current: &VolatilitySnapshot,
    previous: &VolatilitySnapshot,
    thresholds: &ConditionThresholds,
) -> ConditionReading {
    classify(
        current.volume as f64,
        previous.volume as f64,
        current.atr,
        previous.atr,
        thresholds,
    )
}
