//! Per-symbol evaluation.
//!
//! Runs the indicator and analysis passes over one daily series and applies
//! the enabled funnel stages. Pure: the same series and configuration always
//! give the same answer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tristage_common::config::ScannerConfig;

use crate::analysis::{
    analyze_trend, condition, condition_streak, confirm, ConditionLabel, TrendDirection,
};
use crate::data::{DailySeries, ProviderError};
use crate::indicators::{preprocess, weekly_snapshots, IndicatorParams};

use super::funnel::FilterStage;

// ============================================================================
// Scan Result
// ============================================================================

/// A symbol that survived every enabled stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbol: String,
    /// Date of the newest daily bar
    pub as_of: NaiveDate,
    pub direction: TrendDirection,
    /// LONG for an uptrend, SHORT for a downtrend
    pub action: String,
    /// Latest close
    pub price: f64,
    /// Signed move from the recent extreme (%)
    pub move_pct: f64,
    /// Condition of the current week against the previous week
    pub condition: ConditionLabel,
    pub volume_change_pct: Option<f64>,
    pub atr_change_pct: Option<f64>,
    pub atr_now: Option<f64>,
    pub atr_prev: Option<f64>,
    pub volume_now: u64,
    pub volume_prev: u64,
    pub momentum_confirmed: bool,
    pub momentum_streak: usize,
    pub condition_streak: usize,
}

// ============================================================================
// Skip Reason
// ============================================================================

/// Why a symbol produced no result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer daily bars than the configured minimum
    InsufficientHistory { bars: usize, required: usize },
    /// Data retrieval failed
    Retrieval { error: ProviderError },
    /// Retrieval exceeded the per-symbol deadline
    Timeout { secs: u64 },
    /// Fewer than two weekly bars to compare
    InsufficientWeeklyData { weeks: usize },
    /// A derived value could not be computed
    Undefined { detail: String },
    /// Rejected by an enabled funnel stage
    FailedFilter { stage: FilterStage },
    /// The run was cancelled before the symbol was evaluated
    Cancelled,
}

impl SkipReason {
    /// Short machine-readable label for aggregate counts.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::Retrieval { .. } => "retrieval_failure",
            Self::Timeout { .. } => "timeout",
            Self::InsufficientWeeklyData { .. } => "insufficient_weekly_data",
            Self::Undefined { .. } => "computation_undefined",
            Self::FailedFilter { .. } => "failed_filter",
            Self::Cancelled => "cancelled",
        }
    }

    /// Funnel stage that removed the symbol.
    pub fn stage(&self) -> FilterStage {
        match self {
            Self::FailedFilter { stage } => *stage,
            _ => FilterStage::History,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientHistory { bars, required } => {
                write!(f, "insufficient history ({} of {} bars)", bars, required)
            }
            Self::Retrieval { error } => write!(f, "retrieval failed: {}", error),
            Self::Timeout { secs } => write!(f, "retrieval timed out after {}s", secs),
            Self::InsufficientWeeklyData { weeks } => {
                write!(f, "insufficient weekly data ({} weeks)", weeks)
            }
            Self::Undefined { detail } => write!(f, "undefined: {}", detail),
            Self::FailedFilter { stage } => write!(f, "failed filter: {}", stage),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Evaluate one series against the configured funnel.
pub fn evaluate_series(
    series: &DailySeries,
    config: &ScannerConfig,
) -> Result<ScanResult, SkipReason> {
    if series.len() < config.min_history_bars {
        return Err(SkipReason::InsufficientHistory {
            bars: series.len(),
            required: config.min_history_bars,
        });
    }

    let params = IndicatorParams::from_config(config);
    let prepared = preprocess(series, &params);

    // Stage 1: weekly condition
    let weeks = weekly_snapshots(series.bars(), &params);
    let (current, previous) = match weeks.as_slice() {
        [.., previous, current] => (current, previous),
        _ => return Err(SkipReason::InsufficientWeeklyData { weeks: weeks.len() }),
    };
    let reading = condition::evaluate(current, previous, &config.condition_thresholds);
    if config.stages.stage1_enabled && reading.label.is_none() {
        return Err(SkipReason::FailedFilter {
            stage: FilterStage::Volatility,
        });
    }

    // Stage 2: trend and pullback
    let trend = analyze_trend(series.bars(), config.long_trend_lag, config.short_window_bars)
        .ok_or_else(|| SkipReason::Undefined {
            detail: "non-positive price extreme".into(),
        })?;
    if config.stages.stage2_enabled && !trend.is_pullback(config.pullback_threshold_pct) {
        return Err(SkipReason::FailedFilter {
            stage: FilterStage::TrendPullback,
        });
    }

    // Stage 3: momentum
    let momentum = confirm(&prepared, trend.direction, config.momentum_lookback_bars)
        .ok_or_else(|| SkipReason::Undefined {
            detail: "empty prepared series".into(),
        })?;
    if config.stages.stage3_enabled && !momentum.confirmed {
        return Err(SkipReason::FailedFilter {
            stage: FilterStage::Momentum,
        });
    }

    Ok(ScanResult {
        symbol: series.symbol().to_string(),
        as_of: series.last().timestamp,
        direction: trend.direction,
        action: trend.direction.action().to_string(),
        price: trend.current_close,
        move_pct: trend.move_pct,
        condition: reading.label,
        volume_change_pct: reading.volume_change_pct,
        atr_change_pct: reading.atr_change_pct,
        atr_now: current.atr,
        atr_prev: previous.atr,
        volume_now: current.volume,
        volume_prev: previous.volume,
        momentum_confirmed: momentum.confirmed,
        momentum_streak: momentum.streak,
        condition_streak: condition_streak(&weeks, &config.condition_thresholds),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::bars_from_closes;
    use tristage_common::config::StageToggles;

    fn config(stages: StageToggles) -> ScannerConfig {
        ScannerConfig {
            stages,
            ..Default::default()
        }
    }

    #[test]
    fn test_short_series_is_insufficient_history() {
        let series = DailySeries::new("SHORT", bars_from_closes(&[10.0; 200])).unwrap();
        for stages in [StageToggles::all(), StageToggles::none(), StageToggles::default()] {
            assert_eq!(
                evaluate_series(&series, &config(stages)),
                Err(SkipReason::InsufficientHistory {
                    bars: 200,
                    required: 260
                })
            );
        }
    }

    #[test]
    fn test_single_week_is_insufficient_weekly_data() {
        let series = DailySeries::new("ONE", bars_from_closes(&[10.0; 5])).unwrap();
        let cfg = ScannerConfig {
            min_history_bars: 2,
            ..config(StageToggles::none())
        };
        assert_eq!(
            evaluate_series(&series, &cfg),
            Err(SkipReason::InsufficientWeeklyData { weeks: 1 })
        );
    }

    #[test]
    fn test_flat_series_fails_volatility_stage() {
        // Identical bars every day: equal weekly volume and ATR => None
        let series = DailySeries::new("FLAT", bars_from_closes(&[10.0; 300])).unwrap();
        assert_eq!(
            evaluate_series(&series, &config(StageToggles::default())),
            Err(SkipReason::FailedFilter {
                stage: FilterStage::Volatility
            })
        );
    }

    #[test]
    fn test_all_stages_disabled_accepts_any_long_series() {
        let series = DailySeries::new("FLAT", bars_from_closes(&[10.0; 300])).unwrap();
        let result = evaluate_series(&series, &config(StageToggles::none())).unwrap();
        assert_eq!(result.symbol, "FLAT");
        assert_eq!(result.condition, ConditionLabel::None);
        assert_eq!(result.direction, TrendDirection::Down);
        assert_eq!(result.action, "SHORT");
    }

    #[test]
    fn test_skip_reason_categories() {
        assert_eq!(
            SkipReason::InsufficientHistory { bars: 1, required: 2 }.category(),
            "insufficient_history"
        );
        assert_eq!(
            SkipReason::FailedFilter {
                stage: FilterStage::Momentum
            }
            .stage(),
            FilterStage::Momentum
        );
        assert_eq!(SkipReason::Timeout { secs: 3 }.stage(), FilterStage::History);
    }

    #[test]
    fn test_skip_reason_serializes_with_tag() {
        let json = serde_json::to_value(SkipReason::Retrieval {
            error: ProviderError::NotFound("ZZZZ".into()),
        })
        .unwrap();
        assert_eq!(json["reason"], "retrieval");
        assert_eq!(json["error"]["kind"], "not_found");
    }
}
