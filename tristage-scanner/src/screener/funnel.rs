//! Funnel stage bookkeeping.
//!
//! Tracks how many symbols survive each stage of a scan:
//! 1. History: data retrieved and long enough to evaluate
//! 2. Volatility: weekly condition present
//! 3. Trend & pullback: retracement against the long-term trend
//! 4. Momentum: short-term averages confirm the trend

use serde::{Deserialize, Serialize};

// ============================================================================
// Filter Stage
// ============================================================================

/// Filter stage identifier for tracking where symbols are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// Input stage (all candidates)
    Input,
    /// Retrieval plus minimum history
    History,
    /// Stage 1: weekly volatility/volume condition
    Volatility,
    /// Stage 2: long-term trend with pullback
    TrendPullback,
    /// Stage 3: momentum confirmation
    Momentum,
    /// Final selection
    Final,
}

impl FilterStage {
    /// Stages in funnel order.
    pub const ALL: [FilterStage; 6] = [
        Self::Input,
        Self::History,
        Self::Volatility,
        Self::TrendPullback,
        Self::Momentum,
        Self::Final,
    ];
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "Input"),
            Self::History => write!(f, "Data & history"),
            Self::Volatility => write!(f, "Stage 1: ATR/volume condition"),
            Self::TrendPullback => write!(f, "Stage 2: Trend & pullback"),
            Self::Momentum => write!(f, "Stage 3: Momentum"),
            Self::Final => write!(f, "Final"),
        }
    }
}

// ============================================================================
// Filter Result
// ============================================================================

/// Result of a filtering stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    /// Stage name
    pub stage: FilterStage,
    /// Number of symbols that passed this stage
    pub passed: usize,
    /// Number of symbols eliminated at this stage
    pub eliminated: usize,
    /// Elimination rate (%)
    pub elimination_rate: f64,
}

impl FilterResult {
    pub fn new(stage: FilterStage, input_count: usize, passed_count: usize) -> Self {
        let eliminated = input_count.saturating_sub(passed_count);
        let elimination_rate = if input_count > 0 {
            (eliminated as f64 / input_count as f64) * 100.0
        } else {
            0.0
        };

        Self {
            stage,
            passed: passed_count,
            eliminated,
            elimination_rate,
        }
    }
}

/// Build per-stage results from where each symbol stopped.
///
/// `stopped_at` holds, for every eliminated symbol, the stage that removed
/// it; `accepted` is the number of symbols that passed every stage.
pub fn funnel_from_eliminations(
    total: usize,
    stopped_at: &[FilterStage],
    accepted: usize,
) -> Vec<FilterResult> {
    let mut remaining = total;
    let mut results = vec![FilterResult::new(FilterStage::Input, total, total)];

    for stage in [
        FilterStage::History,
        FilterStage::Volatility,
        FilterStage::TrendPullback,
        FilterStage::Momentum,
    ] {
        let eliminated = stopped_at.iter().filter(|s| **s == stage).count();
        let passed = remaining.saturating_sub(eliminated);
        results.push(FilterResult::new(stage, remaining, passed));
        remaining = passed;
    }

    results.push(FilterResult::new(FilterStage::Final, remaining, accepted));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_result_calculation() {
        let result = FilterResult::new(FilterStage::History, 100, 80);
        assert_eq!(result.passed, 80);
        assert_eq!(result.eliminated, 20);
        assert!((result.elimination_rate - 20.0).abs() < 0.001);
    }

    #[test]
    fn test_empty_input_has_zero_rate() {
        let result = FilterResult::new(FilterStage::Input, 0, 0);
        assert!((result.elimination_rate - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_funnel_from_eliminations() {
        let stopped = [
            FilterStage::History,
            FilterStage::History,
            FilterStage::Volatility,
            FilterStage::Momentum,
        ];
        let funnel = funnel_from_eliminations(10, &stopped, 6);

        let passed: Vec<usize> = funnel.iter().map(|r| r.passed).collect();
        assert_eq!(passed, vec![10, 8, 7, 7, 6, 6]);
        assert_eq!(funnel[1].eliminated, 2);
        assert_eq!(funnel[5].stage, FilterStage::Final);
        assert_eq!(funnel[5].eliminated, 0);
    }
}
