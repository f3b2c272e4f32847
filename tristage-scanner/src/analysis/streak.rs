//! Multi-week condition streaks.

use tristage_common::config::ConditionThresholds;

use super::condition::{evaluate, ConditionLabel};
use crate::indicators::VolatilitySnapshot;

/// Maximum number of trailing week pairs inspected.
pub const MAX_CONDITION_STREAK: usize = 3;

/// Labels of the trailing adjacent pairs, newest pair first.
///
/// With `n` snapshots there are `min(n - 1, 3)` pairs.
pub fn trailing_labels(
    snapshots: &[VolatilitySnapshot],
    thresholds: &ConditionThresholds,
) -> Vec<ConditionLabel> {
    snapshots
        .windows(2)
        .rev()
        .take(MAX_CONDITION_STREAK)
        .map(|pair| evaluate(&pair[1], &pair[0], thresholds).label)
        .collect()
}

/// Number of consecutive recent weeks that matched a condition.
///
/// Counting starts at the newest pair and stops at the first `None`.
pub fn condition_streak(
    snapshots: &[VolatilitySnapshot],
    thresholds: &ConditionThresholds,
) -> usize {
    streak_from_labels(&trailing_labels(snapshots, thresholds))
}

/// Streak length of labels ordered newest first.
pub fn streak_from_labels(labels: &[ConditionLabel]) -> usize {
    labels.iter().take_while(|label| !label.is_none()).count()
}
