//! Signal analysis built on top of the indicator layer.
//!
//! - `condition`: weekly volatility/volume classification
//! - `trend`: long-term direction and pullback magnitude
//! - `momentum`: short-term moving-average confirmation and streak
//! - `streak`: consecutive weeks matching a volatility condition

pub mod condition;
pub mod momentum;
pub mod streak;
pub mod trend;

pub use condition::{classify, evaluate, ConditionLabel, ConditionReading};
pub use momentum::{confirm, is_confirmed, momentum_streak, MomentumReading};
pub use streak::{condition_streak, streak_from_labels, trailing_labels, MAX_CONDITION_STREAK};
pub use trend::{analyze as analyze_trend, TrendDirection, TrendReading};
