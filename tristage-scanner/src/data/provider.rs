//! Data provider abstraction for daily price history.
//!
//! Defines the `DataProvider` trait that every retrieval backend implements,
//! so the scan engine can run against HTTP sources, frozen snapshots or
//! in-memory fakes alike.

use async_trait::async_trait;
use chrono::Duration;
use serde::Serialize;
use thiserror::Error;

use super::{DailySeries, SeriesError};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProviderError {
    /// Symbol unknown to the source or no data returned
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection failure or non-success HTTP status
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded its deadline
    #[error("Request timed out")]
    Timeout,

    /// Source refused the request because of its rate limit
    #[error("Rate limited")]
    RateLimited,

    /// Payload could not be decoded into a valid series
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// Internal provider error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Short machine-readable label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Network(_) => "network",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::MalformedData(_) => "malformed_data",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<SeriesError> for ProviderError {
    fn from(err: SeriesError) -> Self {
        match err {
            SeriesError::Empty => Self::NotFound("no bars returned".into()),
            other => Self::MalformedData(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedData(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

// ============================================================================
// Data Provider Trait
// ============================================================================

/// Trait for daily price history sources.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Get the provider name (e.g., "yahoo", "snapshot")
    fn name(&self) -> &'static str;

    /// Fetch the daily series for a symbol covering roughly `lookback`
    /// calendar time up to the most recent session.
    async fn fetch_daily_series(
        &self,
        symbol: &str,
        lookback: Duration,
    ) -> Result<DailySeries, ProviderError>;
}
