//! Yahoo Finance chart API adapter.
//!
//! # Endpoint
//! `GET {base}/v8/finance/chart/{symbol}?range=3y&interval=1d`
//!
//! # Response shape
//! `chart.result[0]` carries a `timestamp` array (unix seconds) and
//! `indicators.quote[0]` with parallel `open/high/low/close/volume` arrays.
//! Halted sessions show up as `null` entries and are dropped.
//!
//! # Rate Limits
//! Undocumented; the adapter throttles proactively (120 req/min by default).

use async_trait::async_trait;
use chrono::{DateTime, Duration};
use serde::Deserialize;
use tracing::debug;

use tristage_common::config::ProviderConfig;

use super::provider::{DataProvider, ProviderError};
use super::rate_limiter::{shared_limiter, SharedRateLimiter};
use super::{DailySeries, PriceBar};

// ============================================================================
// Constants
// ============================================================================

/// Chart endpoint prefix
const CHART_ENDPOINT: &str = "/v8/finance/chart";

/// HTTP request timeout
const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Convert a lookback duration to the API `range` parameter.
///
/// Whole years are preferred ("3y"), then months, then days, always rounding
/// up so the requested history is covered.
fn range_param(lookback: Duration) -> String {
    let days = lookback.num_days().max(1);
    if days >= 365 {
        format!("{}y", (days + 364) / 365)
    } else if days >= 28 {
        format!("{}mo", (days + 29) / 30)
    } else {
        format!("{}d", days)
    }
}

fn column(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Daily history from the Yahoo chart API.
pub struct YahooProvider {
    base_url: String,
    client: reqwest::Client,
    rate_limiter: SharedRateLimiter,
}

impl YahooProvider {
    /// Create with a custom base URL and rate limit.
    pub fn with_base_url(base_url: impl Into<String>, rate_limit_rpm: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            rate_limiter: shared_limiter("yahoo", rate_limit_rpm),
        }
    }

    /// Create from config
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::with_base_url(config.base_url.clone(), config.rate_limit_rpm)
    }

    fn parse_chart(symbol: &str, response: ChartResponse) -> Result<DailySeries, ProviderError> {
        if let Some(err) = response.chart.error {
            return Err(ProviderError::NotFound(format!(
                "{}: {} {}",
                symbol, err.code, err.description
            )));
        }

        let result = response
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ProviderError::NotFound(format!("{}: empty chart result", symbol)))?;

        let offset = result.meta.map(|m| m.gmtoffset).unwrap_or(0);
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

        let mut bars = Vec::with_capacity(result.timestamp.len());
        for (i, &ts) in result.timestamp.iter().enumerate() {
            let (Some(open), Some(high), Some(low), Some(close)) = (
                column(&quote.open, i),
                column(&quote.high, i),
                column(&quote.low, i),
                column(&quote.close, i),
            ) else {
                continue;
            };

            let date = DateTime::from_timestamp(ts + offset, 0)
                .ok_or_else(|| ProviderError::MalformedData(format!("invalid timestamp {}", ts)))?
                .date_naive();
            let volume = column(&quote.volume, i).unwrap_or(0.0).max(0.0) as u64;

            bars.push(PriceBar::new(date, open, high, low, close, volume));
        }

        Ok(DailySeries::from_unsorted(symbol, bars)?)
    }
}

// ============================================================================
// DataProvider Implementation
// ============================================================================

#[async_trait]
impl DataProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_daily_series(
        &self,
        symbol: &str,
        lookback: Duration,
    ) -> Result<DailySeries, ProviderError> {
        let url = format!("{}{}/{}", self.base_url, CHART_ENDPOINT, symbol);
        let range = range_param(lookback);

        self.rate_limiter.acquire().await;

        debug!(url = %url, symbol = symbol, range = %range, "Fetching daily chart");

        let response = self
            .client
            .get(&url)
            .query(&[("range", range.as_str()), ("interval", "1d")])
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        // The chart API reports unknown symbols as 404 with a JSON error body.
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(symbol.to_string()));
        }

        if !status.is_success() {
            return Err(ProviderError::Network(format!("HTTP {}", status)));
        }

        let body = response.text().await?;
        let parsed: ChartResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::MalformedData(format!("Failed to parse response: {}", e)))?;

        Self::parse_chart(symbol, parsed)
    }
}
