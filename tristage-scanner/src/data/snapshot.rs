//! Snapshot provider reading frozen series from disk.
//!
//! Each symbol lives in `<dir>/<SYMBOL>.json` as a JSON array of
//! [`PriceBar`]. Re-running a scan against the same directory always yields
//! the same inputs.

use async_trait::async_trait;
use chrono::Duration;
use std::path::PathBuf;
use tracing::debug;

use super::provider::{DataProvider, ProviderError};
use super::{DailySeries, PriceBar};

/// Reads `<SYMBOL>.json` files from a directory.
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    dir: PathBuf,
}

impl SnapshotProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> Result<PathBuf, ProviderError> {
        let valid = !symbol.is_empty()
            && symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
            && !symbol.contains("..");
        if !valid {
            return Err(ProviderError::NotFound(format!("invalid symbol {:?}", symbol)));
        }
        Ok(self.dir.join(format!("{}.json", symbol)))
    }

}

#[async_trait]
impl DataProvider for SnapshotProvider {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn fetch_daily_series(
        &self,
        symbol: &str,
        lookback: Duration,
    ) -> Result<DailySeries, ProviderError> {
        let path = self.path_for(symbol)?;

        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::NotFound(format!("{} has no snapshot", symbol)));
            }
            Err(e) => return Err(ProviderError::Internal(format!("{}: {}", path.display(), e))),
        };

        let bars: Vec<PriceBar> = serde_json::from_slice(&content)
            .map_err(|e| ProviderError::MalformedData(format!("{}: {}", path.display(), e)))?;
        let series = DailySeries::new(symbol, bars)?;

        // Trim to the requested window, anchored on the newest bar.
        let cutoff = series.last().timestamp - lookback;
        let bars: Vec<PriceBar> = series
            .bars()
            .iter()
            .filter(|b| b.timestamp > cutoff)
            .copied()
            .collect();

        debug!(symbol = symbol, bars = bars.len(), "Loaded snapshot series");
        Ok(DailySeries::new(symbol, bars)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::bars_from_closes;
    use std::path::Path;

    fn write_snapshot(dir: &Path, series: &DailySeries) {
        let json = serde_json::to_vec_pretty(series.bars()).unwrap();
        std::fs::write(dir.join(format!("{}.json", series.symbol())), json).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_reads_written_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SnapshotProvider::new(dir.path());

        let closes: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        let series = DailySeries::new("AAPL", bars_from_closes(&closes)).unwrap();
        write_snapshot(dir.path(), &series);

        let loaded = provider
            .fetch_daily_series("AAPL", Duration::days(365))
            .await
            .unwrap();
        assert_eq!(loaded, series);
    }

    #[tokio::test]
    async fn test_lookback_trims_old_bars() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SnapshotProvider::new(dir.path());

        let closes: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        let series = DailySeries::new("AAPL", bars_from_closes(&closes)).unwrap();
        write_snapshot(dir.path(), &series);

        let loaded = provider
            .fetch_daily_series("AAPL", Duration::days(10))
            .await
            .unwrap();
        assert_eq!(loaded.len(), 10);
        assert_eq!(loaded.last(), series.last());
    }

    #[tokio::test]
    async fn test_missing_symbol_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SnapshotProvider::new(dir.path());

        let err = provider
            .fetch_daily_series("NOPE", Duration::days(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_json_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("BAD.json"), "[{\"oops\": 1}]").unwrap();
        let provider = SnapshotProvider::new(dir.path());

        let err = provider
            .fetch_daily_series("BAD", Duration::days(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedData(_)));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let provider = SnapshotProvider::new("/tmp");
        let err = provider
            .fetch_daily_series("../etc/passwd", Duration::days(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
