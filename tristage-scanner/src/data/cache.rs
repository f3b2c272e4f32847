//! Caching wrapper for data providers.
//!
//! Provides in-memory caching with TTL for daily series, keyed by symbol.
//! Each symbol has its own async slot lock, so concurrent requests for the
//! same symbol share a single in-flight fetch. Expired slots nobody holds are
//! pruned whenever a new symbol is added.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{DailySeries, DataProvider, ProviderError};

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry {
    series: DailySeries,
    lookback: Duration,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(series: DailySeries, lookback: Duration, ttl: Duration) -> Self {
        Self {
            series,
            lookback,
            expires_at: Utc::now()
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

type Slot = Arc<tokio::sync::Mutex<Option<CacheEntry>>>;

/// A [`DataProvider`] that memoizes another provider's series.
pub struct CachedProvider<P> {
    inner: P,
    ttl: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<P: DataProvider> CachedProvider<P> {
    /// Wrap `inner` with the given TTL.
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, symbol: &str) -> Slot {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(slot) = slots.get(symbol) {
            return slot.clone();
        }

        prune_expired(&mut slots);
        let slot: Slot = Arc::new(tokio::sync::Mutex::new(None));
        slots.insert(symbol.to_string(), slot.clone());
        slot
    }
}

/// Drop slots that hold no fresh entry and are not in use by any fetch.
fn prune_expired(slots: &mut HashMap<String, Slot>) {
    slots.retain(|_, slot| {
        Arc::strong_count(slot) > 1
            || slot
                .try_lock()
                .map_or(true, |entry| entry.as_ref().is_some_and(|e| !e.is_expired()))
    });
}

#[async_trait]
impl<P: DataProvider> DataProvider for CachedProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_daily_series(
        &self,
        symbol: &str,
        lookback: Duration,
    ) -> Result<DailySeries, ProviderError> {
        let slot = self.slot(symbol);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if !cached.is_expired() && cached.lookback == lookback {
                debug!(symbol = %symbol, "Series cache hit");
                return Ok(cached.series.clone());
            }
        }

        debug!(symbol = %symbol, provider = self.inner.name(), "Series cache miss");
        let series = self.inner.fetch_daily_series(symbol, lookback).await?;
        *entry = Some(CacheEntry::new(series.clone(), lookback, self.ttl));
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::bars_from_closes;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl DataProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_daily_series(
            &self,
            symbol: &str,
            _lookback: Duration,
        ) -> Result<DailySeries, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            if self.fail {
                return Err(ProviderError::Network("down".into()));
            }
            Ok(DailySeries::new(symbol, bars_from_closes(&[1.0, 2.0, 3.0])).unwrap())
        }
    }

    fn provider(fail: bool) -> CountingProvider {
        CountingProvider {
            calls: AtomicU32::new(0),
            fail,
        }
    }

    #[tokio::test]
    async fn test_second_fetch_is_cached() {
        let cached = CachedProvider::new(provider(false), Duration::seconds(60));
        let lookback = Duration::days(30);

        cached.fetch_daily_series("AAPL", lookback).await.unwrap();
        cached.fetch_daily_series("AAPL", lookback).await.unwrap();

        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_request() {
        let cached = Arc::new(CachedProvider::new(provider(false), Duration::seconds(60)));
        let lookback = Duration::days(30);

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let cached = Arc::clone(&cached);
                tokio::spawn(async move { cached.fetch_daily_series("MSFT", lookback).await })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            assert!(task.unwrap().is_ok());
        }
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let cached = CachedProvider::new(provider(false), Duration::zero());
        let lookback = Duration::days(30);

        cached.fetch_daily_series("AAPL", lookback).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cached.fetch_daily_series("AAPL", lookback).await.unwrap();

        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cached = CachedProvider::new(provider(true), Duration::seconds(60));
        let lookback = Duration::days(30);

        assert!(cached.fetch_daily_series("AAPL", lookback).await.is_err());
        assert!(cached.fetch_daily_series("AAPL", lookback).await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_slots_pruned_on_insert() {
        let cached = CachedProvider::new(provider(false), Duration::zero());
        let lookback = Duration::days(30);

        for symbol in ["AAPL", "MSFT", "NVDA"] {
            cached.fetch_daily_series(symbol, lookback).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let slots = cached.slots.lock().unwrap();
        assert_eq!(slots.len(), 1);
        assert!(slots.contains_key("NVDA"));
    }

    #[tokio::test]
    async fn test_fresh_slots_survive_pruning() {
        let cached = CachedProvider::new(provider(false), Duration::seconds(60));
        let lookback = Duration::days(30);

        for symbol in ["AAPL", "MSFT", "NVDA"] {
            cached.fetch_daily_series(symbol, lookback).await.unwrap();
        }

        assert_eq!(cached.slots.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let series = DailySeries::new("AAPL", bars_from_closes(&[1.0, 2.0])).unwrap();
        let entry = CacheEntry::new(series, Duration::days(30), Duration::weeks(1_000_000_000));
        assert_eq!(entry.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!entry.is_expired());
    }
}
