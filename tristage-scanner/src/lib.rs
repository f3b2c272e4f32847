//! Tristage Scanner Library
//!
//! A three-stage technical screener for equities. Every candidate symbol's
//! daily history runs through a funnel:
//!
//! 1. **Volatility condition**: the current week's volume and ATR against
//!    the previous week (Compression, Quiet Breakout, Exhaustion)
//! 2. **Trend & pullback**: a long-term trend with a meaningful retracement
//!    from the recent extreme
//! 3. **Momentum**: short-term SMA/EMA relationship confirms the trend
//!
//! Survivors are exported as a watchlist.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        tristage-scanner                             │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐  ┌──────────┐  │
//! │  │  discovery  │  │    data     │  │  indicators  │  │ analysis │  │
//! │  │  (Finviz)   │  │ (Yahoo,     │  │ (TR/ATR, SMA │  │ (stages) │  │
//! │  │             │  │  snapshot)  │  │  EMA, weekly)│  │          │  │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘  └────┬─────┘  │
//! │         └────────────────┴──────── screener ───────────────┘        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analysis;
pub mod data;
pub mod discovery;
pub mod indicators;
pub mod screener;

use anyhow::{bail, Result};
use std::sync::Arc;
use tristage_common::config::{DiscoveryConfig, ProviderConfig, ProviderKind};

pub use data::{CachedProvider, DailySeries, DataProvider, PriceBar, ProviderError};
pub use discovery::{FinvizSource, StaticSymbols, SymbolSource};
pub use screener::{ReportFormat, ScanEngine, ScanOutcome, ScanReport, ScanResult, SkipReason};

/// Build the configured data provider, wrapped in a cache when a TTL is set.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn DataProvider>> {
    let provider: Arc<dyn DataProvider> = match config.kind {
        ProviderKind::Yahoo => {
            let yahoo = data::YahooProvider::from_config(config);
            if config.cache_ttl_secs == 0 {
                Arc::new(yahoo)
            } else {
                let Some(ttl) = i64::try_from(config.cache_ttl_secs)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                else {
                    bail!("provider.cache_ttl_secs is out of range: {}", config.cache_ttl_secs);
                };
                Arc::new(CachedProvider::new(yahoo, ttl))
            }
        }
        ProviderKind::Snapshot => {
            let Some(dir) = &config.snapshot_dir else {
                bail!("provider.snapshot_dir is required for the snapshot provider");
            };
            Arc::new(data::SnapshotProvider::new(dir.clone()))
        }
    };

    tracing::debug!(
        provider = provider.name(),
        cache_ttl_secs = config.cache_ttl_secs,
        "Data provider ready"
    );
    Ok(provider)
}

/// Build the listing source used when no explicit symbols are given.
pub fn build_symbol_source(config: &DiscoveryConfig) -> Arc<dyn SymbolSource> {
    Arc::new(FinvizSource::from_config(config))
}
