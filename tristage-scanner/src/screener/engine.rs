//! Scan engine module.
//!
//! The central orchestrator for a scan run: fetches each candidate's daily
//! series, evaluates it, and collects results and skips into a
//! [`ScanOutcome`].
//!
//! Symbols are evaluated concurrently up to `scanner.concurrency`; results
//! are appended by a single consumer and sorted explicitly at the end, so the
//! output never depends on arrival order.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use tristage_common::config::{ScannerConfig, StageToggles};
use tristage_common::logging::generate_run_id;

use crate::data::DataProvider;
use crate::discovery::SymbolSource;

use super::evaluate::{evaluate_series, ScanResult, SkipReason};
use super::funnel::{funnel_from_eliminations, FilterResult, FilterStage};

// ============================================================================
// Cancellation & Progress
// ============================================================================

/// Shared flag to stop a running scan.
///
/// Symbols not yet started when the flag is raised are skipped as
/// cancelled; in-flight symbols finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress notification emitted after each symbol.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub completed: usize,
    pub total: usize,
    pub symbol: String,
    pub accepted: bool,
}

/// Callback receiving progress notifications.
pub type ProgressCallback = Arc<dyn Fn(&ScanProgress) + Send + Sync>;

// ============================================================================
// Scan Outcome
// ============================================================================

/// A symbol that produced no result, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Everything a completed scan run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    /// Run ID
    pub id: String,
    /// Stages enabled for this run
    pub stages: StageToggles,
    /// Number of candidate symbols evaluated
    pub total_candidates: usize,
    /// Accepted symbols, sorted by momentum streak, condition streak, symbol
    pub results: Vec<ScanResult>,
    /// Symbols without a result, sorted by symbol
    pub skipped: Vec<SkippedSymbol>,
    /// Per-stage funnel counts
    pub funnel: Vec<FilterResult>,
    /// Candidate discovery failed; the run had nothing to evaluate
    pub discovery_failed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl ScanOutcome {
    /// Accepted symbols in result order.
    pub fn accepted_symbols(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.symbol.as_str()).collect()
    }

    /// Plain-text export: one symbol per line, no header.
    pub fn watchlist(&self) -> String {
        self.accepted_symbols().join("\n")
    }

    /// Count of skipped symbols per skip category.
    pub fn skip_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for skipped in &self.skipped {
            *counts.entry(skipped.reason.category()).or_insert(0) += 1;
        }
        counts
    }

    /// Whether the run completed without any accepted symbol.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Scanned {} symbols in {:.1}s: {} passed, {} skipped",
            self.total_candidates,
            self.duration_secs,
            self.results.len(),
            self.skipped.len()
        )
    }
}

/// Order results by momentum streak, then condition streak (both
/// descending), then symbol.
pub fn sort_results(results: &mut [ScanResult]) {
    results.sort_by(|a, b| {
        b.momentum_streak
            .cmp(&a.momentum_streak)
            .then_with(|| b.condition_streak.cmp(&a.condition_streak))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

// ============================================================================
// Scan Engine
// ============================================================================

/// The main scan engine.
///
/// Orchestrates a run:
/// 1. Take the candidate set (given, or from a [`SymbolSource`])
/// 2. Fetch each series with a per-symbol timeout
/// 3. Evaluate the enabled funnel stages
/// 4. Collect, sort and summarize
pub struct ScanEngine {
    config: ScannerConfig,
    provider: Arc<dyn DataProvider>,
    progress: Option<ProgressCallback>,
    cancel: CancellationFlag,
}

impl ScanEngine {
    /// Create a new scan engine.
    pub fn new(config: ScannerConfig, provider: Arc<dyn DataProvider>) -> Self {
        Self {
            config,
            provider,
            progress: None,
            cancel: CancellationFlag::new(),
        }
    }

    /// Report progress through `callback` after each symbol.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Use an externally controlled cancellation flag.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Handle that cancels this engine's runs.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Discover candidates from `source` and scan them.
    ///
    /// A discovery failure is logged and the run completes with zero
    /// candidates and `discovery_failed` set.
    pub async fn run_discovered(&self, source: &dyn SymbolSource) -> ScanOutcome {
        match source.discover_symbols().await {
            Ok(symbols) => {
                info!(source = source.name(), count = symbols.len(), "Candidates discovered");
                self.run(symbols).await
            }
            Err(e) => {
                warn!(source = source.name(), error = %e, "Symbol discovery failed, no candidates");
                let mut outcome = self.run(Vec::<String>::new()).await;
                outcome.discovery_failed = true;
                outcome
            }
        }
    }

    /// Scan a set of candidate symbols.
    pub async fn run<I, S>(&self, symbols: I) -> ScanOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let started_at = Utc::now();
        let id = format!(
            "scan_{}_{}",
            started_at.format("%Y%m%d_%H%M%S"),
            &generate_run_id()[..8]
        );

        let candidates: Vec<String> = symbols
            .into_iter()
            .map(Into::into)
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        let total = candidates.len();

        info!(
            scan_id = %id,
            candidates = total,
            stage1 = self.config.stages.stage1_enabled,
            stage2 = self.config.stages.stage2_enabled,
            stage3 = self.config.stages.stage3_enabled,
            "Starting scan"
        );

        let mut evaluations = stream::iter(candidates)
            .map(|symbol| async move {
                let outcome = self.scan_symbol(&symbol).await;
                (symbol, outcome)
            })
            .buffer_unordered(self.config.concurrency.max(1));

        let mut results = Vec::new();
        let mut skipped = Vec::new();
        let mut completed = 0usize;

        while let Some((symbol, outcome)) = evaluations.next().await {
            completed += 1;
            let accepted = outcome.is_ok();

            match outcome {
                Ok(result) => results.push(result),
                Err(reason) => skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason,
                }),
            }

            if let Some(callback) = &self.progress {
                callback(&ScanProgress {
                    completed,
                    total,
                    symbol,
                    accepted,
                });
            }
        }

        sort_results(&mut results);
        skipped.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let stopped_at: Vec<FilterStage> = skipped.iter().map(|s| s.reason.stage()).collect();
        let funnel = funnel_from_eliminations(total, &stopped_at, results.len());

        let completed_at = Utc::now();
        let duration_secs = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let outcome = ScanOutcome {
            id,
            stages: self.config.stages,
            total_candidates: total,
            results,
            skipped,
            funnel,
            discovery_failed: false,
            started_at,
            completed_at,
            duration_secs,
        };

        info!(
            scan_id = %outcome.id,
            passed = outcome.results.len(),
            skipped = outcome.skipped.len(),
            duration = %format!("{:.1}s", duration_secs),
            "Scan complete"
        );

        outcome
    }

    /// Fetch and evaluate one symbol.
    async fn scan_symbol(&self, symbol: &str) -> Result<ScanResult, SkipReason> {
        if self.cancel.is_cancelled() {
            return Err(SkipReason::Cancelled);
        }

        let lookback = chrono::Duration::days(self.config.lookback_days as i64);
        let deadline = Duration::from_secs(self.config.symbol_timeout_secs);
        let started = Instant::now();

        let series = match tokio::time::timeout(
            deadline,
            self.provider.fetch_daily_series(symbol, lookback),
        )
        .await
        {
            Ok(Ok(series)) => series,
            Ok(Err(error)) => {
                warn!(symbol = %symbol, error = %error, kind = error.kind(), "Retrieval failed");
                return Err(SkipReason::Retrieval { error });
            }
            Err(_) => {
                warn!(symbol = %symbol, timeout_secs = deadline.as_secs(), "Retrieval timed out");
                return Err(SkipReason::Timeout {
                    secs: deadline.as_secs(),
                });
            }
        };

        let outcome = evaluate_series(&series, &self.config);

        debug!(
            symbol = %symbol,
            bars = series.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            accepted = outcome.is_ok(),
            reason = outcome.as_ref().err().map(|r| r.category()).unwrap_or(""),
            "Symbol evaluated"
        );

        outcome
    }
}
