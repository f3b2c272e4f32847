//! Three-stage screener.
//!
//! Runs every candidate through the filter funnel and collects the
//! survivors.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────────┐
//! │ SymbolSource │──▶│  ScanEngine  │──▶│ evaluate_series (per symbol) │
//! │ (discovery)  │   │ (bounded     │   │  history → stage 1 → 2 → 3   │
//! └──────────────┘   │  concurrency)│   └──────────────────────────────┘
//!                    └──────┬───────┘
//!                           ▼
//!                    ScanOutcome ──▶ ScanReport (markdown / json / watchlist)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tristage_scanner::screener::ScanEngine;
//!
//! let engine = ScanEngine::new(config.scanner.clone(), provider);
//! let outcome = engine.run(["AAPL", "MSFT"]).await;
//! println!("{}", outcome.watchlist());
//! ```

pub mod engine;
pub mod evaluate;
pub mod funnel;
pub mod report;

pub use engine::{
    sort_results, CancellationFlag, ProgressCallback, ScanEngine, ScanOutcome, ScanProgress,
    SkippedSymbol,
};
pub use evaluate::{evaluate_series, ScanResult, SkipReason};
pub use funnel::{funnel_from_eliminations, FilterResult, FilterStage};
pub use report::{ReportFormat, ScanReport};
