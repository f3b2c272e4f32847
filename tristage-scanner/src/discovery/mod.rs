//! Candidate symbol discovery.
//!
//! A [`SymbolSource`] produces the set of tickers a scan run evaluates.
//! Sources may fail; the scan engine absorbs the failure and treats it as
//! zero candidates.

mod finviz;

pub use finviz::{parse_listing, FinvizSource};

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tristage_common::error::ResultExt;

/// Errors raised while discovering symbols.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiscoveryError {
    /// Listing page unreachable or returned a non-success status
    #[error("Listing unreachable: {0}")]
    Network(String),

    /// Listing page did not have the expected structure
    #[error("Listing could not be parsed: {0}")]
    Parse(String),
}

/// A source of candidate ticker symbols.
#[async_trait]
pub trait SymbolSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &'static str;

    /// Produce the de-duplicated candidate set. An empty set is valid.
    async fn discover_symbols(&self) -> Result<BTreeSet<String>, DiscoveryError>;
}

/// Normalize a raw ticker: trimmed and upper-cased, `None` if blank.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

// ============================================================================
// Static Symbols
// ============================================================================

/// A fixed symbol list supplied by the user.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols {
    symbols: BTreeSet<String>,
}

impl StaticSymbols {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .filter_map(|s| normalize_symbol(s.as_ref()))
                .collect(),
        }
    }

    /// Parse a comma-separated list ("AAPL, msft,NVDA").
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Read one symbol per line; blank lines and `#` comments are ignored.
    pub fn from_file(path: &Path) -> tristage_common::Result<Self> {
        let content =
            std::fs::read_to_string(path).context(format!("reading {}", path.display()))?;
        Ok(Self::new(
            content
                .lines()
                .map(|line| line.split('#').next().unwrap_or_default()),
        ))
    }

    /// Merge another list into this one.
    pub fn extend(&mut self, other: StaticSymbols) {
        self.symbols.extend(other.symbols);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[async_trait]
impl SymbolSource for StaticSymbols {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn discover_symbols(&self) -> Result<BTreeSet<String>, DiscoveryError> {
        Ok(self.symbols.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("  aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_symbol("   "), None);
    }

    #[tokio::test]
    async fn test_static_symbols_dedupe() {
        let source = StaticSymbols::from_csv("aapl, MSFT,,AAPL ");
        let symbols = source.discover_symbols().await.unwrap();
        assert_eq!(
            symbols.into_iter().collect::<Vec<_>>(),
            vec!["AAPL".to_string(), "MSFT".to_string()]
        );
    }

    #[test]
    fn test_static_symbols_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchlist.txt");
        std::fs::write(&path, "# tech\nNVDA\n\namd  # chips\nNVDA\n").unwrap();

        let source = StaticSymbols::from_file(&path).unwrap();
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_static_symbols_missing_file() {
        let err = StaticSymbols::from_file(Path::new("/nonexistent/watchlist.txt")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/watchlist.txt"));
        assert_eq!(err.exit_code(), 74);
    }
}
