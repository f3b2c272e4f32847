//! Configuration management for the tristage scanner.
//!
//! The scanner reads a single configuration file at `~/.tristage/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Command line flags (applied by the binary)
//! 2. Environment variables (`TRISTAGE_*` prefix)
//! 3. Explicit config file values
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `TRISTAGE_LOG_LEVEL` → observability.log_level
//! - `TRISTAGE_LOG_FORMAT` → observability.log_format
//! - `TRISTAGE_CONCURRENCY` → scanner.concurrency
//! - `TRISTAGE_TIMEOUT_SECS` → scanner.symbol_timeout_secs
//! - `TRISTAGE_STAGE1` / `TRISTAGE_STAGE2` / `TRISTAGE_STAGE3` → scanner.stages.*

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".tristage"),
        |dirs| dirs.home_dir().join(".tristage"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets clamped to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Scanner Configuration
// ============================================================================

/// Smoothing applied to true range when deriving the average true range.
///
/// `SingleBar` uses a smoothing weight of 1 on the newest value, so the ATR of
/// a bar equals its own true range. `Wilder` is the traditional multi-period
/// average with weight `1 / atr_period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AtrSmoothing {
    #[default]
    #[serde(alias = "full", alias = "single-bar")]
    SingleBar,
    #[serde(alias = "traditional")]
    Wilder,
}

/// Weight used by the short exponential moving average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmaSmoothing {
    /// `alpha = 2 / (span + 1)`
    #[default]
    Span,
    /// `alpha = 1 / span`
    Wilder,
}

/// Enabled stages of the filter funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageToggles {
    /// Stage 1: weekly volatility/volume condition
    #[serde(default = "default_true")]
    pub stage1_enabled: bool,
    /// Stage 2: long-term trend with pullback
    #[serde(default)]
    pub stage2_enabled: bool,
    /// Stage 3: short-term momentum confirmation
    #[serde(default)]
    pub stage3_enabled: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            stage1_enabled: true,
            stage2_enabled: false,
            stage3_enabled: false,
        }
    }
}

impl StageToggles {
    /// All three stages enabled.
    pub fn all() -> Self {
        Self {
            stage1_enabled: true,
            stage2_enabled: true,
            stage3_enabled: true,
        }
    }

    /// Every stage disabled; only the history gate applies.
    pub fn none() -> Self {
        Self {
            stage1_enabled: false,
            stage2_enabled: false,
            stage3_enabled: false,
        }
    }
}

/// Numeric thresholds of the weekly condition classifier (percentages).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionThresholds {
    #[serde(default = "default_quiet_volume_pct")]
    pub quiet_breakout_min_volume_pct: f64,
    #[serde(default = "default_quiet_atr_pct")]
    pub quiet_breakout_max_atr_pct: f64,
    #[serde(default = "default_exhaustion_volume_pct")]
    pub exhaustion_min_volume_pct: f64,
    #[serde(default = "default_exhaustion_atr_pct")]
    pub exhaustion_max_atr_pct: f64,
}

impl Default for ConditionThresholds {
    fn default() -> Self {
        Self {
            quiet_breakout_min_volume_pct: default_quiet_volume_pct(),
            quiet_breakout_max_atr_pct: default_quiet_atr_pct(),
            exhaustion_min_volume_pct: default_exhaustion_volume_pct(),
            exhaustion_max_atr_pct: default_exhaustion_atr_pct(),
        }
    }
}

fn default_quiet_volume_pct() -> f64 {
    20.0
}

fn default_quiet_atr_pct() -> f64 {
    5.0
}

fn default_exhaustion_volume_pct() -> f64 {
    -5.0
}

fn default_exhaustion_atr_pct() -> f64 {
    -20.0
}

/// Technical evaluation and run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Enabled funnel stages
    #[serde(flatten)]
    pub stages: StageToggles,

    /// Minimum daily bars required before any evaluation
    #[serde(default = "default_min_history_bars")]
    pub min_history_bars: usize,

    /// Lag (in daily bars) of the long-term trend anchor
    #[serde(default = "default_long_trend_lag")]
    pub long_trend_lag: usize,

    /// Window (in daily bars) for the pullback extreme
    #[serde(default = "default_short_window_bars")]
    pub short_window_bars: usize,

    /// Minimum pullback/bounce magnitude (%) for stage 2
    #[serde(default = "default_pullback_threshold_pct")]
    pub pullback_threshold_pct: f64,

    /// Simple moving average window
    #[serde(default = "default_sma_window")]
    pub sma_window: usize,

    /// Exponential moving average span
    #[serde(default = "default_ema_span")]
    pub ema_span: usize,

    /// Exponential moving average weighting
    #[serde(default)]
    pub ema_smoothing: EmaSmoothing,

    /// ATR smoothing mode
    #[serde(default)]
    pub atr_smoothing: AtrSmoothing,

    /// ATR period (only used by Wilder smoothing)
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// Number of recent daily bars inspected for the momentum streak
    #[serde(default = "default_momentum_lookback_bars")]
    pub momentum_lookback_bars: usize,

    /// Weekly condition thresholds
    #[serde(default)]
    pub condition_thresholds: ConditionThresholds,

    /// History requested from the data provider, in calendar days
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Maximum number of symbols evaluated concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-symbol retrieval timeout in seconds
    #[serde(default = "default_symbol_timeout_secs")]
    pub symbol_timeout_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            stages: StageToggles::default(),
            min_history_bars: default_min_history_bars(),
            long_trend_lag: default_long_trend_lag(),
            short_window_bars: default_short_window_bars(),
            pullback_threshold_pct: default_pullback_threshold_pct(),
            sma_window: default_sma_window(),
            ema_span: default_ema_span(),
            ema_smoothing: EmaSmoothing::default(),
            atr_smoothing: AtrSmoothing::default(),
            atr_period: default_atr_period(),
            momentum_lookback_bars: default_momentum_lookback_bars(),
            condition_thresholds: ConditionThresholds::default(),
            lookback_days: default_lookback_days(),
            concurrency: default_concurrency(),
            symbol_timeout_secs: default_symbol_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_min_history_bars() -> usize {
    260
}

fn default_long_trend_lag() -> usize {
    500 // ~2 years of trading days
}

fn default_short_window_bars() -> usize {
    126 // ~6 months
}

fn default_pullback_threshold_pct() -> f64 {
    15.0
}

fn default_sma_window() -> usize {
    10
}

fn default_ema_span() -> usize {
    9
}

fn default_atr_period() -> usize {
    14
}

fn default_momentum_lookback_bars() -> usize {
    12
}

fn default_lookback_days() -> u32 {
    1095 // 3 years
}

fn default_concurrency() -> usize {
    4
}

fn default_symbol_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Discovery Configuration
// ============================================================================

/// Listing page scraping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Screener listing URLs; the page offset is appended to each
    #[serde(default = "default_finviz_urls")]
    pub finviz_urls: Vec<String>,

    /// Maximum result rows taken from each listing page
    #[serde(default = "default_max_rows_per_page")]
    pub max_rows_per_page: usize,

    /// HTTP timeout for a listing page in seconds
    #[serde(default = "default_discovery_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with listing requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            finviz_urls: default_finviz_urls(),
            max_rows_per_page: default_max_rows_per_page(),
            timeout_secs: default_discovery_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_finviz_urls() -> Vec<String> {
    vec![
        "https://finviz.com/screener.ashx?v=111&f=ind_stocksonly,sh_avgvol_o1000,sh_price_50to100,ta_averagetruerange_o2.5&r=".into(),
        "https://finviz.com/screener.ashx?v=111&f=ind_stocksonly,sh_avgvol_o1000,sh_price_10to50,ta_averagetruerange_o1.5&r=".into(),
    ]
}

fn default_max_rows_per_page() -> usize {
    25
}

fn default_discovery_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0".into()
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Which data retrieval backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Yahoo chart API over HTTP
    #[default]
    Yahoo,
    /// JSON files on disk, one per symbol
    Snapshot,
}

/// Data retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    /// Base URL of the chart API
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Proactive request budget per minute
    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,

    /// Cache TTL for retrieved series; 0 disables caching
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Directory holding `<SYMBOL>.json` files for the snapshot provider
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            base_url: default_provider_base_url(),
            rate_limit_rpm: default_rate_limit_rpm(),
            cache_ttl_secs: default_cache_ttl_secs(),
            snapshot_dir: None,
        }
    }
}

fn default_provider_base_url() -> String {
    "https://query1.finance.yahoo.com".into()
}

fn default_rate_limit_rpm() -> u32 {
    120
}

fn default_cache_ttl_secs() -> u64 {
    300
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable values are ignored and the existing setting is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("TRISTAGE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("TRISTAGE_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(n) = lookup("TRISTAGE_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.scanner.concurrency = n;
        }
        if let Some(secs) = lookup("TRISTAGE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.scanner.symbol_timeout_secs = secs;
        }
        if let Some(on) = lookup("TRISTAGE_STAGE1").and_then(|v| parse_flag(&v)) {
            self.scanner.stages.stage1_enabled = on;
        }
        if let Some(on) = lookup("TRISTAGE_STAGE2").and_then(|v| parse_flag(&v)) {
            self.scanner.stages.stage2_enabled = on;
        }
        if let Some(on) = lookup("TRISTAGE_STAGE3").and_then(|v| parse_flag(&v)) {
            self.scanner.stages.stage3_enabled = on;
        }
    }
}

/// Parse a boolean-ish flag ("1", "true", "on", "yes" and their negatives).
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_scanner_config() {
        let config = ScannerConfig::default();
        assert!(config.stages.stage1_enabled);
        assert!(!config.stages.stage2_enabled);
        assert!(!config.stages.stage3_enabled);
        assert_eq!(config.min_history_bars, 260);
        assert_eq!(config.long_trend_lag, 500);
        assert_eq!(config.short_window_bars, 126);
        assert!((config.pullback_threshold_pct - 15.0).abs() < 1e-9);
        assert_eq!(config.sma_window, 10);
        assert_eq!(config.ema_span, 9);
        assert_eq!(config.atr_smoothing, AtrSmoothing::SingleBar);
        assert_eq!(config.momentum_lookback_bars, 12);
    }

    #[test]
    fn test_empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.discovery.finviz_urls.len(), 2);
        assert_eq!(config.discovery.max_rows_per_page, 25);
        assert_eq!(config.provider.kind, ProviderKind::Yahoo);
    }

    #[test]
    fn test_flattened_stage_flags() {
        let json = r#"{"scanner": {"stage1_enabled": false, "stage3_enabled": true, "atr_smoothing": "full"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(!config.scanner.stages.stage1_enabled);
        assert!(!config.scanner.stages.stage2_enabled);
        assert!(config.scanner.stages.stage3_enabled);
        assert_eq!(config.scanner.atr_smoothing, AtrSmoothing::SingleBar);
    }

    #[test]
    fn test_wilder_alias() {
        let json = r#"{"atr_smoothing": "traditional", "atr_period": 10}"#;
        let config: ScannerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.atr_smoothing, AtrSmoothing::Wilder);
        assert_eq!(config.atr_period, 10);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TRISTAGE_LOG_LEVEL", "debug"),
            ("TRISTAGE_CONCURRENCY", "8"),
            ("TRISTAGE_TIMEOUT_SECS", "not-a-number"),
            ("TRISTAGE_STAGE2", "on"),
            ("TRISTAGE_STAGE1", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.scanner.concurrency, 8);
        assert_eq!(config.scanner.symbol_timeout_secs, 30);
        assert!(config.scanner.stages.stage2_enabled);
        assert!(!config.scanner.stages.stage1_enabled);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"scanner": {"min_history_bars": 300}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.scanner.min_history_bars, 300);
        assert_eq!(config.scanner.sma_window, 10);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
