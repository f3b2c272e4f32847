//! Configuration validation.
//!
//! Rejects settings that would make the indicator math or the scan run
//! meaningless (zero windows, zero concurrency, non-positive thresholds).

use thiserror::Error;

use crate::config::{
    AtrSmoothing, Config, DiscoveryConfig, ObservabilityConfig, ProviderConfig, ProviderKind,
    ScannerConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Longest accepted series cache lifetime (one week).
pub const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }
        if let Err(e) = self.scanner.validate() {
            errors.push(e);
        }
        if let Err(e) = self.discovery.validate() {
            errors.push(e);
        }
        if let Err(e) = self.provider.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

}

impl From<ValidationError> for crate::error::Error {
    fn from(err: ValidationError) -> Self {
        Self::Config(err.to_string())
    }
}

fn positive(value: usize, field: &str) -> ValidationResult<()> {
    if value == 0 {
        return Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: "must be greater than 0".into(),
        });
    }
    Ok(())
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for ScannerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.min_history_bars < 2 {
            return Err(ValidationError::InvalidValue {
                field: "scanner.min_history_bars".into(),
                reason: "at least 2 bars are needed to compare consecutive periods".into(),
            });
        }
        positive(self.long_trend_lag, "scanner.long_trend_lag")?;
        positive(self.short_window_bars, "scanner.short_window_bars")?;
        positive(self.sma_window, "scanner.sma_window")?;
        positive(self.ema_span, "scanner.ema_span")?;
        positive(self.momentum_lookback_bars, "scanner.momentum_lookback_bars")?;
        positive(self.concurrency, "scanner.concurrency")?;

        if self.atr_smoothing == AtrSmoothing::Wilder {
            positive(self.atr_period, "scanner.atr_period")?;
        }

        if !(self.pullback_threshold_pct.is_finite() && self.pullback_threshold_pct > 0.0) {
            return Err(ValidationError::InvalidValue {
                field: "scanner.pullback_threshold_pct".into(),
                reason: "must be a positive percentage".into(),
            });
        }

        if self.symbol_timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "scanner.symbol_timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for DiscoveryConfig {
    fn validate(&self) -> ValidationResult<()> {
        positive(self.max_rows_per_page, "discovery.max_rows_per_page")?;
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "discovery.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ProviderConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.kind == ProviderKind::Snapshot && self.snapshot_dir.is_none() {
            return Err(ValidationError::MissingField {
                field: "provider.snapshot_dir (required for snapshot provider)".into(),
            });
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ValidationError::InvalidValue {
                field: "provider.cache_ttl_secs".into(),
                reason: format!("must be at most {} seconds", MAX_CACHE_TTL_SECS),
            });
        }
        if self.rate_limit_rpm == 0 {
            return Err(ValidationError::InvalidValue {
                field: "provider.rate_limit_rpm".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}
