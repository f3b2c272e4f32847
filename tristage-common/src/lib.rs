//! Tristage Common - Shared configuration, logging and error types for the
//! tristage stock scanner.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    AtrSmoothing, Config, ConditionThresholds, DiscoveryConfig, EmaSmoothing,
    ObservabilityConfig, ProviderConfig, ProviderKind, ScannerConfig, StageToggles,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, ScannerConfig, StageToggles};
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
