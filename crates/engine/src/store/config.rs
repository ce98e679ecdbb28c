//! Store configuration
//!
//! A store is configured in code or from a TOML document:
//!
//! ```toml
//! [retry]
//! # Give up after this many conflicting attempts (default: retry forever)
//! # max_retries = 64
//!
//! # Log a warning every N conflicting attempts of one transaction
//! warn_after = 100
//! ```

use nodb_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Retry behavior of [`Store::transact`](crate::Store::transact)
///
/// Execution is synchronous and single-threaded, so there is no backoff:
/// a conflicting transaction is re-run immediately on a fresh branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of re-runs after a conflict (`None` = unbounded)
    pub max_retries: Option<usize>,
    /// Emit a warning every `warn_after` conflicting attempts (0 = never)
    pub warn_after: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            warn_after: 100,
        }
    }
}

impl RetryConfig {
    /// Create a RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RetryConfig that fails on the first conflict
    pub fn no_retry() -> Self {
        Self {
            max_retries: Some(0),
            ..Default::default()
        }
    }

    /// Cap the number of re-runs after a conflict
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the warning interval
    pub fn with_warn_after(mut self, warn_after: usize) -> Self {
        self.warn_after = warn_after;
        self
    }

    /// Whether a transaction that has made `attempts` attempts may run again
    pub(crate) fn allows_retry(&self, attempts: usize) -> bool {
        self.max_retries.map_or(true, |max| attempts <= max)
    }

    /// Whether the `attempts`-th conflict should be reported
    pub(crate) fn should_warn(&self, attempts: usize) -> bool {
        self.warn_after > 0 && attempts % self.warn_after == 0
    }
}

/// Configuration of a [`Store`](crate::Store)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Transaction retry behavior
    pub retry: RetryConfig,
}

impl StoreConfig {
    /// Parse a config from TOML text
    ///
    /// Missing sections and keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize this config to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}
